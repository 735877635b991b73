//! Crossfade shaping around the loop seam

use crate::{DecodedBuffer, LoopAnalysis};
use std::sync::Arc;
use std::time::Duration;

/// Default length of the fade ramps
pub const DEFAULT_CROSSFADE: Duration = Duration::from_millis(100);

/// Number of samples a crossfade of `duration` spans at `sample_rate`
pub fn crossfade_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).floor() as usize
}

/// Apply the loop crossfade to every channel of `buffer`, in place
///
/// The `crossfade_samples` before the loop point ramp linearly down to
/// silence and the same number of samples from the content start ramp up
/// from silence. Indices past the end of the buffer are skipped.
///
/// This is destructive and not idempotent: applying it twice attenuates the
/// ramps twice. Use [`LoopedBuffer::prepare`] to shape a buffer exactly once.
pub fn apply_crossfade(buffer: &mut DecodedBuffer, analysis: &LoopAnalysis, duration: Duration) {
    let fade_len = crossfade_samples(duration, buffer.sample_rate());
    if fade_len == 0 {
        return;
    }

    let fade_start = analysis.loop_point.saturating_sub(fade_len);
    let head_start = analysis.content_start;

    for channel in buffer.channels_mut() {
        let len = channel.len();

        let tail_len = fade_len.min(len.saturating_sub(fade_start));
        for i in 0..tail_len {
            channel[fade_start + i] *= 1.0 - i as f32 / fade_len as f32;
        }

        let head_len = fade_len.min(len.saturating_sub(head_start));
        for i in 0..head_len {
            channel[head_start + i] *= i as f32 / fade_len as f32;
        }
    }
}

/// A buffer that has been analyzed and shaped for seamless looping
///
/// Construction consumes the decoded buffer, so the crossfade can only ever
/// be applied once per decode.
#[derive(Debug, Clone)]
pub struct LoopedBuffer {
    buffer: Arc<DecodedBuffer>,
    analysis: LoopAnalysis,
}

impl LoopedBuffer {
    /// Analyze `buffer`, apply the crossfade and freeze the result
    ///
    /// Returns `None` when the buffer cannot be analyzed (no samples, or no
    /// sample rate).
    pub fn prepare(mut buffer: DecodedBuffer, crossfade: Duration) -> Option<Self> {
        let analysis = LoopAnalysis::analyze(&buffer)?;
        apply_crossfade(&mut buffer, &analysis, crossfade);

        log::info!(
            "Seamless loop created: {:.3}s to {:.3}s (duration {:.3}s, match quality {:.6}) \
             with {:.1}s crossfade",
            analysis.loop_start_seconds(),
            analysis.loop_end_seconds(),
            analysis.loop_duration(),
            analysis.match_quality(),
            crossfade.as_secs_f64(),
        );

        Some(LoopedBuffer {
            buffer: Arc::new(buffer),
            analysis,
        })
    }

    /// The shaped audio
    pub fn buffer(&self) -> &Arc<DecodedBuffer> {
        &self.buffer
    }

    /// Loop points the buffer was shaped for
    pub fn analysis(&self) -> &LoopAnalysis {
        &self.analysis
    }
}
