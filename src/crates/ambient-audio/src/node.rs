//! Audio graph nodes: a looping buffer source and a gain stage

use crate::{AudioError, Result};
use ambient_core::{DecodedBuffer, LoopAnalysis};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Volume stage between a source and the output
///
/// Cloning yields another handle to the same gain value, so the controller
/// can change the gain of a voice that is owned by the render callback.
#[derive(Debug, Clone)]
pub struct GainNode {
    /// Linear gain, stored as f32 bits
    value: Arc<AtomicU32>,
}

impl GainNode {
    /// Create a gain node, clamping `gain` to [0.0, 1.0]
    pub fn new(gain: f32) -> Self {
        GainNode {
            value: Arc::new(AtomicU32::new(gain.clamp(0.0, 1.0).to_bits())),
        }
    }

    /// Set the gain immediately, without ramping
    pub fn set_gain(&self, gain: f32) {
        self.value
            .store(gain.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    /// Current gain
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Acquire))
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Control handle for a [`SourceNode`] that has been handed to the graph
#[derive(Debug, Clone)]
pub struct SourceHandle {
    stopped: Arc<AtomicBool>,
}

impl SourceHandle {
    /// Stop the source
    ///
    /// Returns [`AudioError::AlreadyStopped`] if the source was stopped
    /// before, or ran off the end of a non-looping buffer.
    pub fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Err(AudioError::AlreadyStopped);
        }
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Plays a decoded buffer, optionally looping a region of it
///
/// Playback starts at frame 0. With looping enabled, reaching the loop end
/// wraps the play head back to the loop start, indefinitely. A loop end of
/// zero or past the buffer means the end of the buffer; a loop start at or
/// after the loop end loops the whole buffer.
pub struct SourceNode {
    buffer: Arc<DecodedBuffer>,
    looping: bool,
    loop_start: f64,
    loop_end: f64,
    /// Current play head, in source frames
    position: f64,
    stopped: Arc<AtomicBool>,
}

impl SourceNode {
    /// Create a non-looping source for `buffer`
    pub fn new(buffer: Arc<DecodedBuffer>) -> Self {
        SourceNode {
            buffer,
            looping: false,
            loop_start: 0.0,
            loop_end: 0.0,
            position: 0.0,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enable looping between two points given in seconds
    pub fn set_loop(mut self, loop_start: f64, loop_end: f64) -> Self {
        self.looping = true;
        self.loop_start = loop_start.max(0.0);
        self.loop_end = loop_end.max(0.0);
        self
    }

    /// Enable looping at the points found by loop analysis
    pub fn set_loop_from(self, analysis: &LoopAnalysis) -> Self {
        self.set_loop(analysis.loop_start_seconds(), analysis.loop_end_seconds())
    }

    /// Handle used to stop this source once it is playing
    pub fn handle(&self) -> SourceHandle {
        SourceHandle {
            stopped: Arc::clone(&self.stopped),
        }
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Check if this source will still produce audio
    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Loop region in source frames, if looping
    fn loop_frames(&self) -> Option<(f64, f64)> {
        if !self.looping {
            return None;
        }
        let frames = self.buffer.len() as f64;
        let rate = self.buffer.sample_rate() as f64;

        let mut end = self.loop_end * rate;
        if end <= 0.0 || end > frames {
            end = frames;
        }
        let mut start = self.loop_start * rate;
        if start >= end {
            start = 0.0;
        }
        Some((start, end))
    }

    /// Get the next stereo frame (L, R)
    ///
    /// Returns None once the source is stopped or has played to the end.
    pub fn next_frame(&mut self, output_sample_rate: u32) -> Option<(f32, f32)> {
        if !self.is_active() {
            return None;
        }

        let frames = self.buffer.len();
        if frames == 0 {
            self.stopped.store(true, Ordering::Release);
            return None;
        }

        if let Some((start, end)) = self.loop_frames() {
            if self.position >= end {
                self.position = start + (self.position - end) % (end - start);
            }
        } else if self.position >= frames as f64 {
            self.stopped.store(true, Ordering::Release);
            return None;
        }

        let left = self.interpolate(self.position, 0);
        let right = if self.buffer.channel_count() > 1 {
            self.interpolate(self.position, 1)
        } else {
            left
        };

        let rate_ratio = self.buffer.sample_rate() as f64 / output_sample_rate as f64;
        self.position += rate_ratio;

        Some((left, right))
    }

    /// Linearly interpolate one channel at a fractional frame position
    fn interpolate(&self, frame_position: f64, channel: usize) -> f32 {
        let Some(data) = self.buffer.channel(channel) else {
            return 0.0;
        };

        let index = frame_position.floor() as usize;
        if index >= data.len() {
            return 0.0;
        }

        let fraction = (frame_position - frame_position.floor()) as f32;
        let current = data[index];
        match data.get(index + 1) {
            Some(&next) => current + (next - current) * fraction,
            None => current,
        }
    }
}
