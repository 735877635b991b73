//! Loop point analysis
//!
//! Finds where the audible content of a recording starts and ends, and picks
//! a loop-back point near the end whose waveform best resembles the start.
//! Matching is done in the sample domain: for each candidate the absolute
//! differences against the head of the content are summed over a short
//! comparison window, and the smallest sum wins.

use crate::DecodedBuffer;

/// Samples at or below this absolute amplitude count as silence
pub const SILENCE_THRESHOLD: f32 = 0.001;

/// Upper bound on the number of loop point candidates
pub const MAX_SEARCH_WINDOW: usize = 4410;

/// Length of the loop point search window in seconds
pub const SEARCH_WINDOW_SECONDS: f64 = 0.1;

/// Number of samples compared per candidate
pub const MAX_COMPARE_LENGTH: usize = 1000;

/// Result of analyzing a buffer for seamless looping
///
/// All indices are sample offsets into the analyzed signal and satisfy
/// `content_start <= loop_point <= content_end < len`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopAnalysis {
    /// First sample louder than the silence threshold
    pub content_start: usize,
    /// Last sample louder than the silence threshold
    pub content_end: usize,
    /// Sample at which playback wraps back to `content_start`
    pub loop_point: usize,
    /// Summed absolute difference of the winning candidate
    /// (infinite when there were no candidates)
    pub match_difference: f64,
    /// Sample rate of the analyzed signal in Hz
    pub sample_rate: u32,
}

impl LoopAnalysis {
    /// Analyze a decoded buffer
    ///
    /// Multi-channel buffers are mixed down to mono first. Returns `None` for
    /// an empty buffer or a zero sample rate.
    pub fn analyze(buffer: &DecodedBuffer) -> Option<Self> {
        Self::analyze_samples(&buffer.mixdown(), buffer.sample_rate())
    }

    /// Analyze a single channel of samples
    pub fn analyze_samples(samples: &[f32], sample_rate: u32) -> Option<Self> {
        if samples.is_empty() || sample_rate == 0 {
            return None;
        }

        let content_start = find_content_start(samples);
        let content_end = find_content_end(samples);
        let window = search_window(sample_rate);
        let (loop_point, match_difference) =
            find_loop_point(samples, content_start, content_end, window);

        Some(LoopAnalysis {
            content_start,
            content_end,
            loop_point,
            match_difference,
            sample_rate,
        })
    }

    /// Loop start in seconds (`content_start / sample_rate`)
    pub fn loop_start_seconds(&self) -> f64 {
        self.content_start as f64 / self.sample_rate as f64
    }

    /// Loop end in seconds (`loop_point / sample_rate`)
    pub fn loop_end_seconds(&self) -> f64 {
        self.loop_point as f64 / self.sample_rate as f64
    }

    /// Length of the looped region in seconds
    pub fn loop_duration(&self) -> f64 {
        self.loop_end_seconds() - self.loop_start_seconds()
    }

    /// Inverse of the match difference; larger is a better seam
    pub fn match_quality(&self) -> f64 {
        1.0 / self.match_difference
    }

    /// Range of candidate indices the loop point search considered
    pub fn candidate_range(&self) -> std::ops::Range<usize> {
        candidate_range(
            self.content_start,
            self.content_end,
            search_window(self.sample_rate),
        )
    }
}

/// Number of loop point candidates for a given sample rate
///
/// About 100 ms of audio, capped at [`MAX_SEARCH_WINDOW`].
pub fn search_window(sample_rate: u32) -> usize {
    let window = (sample_rate as f64 * SEARCH_WINDOW_SECONDS).floor() as usize;
    window.min(MAX_SEARCH_WINDOW)
}

/// Index of the first sample louder than the silence threshold, or 0
pub fn find_content_start(samples: &[f32]) -> usize {
    samples
        .iter()
        .position(|s| s.abs() > SILENCE_THRESHOLD)
        .unwrap_or(0)
}

/// Index of the last sample louder than the silence threshold, or `len - 1`
pub fn find_content_end(samples: &[f32]) -> usize {
    samples
        .iter()
        .rposition(|s| s.abs() > SILENCE_THRESHOLD)
        .unwrap_or_else(|| samples.len().saturating_sub(1))
}

fn candidate_range(start: usize, end: usize, window: usize) -> std::ops::Range<usize> {
    start.max(end.saturating_sub(window))..end
}

/// Pick the candidate whose following samples best match the content start
///
/// Returns the chosen index and its summed difference. The earliest candidate
/// wins ties. With no candidates the loop point is `end`.
fn find_loop_point(samples: &[f32], start: usize, end: usize, window: usize) -> (usize, f64) {
    let mut best_point = end;
    let mut best_match = f64::INFINITY;

    for i in candidate_range(start, end, window) {
        let compare_length = MAX_COMPARE_LENGTH.min(end - i);
        let head = &samples[start..start + compare_length];
        let tail = &samples[i..i + compare_length];

        let difference: f64 = head
            .iter()
            .zip(tail)
            .map(|(a, b)| (a - b).abs() as f64)
            .sum();

        if difference < best_match {
            best_match = difference;
            best_point = i;
        }
    }

    (best_point, best_match)
}
