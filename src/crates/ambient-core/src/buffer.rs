//! Decoded PCM audio held in memory

use std::borrow::Cow;

/// Multi-channel PCM audio, one `Vec<f32>` per channel, normalized to [-1.0, 1.0]
///
/// A buffer belongs to the playback attempt that decoded it. It is shaped in
/// place by the crossfade processor and then handed to a source node; it is
/// never cached or reused across plays.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Create a buffer from planar channel data
    ///
    /// Channels shorter than the longest one are padded with silence so that
    /// every channel has the same frame count.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(frames, 0.0);
        }
        DecodedBuffer {
            channels,
            sample_rate,
        }
    }

    /// Create a single-channel buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// True when the buffer holds no frames
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Mutable samples of one channel
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.channels.get_mut(index).map(Vec::as_mut_slice)
    }

    /// Iterate mutably over every channel
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.channels.iter_mut().map(Vec::as_mut_slice)
    }

    /// Mono view of the buffer: the average of all channels
    ///
    /// Borrows the data when the buffer only has one channel.
    pub fn mixdown(&self) -> Cow<'_, [f32]> {
        match self.channels.as_slice() {
            [] => Cow::Borrowed(&[][..]),
            [only] => Cow::Borrowed(only.as_slice()),
            many => {
                let scale = 1.0 / many.len() as f32;
                let mixed = (0..self.len())
                    .map(|frame| many.iter().map(|ch| ch[frame]).sum::<f32>() * scale)
                    .collect();
                Cow::Owned(mixed)
            }
        }
    }
}
