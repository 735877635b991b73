//! Audio context: the output graph and the device stream that drives it
//!
//! A context owns a list of voices (source -> gain pairs) that are mixed into
//! interleaved frames. A device context pulls those frames from a cpal output
//! stream; an offline context is pulled by the caller through
//! [`AudioContext::render`].

use crate::node::{GainNode, SourceNode};
use crate::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    SampleFormat, SampleRate, Stream, SupportedStreamConfig, SupportedStreamConfigRange,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Where a context sends its audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The host's default output device
    #[default]
    Device,
    /// No device; frames are pulled with [`AudioContext::render`]
    Offline { sample_rate: u32 },
}

/// Lifecycle state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created or paused; no audio is produced
    Suspended,
    Running,
    /// Released; the context can no longer play
    Closed,
}

/// Identifies a voice connected to a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u64);

struct Voice {
    id: VoiceId,
    source: SourceNode,
    gain: GainNode,
}

/// Voices currently connected to the output
#[derive(Default)]
struct Graph {
    voices: Vec<Voice>,
    next_id: u64,
}

impl Graph {
    fn connect(&mut self, source: SourceNode, gain: GainNode) -> VoiceId {
        self.next_id += 1;
        let id = VoiceId(self.next_id);
        self.voices.push(Voice { id, source, gain });
        id
    }

    fn disconnect(&mut self, id: VoiceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|voice| voice.id != id);
        self.voices.len() != before
    }

    /// Mix all voices into an interleaved buffer with `channels` channels
    fn render(&mut self, buffer: &mut [f32], channels: usize, sample_rate: u32) {
        buffer.fill(0.0);
        let channels = channels.max(1);

        for voice in self.voices.iter_mut() {
            let gain = voice.gain.gain();
            for frame in buffer.chunks_exact_mut(channels) {
                let Some((left, right)) = voice.source.next_frame(sample_rate) else {
                    break;
                };
                if channels == 1 {
                    frame[0] += (left + right) * 0.5 * gain;
                } else {
                    frame[0] += left * gain;
                    frame[1] += right * gain;
                }
            }
        }

        // Stopped or finished sources leave the graph
        self.voices.retain(|voice| voice.source.is_active());
    }
}

/// Pick an f32 stream config, staying close to the device default
///
/// The default config is used as is when it is already f32. Otherwise the
/// first f32 range is taken, preferring the default channel count, at the
/// default sample rate clamped into the range. Without any f32 range the
/// default is returned and stream creation reports the failure.
fn choose_output_config(
    default: SupportedStreamConfig,
    ranges: impl Iterator<Item = SupportedStreamConfigRange>,
) -> SupportedStreamConfig {
    if default.sample_format() == SampleFormat::F32 {
        return default;
    }

    let f32_ranges: Vec<SupportedStreamConfigRange> = ranges
        .filter(|range| range.sample_format() == SampleFormat::F32)
        .collect();
    let Some(range) = f32_ranges
        .iter()
        .find(|range| range.channels() == default.channels())
        .or_else(|| f32_ranges.first())
    else {
        return default;
    };

    let rate = default
        .sample_rate()
        .0
        .clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    log::debug!(
        "Default output format is {:?}, using f32 with {} channels at {} Hz",
        default.sample_format(),
        range.channels(),
        rate
    );
    range.clone().with_sample_rate(SampleRate(rate))
}

/// Shared audio output context
pub struct AudioContext {
    graph: Arc<Mutex<Graph>>,
    /// Output stream, `None` for offline contexts and after close
    stream: Option<Stream>,
    sample_rate: u32,
    channels: usize,
    state: ContextState,
}

impl AudioContext {
    /// Create a context for the given output
    pub fn new(output: OutputMode) -> Result<Self> {
        match output {
            OutputMode::Device => Self::device(),
            OutputMode::Offline { sample_rate } => Ok(Self::offline(sample_rate)),
        }
    }

    /// Create a context on the default output device
    ///
    /// The stream is built paused; the context starts out suspended.
    pub fn device() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceError("No output device available".to_string()))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceError(format!("Failed to get default config: {}", e)))?;

        let supported = match device.supported_output_configs() {
            Ok(ranges) => choose_output_config(default_config, ranges),
            Err(e) => {
                log::warn!("Failed to list output configs: {}", e);
                default_config
            }
        };

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.into();

        let graph = Arc::new(Mutex::new(Graph::default()));
        let render_graph = Arc::clone(&graph);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render_graph.lock().render(data, channels, sample_rate);
                },
                |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::DeviceError(format!("Failed to build stream: {}", e)))?;

        stream
            .pause()
            .map_err(|e| AudioError::DeviceError(format!("Failed to pause stream: {}", e)))?;

        log::debug!(
            "Audio context opened: {} Hz, {} channels",
            sample_rate,
            channels
        );

        Ok(AudioContext {
            graph,
            stream: Some(stream),
            sample_rate,
            channels,
            state: ContextState::Suspended,
        })
    }

    /// Create a stereo context that is rendered by the caller
    pub fn offline(sample_rate: u32) -> Self {
        AudioContext {
            graph: Arc::new(Mutex::new(Graph::default())),
            stream: None,
            sample_rate,
            channels: 2,
            state: ContextState::Suspended,
        }
    }

    /// Output sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved output channels
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ContextState::Closed
    }

    /// Start producing audio
    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(AudioError::ContextClosed),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                if let Some(stream) = &self.stream {
                    stream.play().map_err(|e| {
                        AudioError::DeviceError(format!("Failed to play stream: {}", e))
                    })?;
                }
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    /// Pause audio output, keeping the graph intact
    pub fn suspend(&mut self) -> Result<()> {
        match self.state {
            ContextState::Closed => Err(AudioError::ContextClosed),
            ContextState::Suspended => Ok(()),
            ContextState::Running => {
                if let Some(stream) = &self.stream {
                    stream.pause().map_err(|e| {
                        AudioError::DeviceError(format!("Failed to pause stream: {}", e))
                    })?;
                }
                self.state = ContextState::Suspended;
                Ok(())
            }
        }
    }

    /// Connect `source -> gain -> output` and start the source immediately
    pub fn start(&self, source: SourceNode, gain: &GainNode) -> Result<VoiceId> {
        if self.is_closed() {
            return Err(AudioError::PlaybackStartError(
                "audio context is closed".to_string(),
            ));
        }
        if !source.is_active() {
            return Err(AudioError::PlaybackStartError(
                "source was already stopped".to_string(),
            ));
        }
        Ok(self.graph.lock().connect(source, gain.clone()))
    }

    /// Remove a voice from the output. Returns false if it was not connected.
    pub fn disconnect(&self, voice: VoiceId) -> bool {
        self.graph.lock().disconnect(voice)
    }

    /// Number of voices connected to the output
    pub fn active_voices(&self) -> usize {
        self.graph.lock().voices.len()
    }

    /// Pull interleaved frames from the graph
    ///
    /// Only meaningful for offline contexts; a context that is not running
    /// renders silence and does not advance its sources.
    pub fn render(&self, buffer: &mut [f32]) {
        if self.state != ContextState::Running {
            buffer.fill(0.0);
            return;
        }
        self.graph
            .lock()
            .render(buffer, self.channels, self.sample_rate);
    }

    /// Release the output stream and drop every voice
    ///
    /// Closing an already closed context is a no-op.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Failed to pause stream while closing: {}", e);
            }
        }
        self.graph.lock().voices.clear();
        self.state = ContextState::Closed;
        log::debug!("Audio context closed");
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}
