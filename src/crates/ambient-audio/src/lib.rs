//! Native playback engine for seamlessly looping ambient sounds
//!
//! This crate turns a catalog entry into an endlessly looping sound:
//! - Fetch the asset over HTTP or from disk and decode it
//! - Analyze the waveform for a well-matched loop point
//! - Crossfade the loop seam
//! - Play it through a source -> gain -> output graph with live volume control
//!
//! [`AmbientPlayer`] ties these together and guarantees that overlapping
//! `play` calls for one slot leave only the most recent sound audible.

pub mod context;
pub mod fetcher;
pub mod node;
pub mod player;

pub use context::{AudioContext, ContextState, OutputMode, VoiceId};
pub use fetcher::{decode_audio, source_for_base, AssetSource, FileAssetSource, HttpAssetSource};
pub use node::{GainNode, SourceHandle, SourceNode};
pub use player::{AmbientPlayer, PlayOutcome, PlaybackMode, PlayerConfig};

/// Re-export common types from ambient-core
pub use ambient_core::{
    AudioAsset, DecodedBuffer, LoopAnalysis, LoopedBuffer, SoundCatalog, SoundCategory, VolumeMap,
};

/// Audio playback errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio device error: {0}")]
    DeviceError(String),

    #[error("Sound not found: {0}")]
    SoundNotFound(String),

    #[error("Failed to fetch sound: {0}")]
    FetchError(String),

    #[error("Failed to decode audio: {0}")]
    DecodeError(String),

    #[error("Failed to start playback: {0}")]
    PlaybackStartError(String),

    #[error("Source already stopped")]
    AlreadyStopped,

    #[error("Audio context is closed")]
    ContextClosed,
}

pub type Result<T> = std::result::Result<T, AudioError>;
