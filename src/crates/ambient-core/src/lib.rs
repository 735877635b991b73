//! Core types for seamlessly looping ambient sounds
//!
//! This crate is free of IO and audio devices. It provides:
//! - The sound catalog and per-sound volume settings
//! - Decoded PCM buffers
//! - Loop analysis: trimming silence and finding a well-matched loop point
//! - Crossfade shaping of the loop seam
//!
//! # Examples
//!
//! ```
//! use ambient_core::{DecodedBuffer, LoopedBuffer, DEFAULT_CROSSFADE};
//!
//! let mut samples = vec![0.0; 100];
//! samples.extend(std::iter::repeat(0.5).take(44_100));
//! let buffer = DecodedBuffer::mono(samples, 44_100);
//!
//! let looped = LoopedBuffer::prepare(buffer, DEFAULT_CROSSFADE).unwrap();
//! assert_eq!(looped.analysis().content_start, 100);
//! ```

pub mod analysis;
pub mod buffer;
pub mod catalog;
pub mod crossfade;
pub mod volume;

pub use analysis::{LoopAnalysis, SILENCE_THRESHOLD};
pub use buffer::DecodedBuffer;
pub use catalog::{AudioAsset, CatalogError, SoundCatalog, SoundCategory};
pub use crossfade::{apply_crossfade, crossfade_samples, LoopedBuffer, DEFAULT_CROSSFADE};
pub use volume::{percent_to_gain, VolumeMap, DEFAULT_VOLUME};
