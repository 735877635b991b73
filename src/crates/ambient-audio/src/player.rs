//! High-level ambient sound player
//!
//! Every `play` call takes a generation token. The pipeline (fetch, decode,
//! analyze, crossfade) runs without holding any lock, and its result is only
//! started if the token is still the latest one registered for the sound's
//! slot. A newer `play`, a `stop` or a teardown invalidates older tokens, so a
//! slow load can never resurrect a sound the user has moved away from.

use crate::context::{AudioContext, ContextState, OutputMode, VoiceId};
use crate::fetcher::{decode_audio, source_for_base, AssetSource};
use crate::node::{GainNode, SourceHandle, SourceNode};
use crate::{AudioError, Result};
use ambient_core::{
    percent_to_gain, AudioAsset, LoopAnalysis, LoopedBuffer, SoundCatalog, VolumeMap,
    DEFAULT_CROSSFADE, DEFAULT_VOLUME,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Slot key shared by every sound in exclusive mode
const EXCLUSIVE_SLOT: &str = "ambient";

/// How concurrent sounds are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// A single ambient slot: playing a sound replaces the current one
    #[default]
    Exclusive,
    /// One independent slot per sound id, so sounds can be layered
    Mixed,
}

/// Configuration for the ambient player
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub mode: PlaybackMode,
    pub output: OutputMode,
    /// Volume percentage for sounds with no stored volume
    pub default_volume: u8,
    /// Length of the loop seam crossfade
    pub crossfade: Duration,
    /// Base URL or directory that asset paths are resolved against
    pub asset_base: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            mode: PlaybackMode::Exclusive,
            output: OutputMode::Device,
            default_volume: DEFAULT_VOLUME,
            crossfade: DEFAULT_CROSSFADE,
            asset_base: "sounds".to_string(),
        }
    }
}

impl PlayerConfig {
    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn with_default_volume(mut self, percent: u8) -> Self {
        self.default_volume = percent.min(100);
        self
    }

    pub fn with_crossfade(mut self, crossfade: Duration) -> Self {
        self.crossfade = crossfade;
        self
    }

    pub fn with_asset_base(mut self, base: impl Into<String>) -> Self {
        self.asset_base = base.into();
        self
    }
}

/// What became of a `play` request
#[derive(Debug)]
pub enum PlayOutcome {
    /// The sound is now playing
    Started,
    /// A newer request (or a stop) arrived while this one was loading
    Superseded,
    /// The sound could not be played; the error has been logged
    Failed(AudioError),
}

impl PlayOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, PlayOutcome::Started)
    }
}

/// One playing sound and the graph nodes it owns
struct PlaybackSession {
    voice: VoiceId,
    source: SourceHandle,
    gain: GainNode,
    analysis: LoopAnalysis,
}

impl PlaybackSession {
    fn stop(self, context: Option<&AudioContext>) {
        match self.source.stop() {
            Ok(()) | Err(AudioError::AlreadyStopped) => {}
            Err(e) => log::warn!("Failed to stop source: {}", e),
        }
        if let Some(context) = context {
            context.disconnect(self.voice);
        }
    }
}

/// A load in flight for a slot
struct PendingLoad {
    token: u64,
    sound_id: String,
}

struct PlayerState {
    context: Option<AudioContext>,
    sessions: HashMap<String, PlaybackSession>,
    pending: HashMap<String, PendingLoad>,
    volumes: VolumeMap,
}

impl PlayerState {
    /// The open context, creating one if there is none or it was closed
    fn ensure_context(&mut self, output: OutputMode) -> Result<&mut AudioContext> {
        if self.context.as_ref().map_or(true, AudioContext::is_closed) {
            log::debug!("Creating audio context");
            self.context = Some(AudioContext::new(output)?);
        }
        self.context.as_mut().ok_or(AudioError::ContextClosed)
    }

    fn stop_session(&mut self, sound_id: &str) -> bool {
        match self.sessions.remove(sound_id) {
            Some(session) => {
                session.stop(self.context.as_ref());
                true
            }
            None => false,
        }
    }

    fn stop_all_sessions(&mut self) {
        for (sound_id, session) in self.sessions.drain() {
            session.stop(self.context.as_ref());
            log::info!("Audio stopped: {}", sound_id);
        }
    }

    /// Remove the pending load for `slot` if it still carries `token`
    fn take_pending(&mut self, slot: &str, token: u64) -> bool {
        match self.pending.get(slot) {
            Some(pending) if pending.token == token => {
                self.pending.remove(slot);
                true
            }
            _ => false,
        }
    }

    /// Wire `source -> gain -> output` for a shaped buffer and start it
    fn start_session(
        &mut self,
        sound_id: &str,
        looped: &LoopedBuffer,
        output: OutputMode,
    ) -> Result<()> {
        self.stop_session(sound_id);

        let gain = GainNode::new(self.volumes.gain(sound_id));
        let source =
            SourceNode::new(looped.buffer().clone()).set_loop_from(looped.analysis());
        let handle = source.handle();

        let context = self.ensure_context(output)?;
        if context.state() == ContextState::Suspended {
            context
                .resume()
                .map_err(|e| AudioError::PlaybackStartError(e.to_string()))?;
        }
        let voice = context.start(source, &gain)?;

        self.sessions.insert(
            sound_id.to_string(),
            PlaybackSession {
                voice,
                source: handle,
                gain,
                analysis: *looped.analysis(),
            },
        );
        Ok(())
    }
}

/// Plays catalog sounds as seamless loops
///
/// All methods take `&self`; overlapping `play` futures for the same slot are
/// resolved so that only the most recent request ends up audible.
pub struct AmbientPlayer {
    config: PlayerConfig,
    catalog: SoundCatalog,
    source: Box<dyn AssetSource>,
    state: Mutex<PlayerState>,
    /// Last issued play token
    generation: AtomicU64,
}

impl AmbientPlayer {
    /// Create a player that fetches assets from `config.asset_base`
    pub fn new(config: PlayerConfig, catalog: SoundCatalog) -> Self {
        let source = source_for_base(&config.asset_base);
        Self::with_source(config, catalog, source)
    }

    /// Create a player with a custom asset source
    pub fn with_source(
        config: PlayerConfig,
        catalog: SoundCatalog,
        source: Box<dyn AssetSource>,
    ) -> Self {
        let volumes = VolumeMap::with_default(config.default_volume);
        AmbientPlayer {
            config,
            catalog,
            source,
            state: Mutex::new(PlayerState {
                context: None,
                sessions: HashMap::new(),
                pending: HashMap::new(),
                volumes,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SoundCatalog {
        &self.catalog
    }

    fn slot_for(&self, sound_id: &str) -> String {
        match self.config.mode {
            PlaybackMode::Exclusive => EXCLUSIVE_SLOT.to_string(),
            PlaybackMode::Mixed => sound_id.to_string(),
        }
    }

    /// Play a sound as a seamless loop
    ///
    /// Anything playing in the sound's slot is stopped first. Errors are
    /// logged and reported through the outcome, never panicked on.
    pub async fn play(&self, sound_id: &str) -> PlayOutcome {
        log::info!("Playing ambient sound: {}", sound_id);

        let Some(asset) = self.catalog.get(sound_id).cloned() else {
            let error = AudioError::SoundNotFound(sound_id.to_string());
            log::error!("Error playing sound: {}", error);
            return PlayOutcome::Failed(error);
        };

        let token = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let slot = self.slot_for(sound_id);

        {
            let mut state = self.state.lock();
            match self.config.mode {
                PlaybackMode::Exclusive => state.stop_all_sessions(),
                PlaybackMode::Mixed => {
                    state.stop_session(sound_id);
                }
            }

            if let Err(error) = state.ensure_context(self.config.output) {
                log::error!("Error playing sound {}: {}", sound_id, error);
                return PlayOutcome::Failed(error);
            }

            state.pending.insert(
                slot.clone(),
                PendingLoad {
                    token,
                    sound_id: sound_id.to_string(),
                },
            );
        }

        let looped = match self.load(&asset).await {
            Ok(looped) => looped,
            Err(error) => {
                self.state.lock().take_pending(&slot, token);
                log::error!("Error playing sound {}: {}", sound_id, error);
                return PlayOutcome::Failed(error);
            }
        };

        let mut state = self.state.lock();
        if !state.take_pending(&slot, token) {
            log::warn!(
                "Discarding load of {}: superseded by a newer request",
                sound_id
            );
            return PlayOutcome::Superseded;
        }

        match state.start_session(sound_id, &looped, self.config.output) {
            Ok(()) => {
                log::info!("Audio started with seamless looping: {}", sound_id);
                PlayOutcome::Started
            }
            Err(error) => {
                log::error!("Error playing sound {}: {}", sound_id, error);
                PlayOutcome::Failed(error)
            }
        }
    }

    /// Fetch, decode, analyze and shape an asset
    async fn load(&self, asset: &AudioAsset) -> Result<LoopedBuffer> {
        log::debug!("Loading audio buffer for {}", asset.id);
        let bytes = self.source.fetch(asset).await?;

        let extension = asset.extension();
        let crossfade = self.config.crossfade;
        tokio::task::spawn_blocking(move || {
            let buffer = decode_audio(bytes, extension.as_deref())?;
            LoopedBuffer::prepare(buffer, crossfade).ok_or_else(|| {
                AudioError::DecodeError("Decoded audio cannot be analyzed".to_string())
            })
        })
        .await
        .map_err(|e| AudioError::DecodeError(format!("Decoder task failed: {}", e)))?
    }

    /// Stop a sound, or cancel its load if it is still loading
    ///
    /// Stopping a sound that is not playing is a no-op.
    pub fn stop(&self, sound_id: &str) {
        let slot = self.slot_for(sound_id);
        let mut state = self.state.lock();

        if state
            .pending
            .get(&slot)
            .is_some_and(|pending| pending.sound_id == sound_id)
        {
            state.pending.remove(&slot);
            log::debug!("Cancelled load of {}", sound_id);
        }

        if state.stop_session(sound_id) {
            log::info!("Audio stopped: {}", sound_id);
        }
    }

    /// Stop every sound and cancel every load
    pub fn stop_all(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.stop_all_sessions();
    }

    /// Stop the sound if it is playing, play it otherwise
    ///
    /// Returns `None` when the sound was stopped.
    pub async fn toggle(&self, sound_id: &str) -> Option<PlayOutcome> {
        if self.is_playing(sound_id) {
            self.stop(sound_id);
            None
        } else {
            Some(self.play(sound_id).await)
        }
    }

    /// Set a sound's volume (0-100)
    ///
    /// The value is remembered for later plays; a playing sound's gain
    /// changes immediately.
    pub fn set_volume(&self, sound_id: &str, percent: u8) {
        let mut state = self.state.lock();
        state.volumes.set(sound_id, percent);
        if let Some(session) = state.sessions.get(sound_id) {
            session.gain.set_gain(percent_to_gain(percent));
        }
    }

    /// Stored volume percentage for a sound
    pub fn volume(&self, sound_id: &str) -> u8 {
        self.state.lock().volumes.get(sound_id)
    }

    /// Snapshot of all stored volumes
    pub fn volumes(&self) -> VolumeMap {
        self.state.lock().volumes.clone()
    }

    /// Replace stored volumes, e.g. when restoring saved settings
    ///
    /// Playing sounds pick up their restored volume immediately.
    /// A map without its own default keeps `config.default_volume`.
    pub fn restore_volumes(&self, volumes: VolumeMap) {
        let volumes = volumes.or_default(self.config.default_volume);
        let mut state = self.state.lock();
        for (sound_id, session) in &state.sessions {
            session.gain.set_gain(volumes.gain(sound_id));
        }
        state.volumes = volumes;
    }

    /// Live gain of a playing sound
    pub fn gain(&self, sound_id: &str) -> Option<f32> {
        self.state
            .lock()
            .sessions
            .get(sound_id)
            .map(|session| session.gain.gain())
    }

    /// Loop points of a playing sound
    pub fn analysis(&self, sound_id: &str) -> Option<LoopAnalysis> {
        self.state
            .lock()
            .sessions
            .get(sound_id)
            .map(|session| session.analysis)
    }

    pub fn is_playing(&self, sound_id: &str) -> bool {
        self.state.lock().sessions.contains_key(sound_id)
    }

    /// Ids of the sounds currently playing, sorted
    pub fn playing(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Ids of the sounds currently loading, sorted
    pub fn loading(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state
            .lock()
            .pending
            .values()
            .map(|pending| pending.sound_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// State of the audio context, `None` before the first play
    pub fn context_state(&self) -> Option<ContextState> {
        self.state.lock().context.as_ref().map(AudioContext::state)
    }

    /// Pull interleaved frames from an offline context
    ///
    /// Renders silence when there is no running context.
    pub fn render(&self, buffer: &mut [f32]) {
        match self.state.lock().context.as_ref() {
            Some(context) => context.render(buffer),
            None => buffer.fill(0.0),
        }
    }

    /// Stop everything and close the audio context
    ///
    /// The next `play` opens a fresh context.
    pub fn teardown(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.stop_all_sessions();
        if let Some(mut context) = state.context.take() {
            context.close();
        }
    }
}

impl Drop for AmbientPlayer {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PlayerConfig::default()
            .with_mode(PlaybackMode::Mixed)
            .with_output(OutputMode::Offline { sample_rate: 48000 })
            .with_default_volume(120)
            .with_crossfade(Duration::from_millis(50))
            .with_asset_base("https://example.com/sounds");

        assert_eq!(config.mode, PlaybackMode::Mixed);
        assert_eq!(config.default_volume, 100);
        assert_eq!(config.crossfade, Duration::from_millis(50));
    }

    #[test]
    fn test_slots_per_mode() {
        let exclusive = AmbientPlayer::new(PlayerConfig::default(), SoundCatalog::focus_timer());
        assert_eq!(exclusive.slot_for("wind"), exclusive.slot_for("snowfall"));

        let mixed = AmbientPlayer::new(
            PlayerConfig::default().with_mode(PlaybackMode::Mixed),
            SoundCatalog::sound_panel(),
        );
        assert_ne!(mixed.slot_for("rain"), mixed.slot_for("wind"));
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let player = AmbientPlayer::new(PlayerConfig::default(), SoundCatalog::focus_timer());
        player.stop("wind");
        player.stop_all();
        player.teardown();
        assert!(player.playing().is_empty());
        assert_eq!(player.context_state(), None);
    }

    #[test]
    fn test_volume_without_session_only_stored() {
        let player = AmbientPlayer::new(PlayerConfig::default(), SoundCatalog::focus_timer());
        player.set_volume("wind", 80);
        assert_eq!(player.volume("wind"), 80);
        assert_eq!(player.volume("snowfall"), DEFAULT_VOLUME);
        assert_eq!(player.gain("wind"), None);
    }

    #[test]
    fn test_restore_volumes_keeps_configured_default() {
        let config = PlayerConfig::default().with_default_volume(70);
        let player = AmbientPlayer::new(config, SoundCatalog::focus_timer());

        let mut saved = VolumeMap::new();
        saved.set("wind", 20);
        player.restore_volumes(saved);
        assert_eq!(player.volume("wind"), 20);
        assert_eq!(player.volume("snowfall"), 70);

        player.restore_volumes(VolumeMap::with_default(10));
        assert_eq!(player.volume("snowfall"), 10);
    }
}
