//! Playback controller behaviour against an offline context

use ambient_audio::{
    AmbientPlayer, AssetSource, AudioError, ContextState, OutputMode, PlayOutcome, PlaybackMode,
    PlayerConfig,
};
use ambient_core::{AudioAsset, SoundCatalog, SoundCategory};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const SAMPLE_RATE: u32 = 8000;

/// One second of a 440 Hz tone with 100 samples of silence at each end
fn tone_wav() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = SAMPLE_RATE as usize;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let value = if i < 100 || i >= frames - 100 {
                0.0
            } else {
                let t = i as f32 / SAMPLE_RATE as f32;
                0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            };
            writer.write_sample((value * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Serves assets from memory, yielding to the scheduler a configurable
/// number of times before each fetch completes
#[derive(Default)]
struct MemorySource {
    assets: HashMap<String, (Vec<u8>, usize)>,
    fetches: Arc<AtomicUsize>,
}

impl MemorySource {
    fn with(mut self, id: &str, bytes: Vec<u8>, yields: usize) -> Self {
        self.assets.insert(id.to_string(), (bytes, yields));
        self
    }
}

#[async_trait]
impl AssetSource for MemorySource {
    async fn fetch(&self, asset: &AudioAsset) -> ambient_audio::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let Some((bytes, yields)) = self.assets.get(&asset.id) else {
            return Err(AudioError::FetchError(format!("404 for {}", asset.path)));
        };
        for _ in 0..*yields {
            tokio::task::yield_now().await;
        }
        Ok(bytes.clone())
    }
}

fn catalog() -> SoundCatalog {
    SoundCatalog::new(vec![
        AudioAsset::new("rain", "Rain", "🌧️", "rain.wav", SoundCategory::Nature),
        AudioAsset::new("wind", "Wind", "💨", "wind.wav", SoundCategory::Nature),
        AudioAsset::new("broken", "Broken", "", "broken.wav", SoundCategory::Ambient),
        AudioAsset::new("missing", "Missing", "", "missing.wav", SoundCategory::Ambient),
    ])
    .unwrap()
}

fn source() -> MemorySource {
    MemorySource::default()
        .with("rain", tone_wav(), 20)
        .with("wind", tone_wav(), 0)
        .with("broken", b"not an audio file".to_vec(), 0)
}

fn player_with(mode: PlaybackMode, source: MemorySource) -> AmbientPlayer {
    let config = PlayerConfig::default()
        .with_mode(mode)
        .with_output(OutputMode::Offline {
            sample_rate: SAMPLE_RATE,
        });
    AmbientPlayer::with_source(config, catalog(), Box::new(source))
}

fn player(mode: PlaybackMode) -> AmbientPlayer {
    player_with(mode, source())
}

fn peak(player: &AmbientPlayer, frames: usize) -> f32 {
    let mut buffer = vec![0.0; frames * 2];
    player.render(&mut buffer);
    buffer.iter().fold(0.0f32, |max, s| max.max(s.abs()))
}

#[tokio::test]
async fn test_play_starts_looping_sound() {
    let player = player(PlaybackMode::Exclusive);

    assert!(player.play("wind").await.is_started());
    assert!(player.is_playing("wind"));
    assert_eq!(player.context_state(), Some(ContextState::Running));
    assert!(player.loading().is_empty());

    let analysis = player.analysis("wind").unwrap();
    // The tone crosses zero at sample 100
    assert!((100..110).contains(&analysis.content_start));
    assert!(analysis.content_start <= analysis.loop_point);
    assert!(analysis.loop_point <= analysis.content_end);

    let gain = player.gain("wind").unwrap();
    assert!((gain - 0.5).abs() < f32::EPSILON);

    // Render well past the loop end: the looping source keeps sounding
    assert!(peak(&player, 2000) > 0.01);
    assert!(peak(&player, 2 * SAMPLE_RATE as usize) > 0.01);
    assert!(player.is_playing("wind"));
}

#[tokio::test]
async fn test_last_play_wins() {
    let player = player(PlaybackMode::Exclusive);

    let (rain, wind) = tokio::join!(player.play("rain"), player.play("wind"));

    assert!(matches!(rain, PlayOutcome::Superseded));
    assert!(wind.is_started());
    assert_eq!(player.playing(), vec!["wind".to_string()]);
    assert!(player.loading().is_empty());
}

#[tokio::test]
async fn test_stop_before_load_resolves_stays_silent() {
    let player = player(PlaybackMode::Exclusive);

    let (outcome, ()) = tokio::join!(player.play("rain"), async {
        tokio::task::yield_now().await;
        assert_eq!(player.loading(), vec!["rain".to_string()]);
        player.stop("rain");
    });

    assert!(matches!(outcome, PlayOutcome::Superseded));
    assert!(player.playing().is_empty());
    assert_eq!(peak(&player, 1000), 0.0);
}

#[tokio::test]
async fn test_stop_all_cancels_loads() {
    let player = player(PlaybackMode::Exclusive);

    let (outcome, ()) = tokio::join!(player.play("rain"), async {
        tokio::task::yield_now().await;
        player.stop_all();
    });

    assert!(matches!(outcome, PlayOutcome::Superseded));
    assert!(player.playing().is_empty());
}

#[tokio::test]
async fn test_playing_another_sound_replaces_current() {
    let player = player(PlaybackMode::Exclusive);

    assert!(player.play("rain").await.is_started());
    assert!(player.play("wind").await.is_started());
    assert_eq!(player.playing(), vec!["wind".to_string()]);
}

#[tokio::test]
async fn test_set_volume_updates_live_gain() {
    let player = player(PlaybackMode::Exclusive);
    assert!(player.play("rain").await.is_started());
    let analysis = player.analysis("rain");

    player.set_volume("rain", 80);
    let gain = player.gain("rain").unwrap();
    assert!((gain - 0.8).abs() < f32::EPSILON);
    assert_eq!(player.volume("rain"), 80);

    // Same session, no restart
    assert_eq!(player.analysis("rain"), analysis);
    assert!(peak(&player, 2000) > 0.01);

    player.set_volume("rain", 0);
    assert_eq!(peak(&player, 2000), 0.0);
    assert!(player.is_playing("rain"));
}

#[tokio::test]
async fn test_volume_remembered_for_next_play() {
    let player = player(PlaybackMode::Exclusive);

    player.set_volume("wind", 30);
    assert_eq!(player.gain("wind"), None);

    assert!(player.play("wind").await.is_started());
    let gain = player.gain("wind").unwrap();
    assert!((gain - 0.3).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_fetch_failure_leaves_no_session() {
    let player = player(PlaybackMode::Exclusive);

    let outcome = player.play("missing").await;
    assert!(matches!(outcome, PlayOutcome::Failed(AudioError::FetchError(_))));
    assert!(player.playing().is_empty());
    assert!(player.loading().is_empty());

    // The player still works afterwards
    assert!(player.play("wind").await.is_started());
}

#[tokio::test]
async fn test_decode_failure_leaves_no_session() {
    let player = player(PlaybackMode::Exclusive);

    let outcome = player.play("broken").await;
    assert!(matches!(outcome, PlayOutcome::Failed(AudioError::DecodeError(_))));
    assert!(player.playing().is_empty());
    assert!(player.loading().is_empty());
}

#[tokio::test]
async fn test_unknown_sound() {
    let player = player(PlaybackMode::Exclusive);
    let outcome = player.play("thunder").await;
    assert!(matches!(outcome, PlayOutcome::Failed(AudioError::SoundNotFound(_))));
}

#[tokio::test]
async fn test_each_play_fetches_again() {
    let source = source();
    let fetches = Arc::clone(&source.fetches);
    let player = player_with(PlaybackMode::Exclusive, source);

    assert!(player.play("wind").await.is_started());
    player.stop("wind");
    assert!(player.play("wind").await.is_started());
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_mixed_mode_layers_sounds() {
    let player = player(PlaybackMode::Mixed);

    let (rain, wind) = tokio::join!(player.play("rain"), player.play("wind"));
    assert!(rain.is_started());
    assert!(wind.is_started());
    assert_eq!(player.playing(), vec!["rain".to_string(), "wind".to_string()]);

    player.set_volume("rain", 100);
    let wind_gain = player.gain("wind").unwrap();
    assert!((wind_gain - 0.5).abs() < f32::EPSILON);

    player.stop("rain");
    assert_eq!(player.playing(), vec!["wind".to_string()]);
}

#[tokio::test]
async fn test_mixed_mode_same_sound_last_wins() {
    let player = player(PlaybackMode::Mixed);

    let (first, second) = tokio::join!(player.play("rain"), player.play("rain"));
    assert!(matches!(first, PlayOutcome::Superseded));
    assert!(second.is_started());
    assert_eq!(player.playing(), vec!["rain".to_string()]);
}

#[tokio::test]
async fn test_toggle() {
    let player = player(PlaybackMode::Exclusive);

    assert!(player.toggle("wind").await.unwrap().is_started());
    assert!(player.toggle("wind").await.is_none());
    assert!(!player.is_playing("wind"));
}

#[tokio::test]
async fn test_teardown_closes_context_and_reopens_lazily() {
    let player = player(PlaybackMode::Exclusive);
    assert!(player.play("wind").await.is_started());

    player.teardown();
    assert_eq!(player.context_state(), None);
    assert!(player.playing().is_empty());
    assert_eq!(peak(&player, 100), 0.0);

    // Teardown is idempotent
    player.teardown();

    assert!(player.play("wind").await.is_started());
    assert_eq!(player.context_state(), Some(ContextState::Running));
}
