use ambient_audio::{AmbientPlayer, AudioError, OutputMode, PlayOutcome};
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Frames pulled from the offline context per render call
const RENDER_BLOCK_FRAMES: usize = 1024;

#[derive(Error, Debug)]
pub enum AudioExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hound error: {0}")]
    Hound(#[from] hound::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Playback error: {0}")]
    Playback(#[from] AudioError),

    #[error("Render error: {0}")]
    RenderError(String),
}

#[derive(Debug, Clone)]
pub struct ExportParams {
    pub output_path: PathBuf,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub bit_depth: u16,
}

impl ExportParams {
    pub fn validate(&self) -> Result<(), AudioExportError> {
        if ![16, 24, 32].contains(&self.bit_depth) {
            return Err(AudioExportError::InvalidParams(format!(
                "Bit depth must be 16, 24, or 32, got {}",
                self.bit_depth
            )));
        }

        if ![22050, 44100, 48000, 96000].contains(&self.sample_rate) {
            return Err(AudioExportError::InvalidParams(format!(
                "Sample rate must be 22050, 44100, 48000, or 96000 Hz, got {}",
                self.sample_rate
            )));
        }

        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(AudioExportError::InvalidParams(
                "Duration must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of stereo frames to render
    pub fn frames(&self) -> usize {
        (self.duration_secs * self.sample_rate as f64).round() as usize
    }
}

/// What was written by [`export_mix`]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub output_path: PathBuf,
    pub frames: usize,
    pub sample_rate: u32,
    pub sounds: Vec<String>,
    pub peak: f32,
}

/// Encode interleaved stereo samples to a WAV file
pub fn encode_wav(samples: &[f32], params: &ExportParams) -> Result<(), AudioExportError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: params.sample_rate,
        bits_per_sample: params.bit_depth,
        sample_format: if params.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    if let Some(parent) = params.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = WavWriter::create(&params.output_path, spec)?;

    match params.bit_depth {
        16 => {
            for s in samples {
                writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16)?;
            }
        }
        24 => {
            for s in samples {
                writer.write_sample((s.clamp(-1.0, 1.0) * 8388607.0) as i32)?;
            }
        }
        32 => {
            for s in samples {
                writer.write_sample(*s)?;
            }
        }
        other => {
            return Err(AudioExportError::InvalidParams(format!(
                "Unsupported bit depth: {}",
                other
            )))
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Pull `frames` interleaved stereo frames from the player's offline context
pub fn render_frames(player: &AmbientPlayer, frames: usize) -> Vec<f32> {
    let mut samples = vec![0.0; frames * 2];
    for block in samples.chunks_mut(RENDER_BLOCK_FRAMES * 2) {
        player.render(block);
    }
    samples
}

/// Play sounds into an offline context and write the mix to a WAV file
///
/// The player must have been built with `OutputMode::Offline` at the
/// export sample rate. It is torn down once the mix is rendered.
pub async fn export_mix(
    player: &AmbientPlayer,
    sound_ids: &[String],
    params: &ExportParams,
) -> Result<ExportSummary, AudioExportError> {
    params.validate()?;

    match player.config().output {
        OutputMode::Offline { sample_rate } if sample_rate == params.sample_rate => {}
        output => {
            return Err(AudioExportError::InvalidParams(format!(
                "Export needs an offline player at {} Hz, got {:?}",
                params.sample_rate, output
            )))
        }
    }

    if sound_ids.is_empty() {
        return Err(AudioExportError::InvalidParams(
            "No sounds to render".to_string(),
        ));
    }

    for sound_id in sound_ids {
        match player.play(sound_id).await {
            PlayOutcome::Started => {}
            PlayOutcome::Superseded => {
                return Err(AudioExportError::RenderError(format!(
                    "Playback of {} was superseded",
                    sound_id
                )))
            }
            PlayOutcome::Failed(e) => return Err(e.into()),
        }
    }

    let frames = params.frames();
    log::info!(
        "Rendering {} frames of {} to {}",
        frames,
        sound_ids.join(", "),
        params.output_path.display()
    );

    let samples = render_frames(player, frames);
    player.teardown();

    let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));
    encode_wav(&samples, params)?;

    Ok(ExportSummary {
        output_path: params.output_path.clone(),
        frames,
        sample_rate: params.sample_rate,
        sounds: sound_ids.to_vec(),
        peak,
    })
}
