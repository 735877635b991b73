mod audioexport;

use ambient_audio::{
    decode_audio, source_for_base, AmbientPlayer, AssetSource, OutputMode, PlayOutcome,
    PlaybackMode, PlayerConfig,
};
use ambient_core::{LoopedBuffer, SoundCatalog, SoundCategory, VolumeMap};
use anyhow::{bail, Context, Result};
use audioexport::ExportParams;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "focus-ambient")]
#[command(about = "Play ambient sounds as seamless loops", long_about = None)]
struct Args {
    /// Base URL or directory the sound files are resolved against
    #[arg(short, long, default_value = "sounds", global = true)]
    base: String,

    /// Built-in catalog to use
    #[arg(long, value_enum, default_value = "focus", global = true)]
    preset: Preset,

    /// JSON catalog file, replaces the preset
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// JSON file of saved per-sound volumes
    #[arg(long, global = true)]
    volumes: Option<PathBuf>,

    /// Crossfade length at the loop seam, in milliseconds
    #[arg(long, default_value = "100", global = true)]
    crossfade_ms: u64,

    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the sounds in the catalog
    List {
        /// Only show one category
        #[arg(short, long, value_enum)]
        category: Option<CategoryArg>,

        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a sound and print its loop points without playing it
    Analyze {
        /// Sound id
        sound: String,
    },

    /// Loop one sound on the default output device
    Play {
        /// Sound id
        sound: String,

        /// How long to play, in seconds
        #[arg(short, long, default_value = "30")]
        seconds: u64,

        /// Volume percentage (0-100)
        #[arg(long)]
        volume: Option<u8>,
    },

    /// Layer several sounds on the default output device
    Mix {
        /// Sound ids
        #[arg(required = true)]
        sounds: Vec<String>,

        /// How long to play, in seconds
        #[arg(short, long, default_value = "30")]
        seconds: u64,

        /// Volume percentage (0-100) applied to every sound
        #[arg(long)]
        volume: Option<u8>,
    },

    /// Render a mix of looping sounds to a WAV file
    Render {
        /// Sound ids
        #[arg(required = true)]
        sounds: Vec<String>,

        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        /// Length of the render, in seconds
        #[arg(short, long, default_value = "60")]
        seconds: f64,

        #[arg(long, default_value = "44100")]
        sample_rate: u32,

        /// 16, 24 or 32 (float)
        #[arg(long, default_value = "16")]
        bit_depth: u16,

        /// Volume percentage (0-100) applied to every sound
        #[arg(long)]
        volume: Option<u8>,

        /// Print the export summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    /// Nature recordings of the focus timer
    Focus,
    /// The mixable sound panel
    Panel,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CategoryArg {
    Nature,
    Ambient,
}

impl From<CategoryArg> for SoundCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Nature => SoundCategory::Nature,
            CategoryArg::Ambient => SoundCategory::Ambient,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .filter_module("symphonia", log::LevelFilter::Warn)
        .init();

    let catalog = load_catalog(&args)?;
    let volumes = load_volumes(&args)?;
    let config = PlayerConfig::default()
        .with_asset_base(args.base.clone())
        .with_crossfade(Duration::from_millis(args.crossfade_ms));

    match args.command {
        Command::List { category, json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
                return Ok(());
            }
            for asset in catalog.filter(category.map(SoundCategory::from)) {
                println!(
                    "{:<14} {} {:<20} [{}] {}",
                    asset.id, asset.icon, asset.name, asset.category, asset.path
                );
            }
        }

        Command::Analyze { sound } => {
            analyze(&catalog, &config, &sound).await?;
        }

        Command::Play {
            sound,
            seconds,
            volume,
        } => {
            let player = AmbientPlayer::new(config, catalog);
            player.restore_volumes(volumes);
            if let Some(volume) = volume {
                player.set_volume(&sound, volume);
            }
            start(&player, &sound).await?;
            hold(&player, seconds).await;
        }

        Command::Mix {
            sounds,
            seconds,
            volume,
        } => {
            let player = AmbientPlayer::new(config.with_mode(PlaybackMode::Mixed), catalog);
            player.restore_volumes(volumes);
            for sound in &sounds {
                if let Some(volume) = volume {
                    player.set_volume(sound, volume);
                }
                start(&player, sound).await?;
            }
            hold(&player, seconds).await;
        }

        Command::Render {
            sounds,
            output,
            seconds,
            sample_rate,
            bit_depth,
            volume,
            json,
        } => {
            let params = ExportParams {
                output_path: output,
                sample_rate,
                duration_secs: seconds,
                bit_depth,
            };
            params.validate()?;

            let config = config
                .with_mode(PlaybackMode::Mixed)
                .with_output(OutputMode::Offline { sample_rate });
            let player = AmbientPlayer::new(config, catalog);
            player.restore_volumes(volumes);
            if let Some(volume) = volume {
                for sound in &sounds {
                    player.set_volume(sound, volume);
                }
            }

            let summary = audioexport::export_mix(&player, &sounds, &params).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                eprintln!(
                    "Wrote {} ({} frames at {} Hz, peak {:.3})",
                    summary.output_path.display(),
                    summary.frames,
                    summary.sample_rate,
                    summary.peak
                );
            }
        }
    }

    Ok(())
}

fn load_catalog(args: &Args) -> Result<SoundCatalog> {
    if let Some(path) = &args.catalog {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return SoundCatalog::from_json(&json)
            .with_context(|| format!("Invalid catalog {}", path.display()));
    }
    Ok(match args.preset {
        Preset::Focus => SoundCatalog::focus_timer(),
        Preset::Panel => SoundCatalog::sound_panel(),
    })
}

fn load_volumes(args: &Args) -> Result<VolumeMap> {
    let Some(path) = &args.volumes else {
        return Ok(VolumeMap::new());
    };
    let json =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid volumes file {}", path.display()))
}

async fn start(player: &AmbientPlayer, sound: &str) -> Result<()> {
    match player.play(sound).await {
        PlayOutcome::Started => {
            if let Some(analysis) = player.analysis(sound) {
                eprintln!(
                    "{}: looping {:.3}s - {:.3}s",
                    sound,
                    analysis.loop_start_seconds(),
                    analysis.loop_end_seconds()
                );
            }
            Ok(())
        }
        PlayOutcome::Superseded => bail!("Playback of {} was superseded", sound),
        PlayOutcome::Failed(e) => Err(e).with_context(|| format!("Failed to play {}", sound)),
    }
}

/// Keep the device stream alive, or stop early on Ctrl+C
async fn hold(player: &AmbientPlayer, seconds: u64) {
    eprintln!("Playing for {} seconds. Press Ctrl+C to stop.", seconds);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => eprintln!(),
    }
    player.teardown();
}

async fn analyze(catalog: &SoundCatalog, config: &PlayerConfig, sound: &str) -> Result<()> {
    let asset = catalog
        .get(sound)
        .with_context(|| format!("Sound not found: {}", sound))?
        .clone();

    let source = source_for_base(&config.asset_base);
    let bytes = source.fetch(&asset).await?;
    let extension = asset.extension();
    let crossfade = config.crossfade;

    let looped = tokio::task::spawn_blocking(move || -> Result<LoopedBuffer> {
        let buffer = decode_audio(bytes, extension.as_deref())?;
        LoopedBuffer::prepare(buffer, crossfade).context("Decoded audio cannot be analyzed")
    })
    .await??;

    let buffer = looped.buffer();
    let analysis = looped.analysis();
    println!("{} ({})", asset.name, asset.path);
    println!(
        "  {} frames, {} channels, {} Hz, {:.3}s",
        buffer.len(),
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration()
    );
    println!(
        "  content:    {} - {}",
        analysis.content_start, analysis.content_end
    );
    println!(
        "  loop:       {:.3}s - {:.3}s ({:.3}s)",
        analysis.loop_start_seconds(),
        analysis.loop_end_seconds(),
        analysis.loop_duration()
    );
    println!("  loop point: {}", analysis.loop_point);
    println!("  quality:    {:.2}", analysis.match_quality());
    Ok(())
}
