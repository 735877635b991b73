//! Example: loop a local sound file seamlessly
//!
//! Usage: cargo run -p ambient-audio --example play_loop -- path/to/rain.mp3 [seconds]

use ambient_audio::{AmbientPlayer, PlayOutcome, PlayerConfig};
use ambient_core::{AudioAsset, SoundCatalog, SoundCategory};
use anyhow::{bail, Context};
use std::path::Path;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let file = args
        .next()
        .context("usage: play_loop <sound file> [seconds]")?;
    let seconds: u64 = match args.next() {
        Some(s) => s.parse().context("seconds must be a whole number")?,
        None => 10,
    };

    let path = Path::new(&file);
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("sound file needs a file name")?;

    println!("Ambient Loop Example");
    println!("====================\n");

    let catalog = SoundCatalog::new(vec![AudioAsset::new(
        "example",
        name,
        "🔁",
        name,
        SoundCategory::Ambient,
    )])?;
    let config = PlayerConfig::default()
        .with_asset_base(dir.to_string_lossy())
        .with_default_volume(70);
    let player = AmbientPlayer::new(config, catalog);

    match player.play("example").await {
        PlayOutcome::Started => {}
        PlayOutcome::Superseded => bail!("playback was superseded"),
        PlayOutcome::Failed(e) => return Err(e.into()),
    }

    if let Some(analysis) = player.analysis("example") {
        println!(
            "Looping {:.2}s - {:.2}s (match quality {:.1})",
            analysis.loop_start_seconds(),
            analysis.loop_end_seconds(),
            analysis.match_quality()
        );
    }

    println!("Playing for {} seconds...", seconds);
    tokio::time::sleep(Duration::from_secs(seconds)).await;

    player.teardown();
    println!("\nPlayback stopped.");
    Ok(())
}
