//! Show probed media information.

use std::path::PathBuf;

use clipgrid_common::config::AppConfig;
use clipgrid_render_engine::{FfmpegEngine, MediaEngine};

pub fn run(config: &AppConfig, path: PathBuf, json: bool) -> anyhow::Result<()> {
    let engine = FfmpegEngine::from_config(&config.engine);
    let metadata = engine
        .probe(&path)
        .map_err(|e| anyhow::anyhow!("Failed to probe media: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("Media: {}", path.display());
    println!("  Duration: {:.3}s", metadata.duration_secs);
    println!(
        "  Video: {} {}x{}{}",
        metadata.codec,
        metadata.width,
        metadata.height,
        metadata
            .frame_rate
            .map(|fps| format!(" @ {fps:.2}fps"))
            .unwrap_or_default()
    );
    match metadata.bitrate {
        Some(bps) => println!("  Bitrate: {} kb/s", bps / 1000),
        None => println!("  Bitrate: unknown"),
    }
    if let Some(size) = metadata.size_bytes {
        println!("  Size: {size} bytes");
    }
    match &metadata.audio {
        Some(audio) => println!(
            "  Audio: {} {} Hz, {} channel(s)",
            audio.codec, audio.sample_rate, audio.channels
        ),
        None => println!("  Audio: none"),
    }

    Ok(())
}
