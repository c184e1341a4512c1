//! Check that the media engine is usable.

use clipgrid_common::config::AppConfig;
use clipgrid_render_engine::{FfmpegEngine, MediaEngine};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Clipgrid System Check");
    println!("{}", "=".repeat(50));

    let engine = FfmpegEngine::from_config(&config.engine);
    println!("  ffmpeg: {}", config.engine.ffmpeg_path.display());
    println!("  ffprobe: {}", config.engine.ffprobe_path.display());

    let available = engine.is_available();
    if available {
        println!("[OK] Media engine: {}", engine.name());
    } else {
        println!("[FAIL] Media engine: ffmpeg/ffprobe not runnable");
    }
    println!("[OK] Encoder threads: {}", engine.threads());
    println!(
        "[OK] Platforms registered: {}",
        clipgrid_platform_core::global().len()
    );

    println!();
    if available {
        println!("Clipgrid is ready.");
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Media engine unavailable. Install ffmpeg or set engine paths in {}",
            clipgrid_common::config::config_file_path().display()
        ))
    }
}
