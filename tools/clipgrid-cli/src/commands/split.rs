//! Split a video into chunks.

use std::path::PathBuf;

use clipgrid_common::config::AppConfig;
use clipgrid_render_engine::{split_video, SplitRequest};

pub async fn run(
    config: AppConfig,
    input: PathBuf,
    output: PathBuf,
    duration: u32,
    skip: String,
    platform: Option<String>,
    format: Option<String>,
) -> anyhow::Result<()> {
    println!("Splitting: {}", input.display());
    println!("  Output directory: {}", output.display());
    println!("  Chunk duration: {duration}s");
    if !skip.is_empty() {
        println!("  Skip: {skip}");
    }
    if let Some(p) = &platform {
        println!("  Platform: {p}");
    }

    let request = SplitRequest {
        input,
        output_dir: output,
        chunk_secs: duration,
        skip,
        platform,
        format,
    };

    let report = split_video(config, request)
        .await
        .map_err(|e| anyhow::anyhow!("Split failed: {e}"))?;

    println!();
    println!(
        "Source: {:.1}s, {}x{} ({})",
        report.source.duration_secs, report.source.width, report.source.height, report.source.codec
    );
    for chunk in &report.chunks {
        println!(
            "  {} ({} bytes, {})",
            chunk.path.display(),
            chunk.size_bytes,
            chunk.strategy
        );
    }
    println!("Split complete: {} chunk(s)", report.chunks.len());

    Ok(())
}
