//! List platform profiles.

pub fn run(json: bool) -> anyhow::Result<()> {
    let registry = clipgrid_platform_core::global();

    if json {
        let profiles: Vec<_> = registry.iter().collect();
        println!("{}", serde_json::to_string_pretty(&profiles)?);
        return Ok(());
    }

    println!("Platforms ({}):", registry.len());
    for p in registry.iter() {
        let (width, height) = p.target_box();
        println!(
            "  {:<28} {}x{} max {}s, {:.0} MiB, {}/{} @ {}/{}, {}{}",
            p.name,
            width,
            height,
            p.max_duration_secs,
            p.max_file_size as f64 / (1024.0 * 1024.0),
            p.video_codec,
            p.audio_codec,
            p.video_bitrate,
            p.audio_bitrate,
            p.output_format,
            if p.force_portrait { " (portrait)" } else { "" }
        );
    }

    Ok(())
}
