//! Compose inputs into a grid template.

use std::path::PathBuf;

use clipgrid_common::config::AppConfig;
use clipgrid_processing_core::composition::{Corner, OverlayRequest};
use clipgrid_render_engine::{apply_template, TemplateRequest};

/// Parsed `apply-template` arguments.
pub struct TemplateArgs {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub template: String,
    pub format: Option<String>,
    pub obscurify: bool,
    pub text: Option<String>,
    pub text_corner: String,
    pub text_color: Option<String>,
    pub platform: Option<String>,
    pub outro: Vec<String>,
    pub seed: Option<u64>,
}

pub async fn run(config: AppConfig, args: TemplateArgs) -> anyhow::Result<()> {
    let overlay = match args.text {
        Some(text) => {
            let corner: Corner = args.text_corner.parse()?;
            Some(OverlayRequest {
                text,
                corner,
                color: args.text_color,
            })
        }
        None => None,
    };

    println!("Applying template {}", args.template);
    for input in &args.inputs {
        println!("  Input: {}", input.display());
    }
    println!("  Output: {}", args.output.display());
    if let Some(p) = &args.platform {
        println!("  Platform: {p}");
    }

    let request = TemplateRequest {
        output: args.output,
        template: args.template,
        inputs: args.inputs,
        format: args.format,
        obscurify: args.obscurify,
        overlay,
        platform: args.platform,
        outro_lines: args.outro,
        seed: args.seed,
    };

    let report = apply_template(config, request)
        .await
        .map_err(|e| anyhow::anyhow!("Template failed: {e}"))?;

    println!();
    for (i, cell) in report.cells.iter().enumerate() {
        let last = cell.history.last();
        println!(
            "  Cell {}: {} attempt(s), crf {}, {} bytes",
            i + 1,
            cell.history.len(),
            last.map(|a| a.crf).unwrap_or_default(),
            last.map(|a| a.size_bytes).unwrap_or_default()
        );
    }
    println!(
        "Template complete: {} ({}x{}, {} of {} bytes, {})",
        report.output.display(),
        report.dimensions.width,
        report.dimensions.height,
        report.size_bytes,
        report.ceiling_bytes,
        report.final_strategy
    );

    Ok(())
}
