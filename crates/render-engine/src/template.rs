//! Template job: fit, compose, caption and size-check a grid of inputs.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use clipgrid_common::config::AppConfig;
use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_processing_core::composition::{
    select_inputs, CellSpec, CompositionLayout, CompositionPlan, CompositionPlanner,
    OutroRequest, OverlayRequest, TemplateKind,
};
use clipgrid_processing_core::fallback::{FallbackChain, FnStrategy, Verdict};
use clipgrid_processing_core::media::Dimensions;
use clipgrid_processing_core::size_loop::{LoopOutcome, SizeConstrainedLoop};

use crate::command::FfmpegCommand;
use crate::filters::{
    composition_graph, fit_filter, obscurify_video_filter, outro_color_source,
    outro_silence_source, outro_video_filter, COMPOSED_VIDEO_LABEL, OBSCURIFY_AUDIO_FILTER,
};
use crate::format::{EncoderSettings, OutputFormat};
use crate::job::{available_engine, join_error, JobContext};
use crate::workspace::{file_size, promote, JobWorkspace};

/// Container used when neither a format nor a platform is given.
pub const TEMPLATE_DEFAULT_FORMAT: OutputFormat = OutputFormat::Mp4;

/// A template job.
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    /// Destination file. Its extension is replaced to match the format.
    pub output: PathBuf,

    /// Template name: `1x1`, `2x2` or `3x1`.
    pub template: String,

    /// Sources in cell order (row-major).
    pub inputs: Vec<PathBuf>,

    /// Output container override.
    pub format: Option<String>,

    /// Apply the obscurify pre-pass to every input.
    pub obscurify: bool,

    pub overlay: Option<OverlayRequest>,

    /// Destination platform; selects a portrait canvas and a tighter ceiling
    /// where the platform calls for them.
    pub platform: Option<String>,

    /// Lines of an outro card appended after the composition.
    pub outro_lines: Vec<String>,

    /// Seed for the overlay colour pick.
    pub seed: Option<u64>,
}

impl TemplateRequest {
    pub fn new(output: impl Into<PathBuf>, template: impl Into<String>, inputs: Vec<PathBuf>) -> Self {
        Self {
            output: output.into(),
            template: template.into(),
            inputs,
            format: None,
            obscurify: false,
            overlay: None,
            platform: None,
            outro_lines: Vec::new(),
            seed: None,
        }
    }
}

/// Result of a template job.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateReport {
    pub output: PathBuf,
    pub size_bytes: u64,
    pub template: TemplateKind,
    pub dimensions: Dimensions,
    pub ceiling_bytes: u64,
    /// Size loop history of each cell, in cell order.
    pub cells: Vec<LoopOutcome>,
    /// Tier of the final size check that produced the artifact.
    pub final_strategy: String,
}

/// Run a template job to completion on the calling thread.
pub fn run_template(ctx: &JobContext<'_>, request: &TemplateRequest) -> MediaResult<TemplateReport> {
    let kind: TemplateKind = request.template.parse()?;
    let inputs = select_inputs(kind, request.inputs.clone())?;
    let platform = ctx.platform(request.platform.as_deref())?;
    let encoder =
        EncoderSettings::resolve(request.format.as_deref(), platform, TEMPLATE_DEFAULT_FORMAT)?;

    if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
        return Err(MediaError::FileNotFound {
            path: missing.clone(),
        });
    }

    let layout = CompositionLayout::for_platform(&ctx.config.composition, platform);
    let planner = CompositionPlanner::new(layout.clone(), ctx.bitrate_planner());
    let workspace = JobWorkspace::new()?;
    let ext = encoder.format.extension();

    tracing::info!(
        template = %kind,
        inputs = inputs.len(),
        canvas = %layout.canvas,
        ceiling_bytes = layout.max_total_bytes,
        format = %encoder.format,
        obscurify = request.obscurify,
        "Starting template"
    );

    let mut probed = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.into_iter().enumerate() {
        let source = if request.obscurify {
            let scratch = workspace.file(&format!("obscured_{i}.{ext}"));
            obscurify(ctx, &encoder, &input, &scratch)?;
            scratch
        } else {
            input
        };
        let metadata = ctx.engine.probe(&source)?;
        probed.push((source, metadata));
    }

    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let plan = planner.plan(
        kind,
        probed,
        request.overlay.clone(),
        request.outro_lines.clone(),
        &mut rng,
    )?;

    let size_loop = SizeConstrainedLoop::new(ctx.crf_policy());
    let mut cell_paths = Vec::with_capacity(plan.cells.len());
    let mut cell_outcomes = Vec::with_capacity(plan.cells.len());
    for cell in &plan.cells {
        let path = workspace.file(&format!("cell_{}.{ext}", cell.index));
        let outcome = size_loop.run(cell.ceiling_bytes, |crf| {
            ctx.engine.run(&cell_command(ctx, &encoder, cell, crf, &path))?;
            file_size(&path)
        })?;
        cell_paths.push(path);
        cell_outcomes.push(outcome);
    }

    let main = workspace.file(&format!("main.{ext}"));
    ctx.engine
        .run(&compose_command(ctx, &encoder, &plan, &cell_paths, &main)?)?;

    let composed = match &plan.outro {
        Some(outro) => append_outro(ctx, &encoder, &workspace, outro, layout.overlay_font_size, &main)?,
        None => main,
    };

    let ceiling = plan.total_ceiling_bytes;
    let tightened = workspace.file(&format!("tightened.{ext}"));
    let fits = move |(_, size): &(PathBuf, u64)| {
        if *size <= ceiling {
            Verdict::Accept
        } else {
            Verdict::Reject(format!("{size} bytes exceeds the {ceiling} byte ceiling"))
        }
    };

    let outcome = FallbackChain::new()
        .then(
            FnStrategy::new("as-composed", || Ok((composed.clone(), file_size(&composed)?)))
                .with_verify(fits),
        )
        .then(
            FnStrategy::new("tightened", || {
                tighten(ctx, &encoder, &composed, &tightened, ceiling)?;
                Ok((tightened.clone(), file_size(&tightened)?))
            })
            .with_verify(fits),
        )
        .run()?;

    let (artifact, size_bytes) = outcome.output;
    if !outcome.satisfied {
        return Err(MediaError::OutputTooLarge {
            size: size_bytes,
            limit: ceiling,
        });
    }

    let output = encoder.format.ensure_extension(&request.output);
    promote(&artifact, &output)?;

    tracing::info!(
        output = %output.display(),
        size_bytes,
        ceiling_bytes = ceiling,
        strategy = %outcome.strategy,
        "Template complete"
    );

    Ok(TemplateReport {
        output,
        size_bytes,
        template: kind,
        dimensions: plan.output,
        ceiling_bytes: ceiling,
        cells: cell_outcomes,
        final_strategy: outcome.strategy,
    })
}

/// Obscurify pre-pass: zoom-crop, grade and vignette the video, shift the
/// audio pitch.
fn obscurify(
    ctx: &JobContext<'_>,
    encoder: &EncoderSettings,
    input: &Path,
    output: &Path,
) -> MediaResult<()> {
    let metadata = ctx.engine.probe(input)?;
    metadata.validate()?;

    let mut command = FfmpegCommand::new(output)
        .input(input)
        .args(["-vf".to_string(), obscurify_video_filter(metadata.dimensions())])
        .map("0:v:0")
        .args(encoder.video_args())
        .args(encoder.crf_args(ctx.crf_policy().initial_crf, None));
    if metadata.audio.is_some() {
        command = command
            .map("0:a:0")
            .args(["-af", OBSCURIFY_AUDIO_FILTER])
            .args(encoder.audio_args());
    }
    let command = command
        .args(ctx.thread_args())
        .args(encoder.container_args());

    tracing::debug!(input = %input.display(), "Obscurifying input");
    ctx.engine.run(&command)
}

/// One cell encode at `crf`, capped at the cell's budget bitrate.
fn cell_command(
    ctx: &JobContext<'_>,
    encoder: &EncoderSettings,
    cell: &CellSpec,
    crf: u32,
    output: &Path,
) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input(&cell.source)
        .args(["-vf".to_string(), fit_filter(&cell.fit)])
        .map("0:v:0")
        .map("0:a?")
        .args(encoder.video_args())
        .args(encoder.crf_args(crf, Some(&cell.bitrate)))
        .args(encoder.audio_args())
        .args(ctx.thread_args())
        .args(encoder.container_args())
}

/// Stack the encoded cells and draw the overlay.
fn compose_command(
    ctx: &JobContext<'_>,
    encoder: &EncoderSettings,
    plan: &CompositionPlan,
    cells: &[PathBuf],
    output: &Path,
) -> MediaResult<FfmpegCommand> {
    let ceiling = plan.total_bitrate(&ctx.bitrate_planner())?;

    let mut command = cells
        .iter()
        .fold(FfmpegCommand::new(output), |cmd, cell| cmd.input(cell))
        .filter_complex(composition_graph(plan))
        .map(format!("[{COMPOSED_VIDEO_LABEL}]"))
        .args(encoder.video_args())
        .args(encoder.crf_args(ctx.crf_policy().initial_crf, Some(&ceiling)));
    if let Some(audio) = plan.audio_source {
        command = command.map(format!("{audio}:a:0")).args(encoder.audio_args());
    }
    Ok(command
        .arg("-shortest")
        .args(ctx.thread_args())
        .args(encoder.container_args()))
}

/// Render the outro card matched to `main` and concatenate it after `main`.
fn append_outro(
    ctx: &JobContext<'_>,
    encoder: &EncoderSettings,
    workspace: &JobWorkspace,
    outro: &OutroRequest,
    font_size: u32,
    main: &Path,
) -> MediaResult<PathBuf> {
    let ext = encoder.format.extension();
    let main_metadata = ctx.engine.probe(main)?;
    let spec = outro.resolve(&main_metadata, font_size);

    let card = workspace.file(&format!("outro.{ext}"));
    let mut command = FfmpegCommand::new(&card)
        .lavfi_input(outro_color_source(&spec), spec.duration_secs)
        .args(["-vf".to_string(), outro_video_filter(&spec)])
        .map("0:v")
        .args(encoder.video_args())
        .args(encoder.crf_args(ctx.crf_policy().initial_crf, None));
    if let Some(audio) = &spec.audio {
        command = command
            .lavfi_input(
                outro_silence_source(audio.sample_rate, audio.channels),
                spec.duration_secs,
            )
            .map("1:a")
            .args(encoder.audio_args())
            .args([
                "-ar".to_string(),
                audio.sample_rate.to_string(),
                "-ac".to_string(),
                audio.channels.to_string(),
            ]);
    }
    let command = command
        .args(ctx.thread_args())
        .args(encoder.container_args());
    ctx.engine.run(&command)?;

    let list = workspace.file("concat.txt");
    std::fs::write(&list, concat_list(&[main, card.as_path()]))?;

    let joined = workspace.file(&format!("joined.{ext}"));
    let command = FfmpegCommand::new(&joined)
        .concat_input(&list)
        .args(["-c", "copy"])
        .args(encoder.container_args());
    ctx.engine.run(&command)?;

    tracing::debug!(
        lines = spec.lines.len(),
        duration_secs = spec.duration_secs,
        "Appended outro"
    );
    Ok(joined)
}

/// Concat-demuxer list for `files`.
fn concat_list(files: &[&Path]) -> String {
    files
        .iter()
        .map(|path| {
            let quoted = path.to_string_lossy().replace('\'', "'\\''");
            format!("file '{quoted}'\n")
        })
        .collect()
}

/// Re-encode the video at the tightened CRF under a bitrate derived from the
/// remaining budget. Audio is copied.
fn tighten(
    ctx: &JobContext<'_>,
    encoder: &EncoderSettings,
    input: &Path,
    output: &Path,
    ceiling_bytes: u64,
) -> MediaResult<()> {
    let metadata = ctx.engine.probe(input)?;
    let budget = ctx
        .bitrate_planner()
        .for_budget(ceiling_bytes, metadata.duration_secs)?;
    let crf = ctx.crf_policy().tightened_crf();

    tracing::info!(
        crf,
        bitrate = %budget.formatted,
        ceiling_bytes,
        "Composed output too large, tightening"
    );

    let command = FfmpegCommand::new(output)
        .input(input)
        .map("0:v:0")
        .map("0:a?")
        .args(encoder.video_args())
        .args(encoder.crf_args(crf, Some(&budget)))
        .args(["-c:a", "copy"])
        .args(ctx.thread_args())
        .args(encoder.container_args());
    ctx.engine.run(&command)
}

/// Apply a template with the ffmpeg engine on a blocking worker thread.
///
/// Uses the process-wide platform registry, which must already be
/// initialized.
pub async fn apply_template(config: AppConfig, request: TemplateRequest) -> MediaResult<TemplateReport> {
    // Count errors surface before the engine is touched.
    let kind: TemplateKind = request.template.parse()?;
    select_inputs(kind, request.inputs.clone())?;

    let engine = available_engine(&config)?;
    let registry = clipgrid_platform_core::global();

    tokio::task::spawn_blocking(move || {
        let ctx = JobContext::new(&engine, registry, &config);
        run_template(&ctx, &request)
    })
    .await
    .map_err(|e| join_error("template", e))?
}
