//! Split job: cut one source into consecutive chunks.

use std::path::{Path, PathBuf};

use serde::Serialize;

use clipgrid_common::config::AppConfig;
use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_platform_core::PlatformProfile;
use clipgrid_processing_core::fallback::{FallbackChain, FnStrategy, Verdict};
use clipgrid_processing_core::fit::fit_for_profile;
use clipgrid_processing_core::media::MediaMetadata;
use clipgrid_processing_core::split::{
    chunk_file_name, output_stem, parse_skip_duration, plan_chunks, ChunkSpec,
};

use crate::command::FfmpegCommand;
use crate::filters::fit_filter;
use crate::format::{EncoderSettings, OutputFormat};
use crate::job::{available_engine, join_error, JobContext};
use crate::workspace::{file_size, promote_all, JobWorkspace};

/// Container used when neither a format nor a platform is given.
pub const SPLIT_DEFAULT_FORMAT: OutputFormat = OutputFormat::Webm;

/// A split job.
#[derive(Debug, Clone)]
pub struct SplitRequest {
    /// Source video.
    pub input: PathBuf,

    /// Directory receiving the chunks.
    pub output_dir: PathBuf,

    /// Target chunk length in seconds.
    pub chunk_secs: u32,

    /// Leading offset to drop, e.g. `"1m30s"`. Empty means none.
    pub skip: String,

    /// Destination platform; enables per-chunk fitting and bitrate control.
    pub platform: Option<String>,

    /// Output container override.
    pub format: Option<String>,
}

impl SplitRequest {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, chunk_secs: u32) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            chunk_secs,
            skip: String::new(),
            platform: None,
            format: None,
        }
    }
}

/// One written chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkOutput {
    pub path: PathBuf,
    pub start_secs: f64,
    /// `None` for the last chunk, which runs to the end of the source.
    pub duration_secs: Option<f64>,
    /// Fallback tier that produced the chunk.
    pub strategy: String,
    pub size_bytes: u64,
}

/// Result of a split job.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub source: MediaMetadata,
    pub format: OutputFormat,
    pub chunks: Vec<ChunkOutput>,
}

/// Run a split job to completion on the calling thread.
///
/// Chunks are encoded into a scratch directory and moved into
/// `output_dir` only once every chunk has been produced.
pub fn run_split(ctx: &JobContext<'_>, request: &SplitRequest) -> MediaResult<SplitReport> {
    let platform = ctx.platform(request.platform.as_deref())?;
    let encoder =
        EncoderSettings::resolve(request.format.as_deref(), platform, SPLIT_DEFAULT_FORMAT)?;
    let skip_secs = parse_skip_duration(&request.skip)?;

    if !request.input.exists() {
        return Err(MediaError::FileNotFound {
            path: request.input.clone(),
        });
    }

    let source = ctx.engine.probe(&request.input)?;
    source.validate()?;

    let plan = plan_chunks(
        source.duration_secs,
        request.chunk_secs,
        skip_secs,
        platform.map(|p| p.max_duration_secs),
    )?;

    tracing::info!(
        input = %request.input.display(),
        duration_secs = source.duration_secs,
        chunks = plan.len(),
        chunk_secs = plan.chunk_secs,
        skip_secs = plan.skip_secs,
        platform = platform.map(|p| p.name.as_str()).unwrap_or("none"),
        format = %encoder.format,
        "Starting split"
    );

    std::fs::create_dir_all(&request.output_dir)?;
    let workspace = JobWorkspace::new()?;
    let stem = output_stem(&request.input);

    let mut produced = Vec::with_capacity(plan.len());
    for chunk in &plan.chunks {
        let name = chunk_file_name(&stem, chunk, encoder.format.extension());
        let scratch = workspace.file(&name);

        let strategy = match platform {
            Some(profile) => {
                encode_for_platform(ctx, &encoder, profile, &source, &request.input, chunk, &scratch)?;
                "platform".to_string()
            }
            None => copy_or_reencode(ctx, &encoder, &request.input, chunk, &scratch)?,
        };

        let size_bytes = file_size(&scratch)?;
        tracing::info!(
            chunk = chunk.number(),
            of = plan.len(),
            strategy = %strategy,
            size_bytes,
            "Chunk ready"
        );
        produced.push((name, scratch, chunk, strategy, size_bytes));
    }

    let mut moves = Vec::with_capacity(produced.len());
    let mut chunks = Vec::with_capacity(produced.len());
    for (name, scratch, chunk, strategy, size_bytes) in produced {
        let path = request.output_dir.join(name);
        moves.push((scratch, path.clone()));
        chunks.push(ChunkOutput {
            path,
            start_secs: chunk.start_secs,
            duration_secs: chunk.duration_secs,
            strategy,
            size_bytes,
        });
    }
    promote_all(&moves)?;

    tracing::info!(
        output_dir = %request.output_dir.display(),
        chunks = chunks.len(),
        "Split complete"
    );

    Ok(SplitReport {
        source,
        format: encoder.format,
        chunks,
    })
}

/// Re-encode one chunk fitted to the platform box at its preferred bitrate.
fn encode_for_platform(
    ctx: &JobContext<'_>,
    encoder: &EncoderSettings,
    profile: &PlatformProfile,
    source: &MediaMetadata,
    input: &Path,
    chunk: &ChunkSpec,
    output: &Path,
) -> MediaResult<()> {
    let fit = fit_for_profile(source.dimensions(), profile)?;
    let bitrate = ctx
        .bitrate_planner()
        .for_platform(&profile.video_bitrate, source.bitrate);
    if bitrate.was_capped() {
        tracing::debug!(
            chunk = chunk.number(),
            target_bps = bitrate.target_bps,
            capped_bps = bitrate.capped_bps,
            "Platform bitrate capped to source"
        );
    }

    let command = FfmpegCommand::new(output)
        .seek_input(input, chunk.start_secs, chunk.duration_secs)
        .args(["-vf".to_string(), fit_filter(&fit)])
        .map("0:v:0")
        .map("0:a?")
        .args(encoder.video_args())
        .args(encoder.bitrate_args(&bitrate))
        .args(encoder.audio_args())
        .args(ctx.thread_args())
        .args(encoder.container_args());
    ctx.engine.run(&command)
}

/// Stream-copy the chunk, re-encoding when the copy fails or produces an
/// unreadable file. Returns the tier that succeeded.
fn copy_or_reencode(
    ctx: &JobContext<'_>,
    encoder: &EncoderSettings,
    input: &Path,
    chunk: &ChunkSpec,
    output: &Path,
) -> MediaResult<String> {
    let readable = |_: &()| match ctx.engine.probe(output) {
        Ok(_) => Verdict::Accept,
        Err(err) => Verdict::Reject(err.to_string()),
    };

    let outcome = FallbackChain::new()
        .then(
            FnStrategy::new("copy", || {
                let command = FfmpegCommand::new(output)
                    .seek_input(input, chunk.start_secs, chunk.duration_secs)
                    .map("0")
                    .args(["-c", "copy", "-avoid_negative_ts", "make_zero"]);
                ctx.engine.run(&command)
            })
            .with_verify(readable)
            .escalating_on_error(),
        )
        .then(FnStrategy::new("reencode", || {
            let command = FfmpegCommand::new(output)
                .seek_input(input, chunk.start_secs, chunk.duration_secs)
                .map("0:v:0")
                .map("0:a?")
                .args(encoder.video_args())
                .args(encoder.crf_args(ctx.crf_policy().initial_crf, None))
                .args(encoder.audio_args())
                .args(ctx.thread_args())
                .args(encoder.container_args());
            ctx.engine.run(&command)
        }))
        .run()?;

    Ok(outcome.strategy)
}

/// Split a video with the ffmpeg engine on a blocking worker thread.
///
/// Uses the process-wide platform registry, which must already be
/// initialized.
pub async fn split_video(config: AppConfig, request: SplitRequest) -> MediaResult<SplitReport> {
    let engine = available_engine(&config)?;
    let registry = clipgrid_platform_core::global();

    tokio::task::spawn_blocking(move || {
        let ctx = JobContext::new(&engine, registry, &config);
        run_split(&ctx, &request)
    })
    .await
    .map_err(|e| join_error("split", e))?
}
