//! Shared state of one split or template job.

use clipgrid_common::config::AppConfig;
use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_platform_core::{PlatformProfile, PlatformRegistry};
use clipgrid_processing_core::bitrate::BitratePlanner;
use clipgrid_processing_core::size_loop::CrfPolicy;

use crate::engine::{FfmpegEngine, MediaEngine};

/// What a job runs against.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    pub engine: &'a dyn MediaEngine,
    pub registry: &'a PlatformRegistry,
    pub config: &'a AppConfig,
}

impl<'a> JobContext<'a> {
    pub fn new(
        engine: &'a dyn MediaEngine,
        registry: &'a PlatformRegistry,
        config: &'a AppConfig,
    ) -> Self {
        Self {
            engine,
            registry,
            config,
        }
    }

    /// Look up an optional platform name. Blank names mean no platform.
    pub fn platform(&self, name: Option<&str>) -> MediaResult<Option<&'a PlatformProfile>> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => self.registry.get(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn crf_policy(&self) -> CrfPolicy {
        CrfPolicy::from(&self.config.encoding)
    }

    pub fn bitrate_planner(&self) -> BitratePlanner {
        BitratePlanner::new(&self.config.encoding.default_video_bitrate)
    }

    /// `-threads N` for encodes.
    pub fn thread_args(&self) -> [String; 2] {
        ["-threads".to_string(), self.engine.threads().to_string()]
    }
}

/// Build the ffmpeg engine from config and make sure it can run.
pub(crate) fn available_engine(config: &AppConfig) -> MediaResult<FfmpegEngine> {
    let engine = FfmpegEngine::from_config(&config.engine);
    if !engine.is_available() {
        return Err(MediaError::engine_unavailable(format!(
            "expected {} and {} to be runnable",
            config.engine.ffmpeg_path.display(),
            config.engine.ffprobe_path.display()
        )));
    }
    tracing::info!(engine = engine.name(), threads = engine.threads(), "Using media engine");
    Ok(engine)
}

/// Map a panicked blocking job into a [`MediaError`].
pub(crate) fn join_error(job: &str, err: tokio::task::JoinError) -> MediaError {
    MediaError::Other(anyhow::anyhow!("{job} job did not complete: {err}"))
}
