//! External media engine binding.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use clipgrid_common::config::EngineConfig;
use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_processing_core::media::MediaMetadata;

use crate::command::FfmpegCommand;
use crate::probe::{parse_probe_output, FFPROBE_ARGS};

/// Trait for media engines. Every call is atomic: it either leaves a
/// well-formed output behind or fails.
pub trait MediaEngine: Send + Sync {
    /// Probe a media file.
    fn probe(&self, path: &Path) -> MediaResult<MediaMetadata>;

    /// Run one invocation to completion.
    fn run(&self, command: &FfmpegCommand) -> MediaResult<()>;

    /// Check if this engine is available on the system.
    fn is_available(&self) -> bool;

    /// Engine name.
    fn name(&self) -> &str;

    /// Thread-count hint appended to encodes.
    fn threads(&self) -> u32 {
        1
    }
}

/// Threads handed to the engine: `fraction` of the available cores, at least one.
pub fn thread_count(fraction: f64) -> u32 {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    scaled_threads(cores, fraction)
}

fn scaled_threads(cores: usize, fraction: f64) -> u32 {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    ((cores as f64 * fraction).floor() as u32).max(1)
}

/// ffmpeg/ffprobe subprocess engine.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    threads: u32,
}

impl FfmpegEngine {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            threads: thread_count(config.thread_fraction),
        }
    }

    fn spawn_error(&self, binary: &Path, e: std::io::Error) -> MediaError {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediaError::engine_unavailable(format!("{} not found", binary.display()))
        } else {
            MediaError::engine_unavailable(format!("failed to start {}: {e}", binary.display()))
        }
    }
}

impl MediaEngine for FfmpegEngine {
    fn probe(&self, path: &Path) -> MediaResult<MediaMetadata> {
        if !path.exists() {
            return Err(MediaError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.ffprobe)
            .args(FFPROBE_ARGS)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(MediaError::metadata_unavailable(
                path,
                format!(
                    "ffprobe failed ({}): {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let metadata = parse_probe_output(&stdout, path)?;
        tracing::debug!(
            path = %path.display(),
            duration_secs = metadata.duration_secs,
            width = metadata.width,
            height = metadata.height,
            codec = %metadata.codec,
            "Probed media"
        );
        Ok(metadata)
    }

    fn run(&self, command: &FfmpegCommand) -> MediaResult<()> {
        let args = command.to_args();
        tracing::debug!(args = ?args, "Running ffmpeg");

        let start = std::time::Instant::now();
        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(&self.ffmpeg, e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::engine_unavailable("failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let status = child.wait()?;
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(MediaError::encode_failed(
                status.to_string(),
                stderr_output.trim(),
            ));
        }

        let written = std::fs::metadata(command.output())
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(MediaError::encode_failed(
                status.to_string(),
                format!("no output written to {}", command.output().display()),
            ));
        }

        tracing::debug!(
            output = %command.output().display(),
            bytes = written,
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg) && command_exists(&self.ffprobe)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn threads(&self) -> u32 {
        self.threads
    }
}

fn command_exists(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_hint_scales_cores() {
        assert_eq!(scaled_threads(8, 0.75), 6);
        assert_eq!(scaled_threads(1, 0.75), 1);
        assert_eq!(scaled_threads(4, 0.0), 1);
        assert_eq!(scaled_threads(4, 3.0), 4);
        assert_eq!(scaled_threads(4, f64::NAN), 1);
        assert!(thread_count(0.75) >= 1);
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let engine = FfmpegEngine::from_config(&EngineConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/ffprobe"),
            thread_fraction: 0.75,
        });
        assert!(!engine.is_available());

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"data").unwrap();
        let err = engine.probe(&input).unwrap_err();
        assert!(matches!(err, MediaError::EngineUnavailable { .. }));

        let err = engine.probe(&dir.path().join("missing.mp4")).unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound { .. }));
    }
}
