//! Output containers and encoder argument presets.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_platform_core::PlatformProfile;
use clipgrid_processing_core::bitrate::BitratePlan;

/// Audio bitrate used when no platform preference applies.
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Supported output containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Mp4,
    Webm,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    pub fn default_video_codec(&self) -> &'static str {
        match self {
            Self::Mp4 => "libx264",
            Self::Webm => "libvpx-vp9",
        }
    }

    pub fn default_audio_codec(&self) -> &'static str {
        match self {
            Self::Mp4 => "aac",
            Self::Webm => "libopus",
        }
    }

    /// `path` with this format's extension.
    pub fn ensure_extension(&self, path: &Path) -> PathBuf {
        let matches = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(self.extension()));
        if matches {
            path.to_path_buf()
        } else {
            path.with_extension(self.extension())
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            other => Err(MediaError::unsupported_format(other)),
        }
    }
}

/// Encoder choice for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub format: OutputFormat,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl EncoderSettings {
    /// Stock codecs of `format`.
    pub fn for_format(format: OutputFormat) -> Self {
        Self {
            format,
            video_codec: format.default_video_codec().to_string(),
            audio_codec: format.default_audio_codec().to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }

    /// Resolve the encoder from an optional requested format and platform.
    ///
    /// A platform's codecs apply when its container is the one in use. With
    /// neither a format nor a platform, `fallback` is used.
    pub fn resolve(
        requested: Option<&str>,
        platform: Option<&PlatformProfile>,
        fallback: OutputFormat,
    ) -> MediaResult<Self> {
        let requested = requested
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(OutputFormat::from_str)
            .transpose()?;

        let Some(profile) = platform else {
            return Ok(Self::for_format(requested.unwrap_or(fallback)));
        };

        let platform_format = profile.output_format.parse::<OutputFormat>()?;
        let format = requested.unwrap_or(platform_format);
        if format != platform_format {
            tracing::debug!(
                platform = %profile.name,
                requested = %format,
                preferred = %platform_format,
                "Requested format overrides platform container, using stock codecs"
            );
            return Ok(Self::for_format(format));
        }

        Ok(Self {
            format,
            video_codec: profile.video_codec.clone(),
            audio_codec: profile.audio_codec.clone(),
            audio_bitrate: profile.audio_bitrate.clone(),
        })
    }

    fn is_x264(&self) -> bool {
        self.video_codec == "libx264"
    }

    fn is_vp9(&self) -> bool {
        self.video_codec.contains("vp9")
    }

    /// Video encoder with its speed/quality preset and pixel format.
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.video_codec.clone()];
        if self.is_x264() {
            args.extend(
                ["-preset", "slower", "-profile:v", "high"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        } else if self.is_vp9() {
            args.extend(
                [
                    "-deadline",
                    "good",
                    "-cpu-used",
                    "2",
                    "-row-mt",
                    "1",
                    "-tile-columns",
                    "2",
                    "-frame-parallel",
                    "1",
                    "-auto-alt-ref",
                    "1",
                    "-lag-in-frames",
                    "25",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }
        args.push("-pix_fmt".to_string());
        args.push("yuv420p".to_string());
        args
    }

    /// Quality-targeted rate control: `-crf`, with an optional bitrate
    /// ceiling (constrained quality for VP9, VBV cap for x264).
    pub fn crf_args(&self, crf: u32, ceiling: Option<&BitratePlan>) -> Vec<String> {
        let mut args = vec!["-crf".to_string(), crf.to_string()];
        match ceiling {
            Some(plan) if self.is_x264() => {
                args.extend([
                    "-maxrate".to_string(),
                    plan.formatted.clone(),
                    "-bufsize".to_string(),
                    plan.bufsize(),
                ]);
            }
            Some(plan) => {
                args.extend(["-b:v".to_string(), plan.formatted.clone()]);
            }
            None if self.is_vp9() => {
                args.extend(["-b:v".to_string(), "0".to_string()]);
            }
            None => {}
        }
        args
    }

    /// Bitrate-targeted rate control for platform encodes.
    pub fn bitrate_args(&self, plan: &BitratePlan) -> Vec<String> {
        let mut args = vec!["-b:v".to_string(), plan.formatted.clone()];
        if self.is_x264() {
            args.extend([
                "-maxrate".to_string(),
                plan.formatted.clone(),
                "-bufsize".to_string(),
                plan.bufsize(),
            ]);
        }
        args.extend(
            ["-g", "60", "-keyint_min", "30"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    pub fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// Container flags applied last.
    pub fn container_args(&self) -> Vec<String> {
        match self.format {
            OutputFormat::Mp4 => vec!["-movflags".to_string(), "+faststart".to_string()],
            OutputFormat::Webm => Vec::new(),
        }
    }
}
