//! Probed media facts and pixel geometry.

use serde::{Deserialize, Serialize};

use clipgrid_common::error::{MediaError, MediaResult};

/// A frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Strictly taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    /// Strictly wider than tall.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Width and height exchanged.
    pub fn swapped(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Both sides rounded down to even values, never below 2px.
    pub fn even_floor(&self) -> Self {
        Self::new(even_floor(self.width), even_floor(self.height))
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Round down to an even value with a 2px floor (yuv420p needs even sides).
pub fn even_floor(value: u32) -> u32 {
    (value - value % 2).max(2)
}

/// Audio stream facts, used to match parameters across concatenated segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
}

/// Snapshot of a probed media file.
///
/// Never cached across pipeline stages: whoever produces a derived file
/// re-probes it before planning the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    /// Video codec name as reported by the probe (e.g. "h264", "vp9").
    pub codec: String,
    /// Overall bitrate in bits per second, when the probe could derive one.
    pub bitrate: Option<u64>,
    pub frame_rate: Option<f64>,
    pub size_bytes: Option<u64>,
    pub audio: Option<AudioInfo>,
}

impl MediaMetadata {
    /// Minimal metadata with only the required fields set.
    pub fn new(duration_secs: f64, width: u32, height: u32, codec: impl Into<String>) -> Self {
        Self {
            duration_secs,
            width,
            height,
            codec: codec.into(),
            bitrate: None,
            frame_rate: None,
            size_bytes: None,
            audio: None,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Reject degenerate probes (zero duration or dimensions).
    pub fn validate(&self) -> MediaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaError::invalid_metadata(format!(
                "degenerate dimensions {}x{}",
                self.width, self.height
            )));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(MediaError::invalid_metadata(format!(
                "non-positive duration {}",
                self.duration_secs
            )));
        }
        Ok(())
    }
}
