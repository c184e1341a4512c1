//! Dimension fitting.
//!
//! Decides how a source frame lands in a target box: a plain scale, a
//! scale plus centered padding, or (for portrait-only destinations) a
//! centered 9:16 crop followed by a scale.

use serde::{Deserialize, Serialize};

use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_platform_core::PlatformProfile;

use crate::media::{even_floor, Dimensions};

/// Portrait aspect used when cropping landscape sources (width:height).
pub const PORTRAIT_ASPECT: (u32, u32) = (9, 16);

/// Fill color for letterbox/pillarbox padding.
pub const DEFAULT_PAD_COLOR: &str = "black";

/// How the target box relates to the source orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationPolicy {
    /// Output is always portrait; landscape sources are center-cropped.
    ForcePortrait,
    /// The box is flipped to follow the source orientation before fitting.
    MatchSource,
    /// The box is used exactly as given (grid cells).
    FixedBox,
}

impl OrientationPolicy {
    pub fn for_profile(profile: &PlatformProfile) -> Self {
        if profile.force_portrait {
            Self::ForcePortrait
        } else {
            Self::MatchSource
        }
    }
}

/// Centered padding that grows scaled content to the full box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadSpec {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub color: String,
}

/// Source-space crop rectangle applied before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropSpec {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The transform chosen for one fit. Pad and crop never coexist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStrategy {
    Scale,
    Pad(PadSpec),
    Crop(CropSpec),
}

/// Result of fitting one source into one target box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitPlan {
    /// Final frame size (even, >= 2px).
    pub output: Dimensions,
    /// Size of the scaled content inside the frame.
    pub scaled: Dimensions,
    pub strategy: FitStrategy,
}

impl FitPlan {
    pub fn pad(&self) -> Option<&PadSpec> {
        match &self.strategy {
            FitStrategy::Pad(pad) => Some(pad),
            _ => None,
        }
    }

    pub fn crop(&self) -> Option<&CropSpec> {
        match &self.strategy {
            FitStrategy::Crop(crop) => Some(crop),
            _ => None,
        }
    }
}

/// Fit `source` into `target` under `policy`.
///
/// Fails with `InvalidMetadata` for a zero-sized source and with
/// `InvalidArgument` for a zero-sized target box.
pub fn fit_dimensions(
    source: Dimensions,
    target: Dimensions,
    policy: OrientationPolicy,
) -> MediaResult<FitPlan> {
    if source.width == 0 || source.height == 0 {
        return Err(MediaError::invalid_metadata(format!(
            "cannot fit degenerate source {source}"
        )));
    }
    if target.width == 0 || target.height == 0 {
        return Err(MediaError::invalid_argument(format!(
            "cannot fit into empty target box {target}"
        )));
    }

    let target = target.even_floor();

    if policy == OrientationPolicy::ForcePortrait {
        let target = if target.is_landscape() {
            target.swapped()
        } else {
            target
        };
        if source.is_landscape() {
            return Ok(portrait_crop(source, target));
        }
        return Ok(scale_into(source, target));
    }

    let target = if policy == OrientationPolicy::MatchSource
        && source.is_portrait() != target.is_portrait()
    {
        target.swapped()
    } else {
        target
    };

    Ok(scale_into(source, target))
}

/// Fit a source for a platform profile.
pub fn fit_for_profile(source: Dimensions, profile: &PlatformProfile) -> MediaResult<FitPlan> {
    let (width, height) = profile.target_box();
    fit_dimensions(
        source,
        Dimensions::new(width, height),
        OrientationPolicy::for_profile(profile),
    )
}

fn portrait_crop(source: Dimensions, target: Dimensions) -> FitPlan {
    let (aspect_w, aspect_h) = PORTRAIT_ASPECT;
    let crop_width = (source.height as u64 * aspect_w as u64 / aspect_h as u64) as u32;
    let crop_width = crop_width.clamp(1, source.width);
    let crop = CropSpec {
        x: (source.width - crop_width) / 2,
        y: 0,
        width: crop_width,
        height: source.height,
    };

    tracing::debug!(
        source = %source,
        crop_width,
        crop_x = crop.x,
        target = %target,
        "Cropping landscape source to portrait"
    );

    FitPlan {
        output: target,
        scaled: target,
        strategy: FitStrategy::Crop(crop),
    }
}

fn scale_into(source: Dimensions, target: Dimensions) -> FitPlan {
    let (sw, sh) = (source.width as u64, source.height as u64);
    let (tw, th) = (target.width as u64, target.height as u64);

    // Integer cross-multiplication keeps exact fits exact (1920x1080 -> 1280x720).
    let (scaled_w, scaled_h) = if tw * sh <= th * sw {
        (tw, tw * sh / sw)
    } else {
        (th * sw / sh, th)
    };

    let scaled = Dimensions::new(
        even_floor(scaled_w as u32).min(target.width),
        even_floor(scaled_h as u32).min(target.height),
    );

    if scaled == target {
        return FitPlan {
            output: target,
            scaled,
            strategy: FitStrategy::Scale,
        };
    }

    let left = (target.width - scaled.width) / 2;
    let top = (target.height - scaled.height) / 2;
    FitPlan {
        output: target,
        scaled,
        strategy: FitStrategy::Pad(PadSpec {
            left,
            top,
            right: target.width - scaled.width - left,
            bottom: target.height - scaled.height - top,
            color: DEFAULT_PAD_COLOR.to_string(),
        }),
    }
}
