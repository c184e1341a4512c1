//! Bitrate planning.
//!
//! Two modes:
//! - **Platform-driven:** the profile's preferred bitrate, capped at 105% of
//!   the probed source bitrate so an encode never invents information the
//!   source does not have.
//! - **Budget-driven:** `floor(size_budget_bits / duration)`, uncapped, for
//!   outputs that must land under a byte ceiling.

use serde::{Deserialize, Serialize};

use clipgrid_common::error::{MediaError, MediaResult};

/// Used when a configured bitrate string cannot be parsed.
pub const DEFAULT_VIDEO_BITRATE_BPS: u64 = 2_000_000;

/// Headroom over the source bitrate a platform encode may use.
pub const SOURCE_HEADROOM: f64 = 1.05;

/// Magnitude suffix of a bitrate string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitrateUnit {
    Bps,
    Kilo,
    Mega,
}

impl BitrateUnit {
    fn multiplier(self) -> u64 {
        match self {
            Self::Bps => 1,
            Self::Kilo => 1_000,
            Self::Mega => 1_000_000,
        }
    }
}

/// Parse "2M", "128k", "1.5M" or "800000" into bits per second.
///
/// Returns `None` for empty, malformed, or zero values.
pub fn parse_bitrate(value: &str) -> Option<(u64, BitrateUnit)> {
    let value = value.trim();
    let (number, unit) = match value.chars().last()? {
        'M' | 'm' => (&value[..value.len() - 1], BitrateUnit::Mega),
        'k' | 'K' => (&value[..value.len() - 1], BitrateUnit::Kilo),
        _ => (value, BitrateUnit::Bps),
    };

    let number: f64 = number.trim().parse().ok()?;
    if !number.is_finite() || number <= 0.0 {
        return None;
    }

    let bps = (number * unit.multiplier() as f64).floor() as u64;
    (bps > 0).then_some((bps, unit))
}

/// Render `bps` in the given magnitude convention without rounding up.
///
/// Values that are not an exact multiple of the unit drop to the next
/// smaller unit so the string never overstates the planned rate.
pub fn format_bitrate(bps: u64, unit: BitrateUnit) -> String {
    match unit {
        BitrateUnit::Mega if bps % 1_000_000 == 0 => format!("{}M", bps / 1_000_000),
        BitrateUnit::Mega | BitrateUnit::Kilo if bps >= 1_000 => format!("{}k", bps / 1_000),
        _ => bps.to_string(),
    }
}

/// A bitrate decision for one encode invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitratePlan {
    /// Rate the mode asked for.
    pub target_bps: u64,
    /// Rate actually used after any source cap.
    pub capped_bps: u64,
    /// `capped_bps` formatted for the engine.
    pub formatted: String,
}

impl BitratePlan {
    /// Whether the source cap lowered the target.
    pub fn was_capped(&self) -> bool {
        self.capped_bps < self.target_bps
    }

    /// Rate-control buffer size: twice the capped rate.
    pub fn bufsize(&self) -> String {
        format_bitrate(self.capped_bps * 2, BitrateUnit::Kilo)
    }
}

/// Plans bitrates with a configurable fallback for unparsable strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitratePlanner {
    fallback_bps: u64,
    fallback_unit: BitrateUnit,
}

impl Default for BitratePlanner {
    fn default() -> Self {
        Self {
            fallback_bps: DEFAULT_VIDEO_BITRATE_BPS,
            fallback_unit: BitrateUnit::Mega,
        }
    }
}

impl BitratePlanner {
    /// Planner whose fallback is `fallback` (itself falling back to 2M).
    pub fn new(fallback: &str) -> Self {
        match parse_bitrate(fallback) {
            Some((fallback_bps, fallback_unit)) => Self {
                fallback_bps,
                fallback_unit,
            },
            None => Self::default(),
        }
    }

    /// Platform-driven plan: `preferred`, capped at `source_bps * 1.05`.
    pub fn for_platform(&self, preferred: &str, source_bps: Option<u64>) -> BitratePlan {
        let (target_bps, unit) = parse_bitrate(preferred).unwrap_or_else(|| {
            tracing::warn!(
                bitrate = preferred,
                fallback_bps = self.fallback_bps,
                "Unparsable platform bitrate, using fallback"
            );
            (self.fallback_bps, self.fallback_unit)
        });

        let capped_bps = match source_bps.filter(|bps| *bps > 0) {
            Some(source) => {
                let ceiling = (source as f64 * SOURCE_HEADROOM).floor() as u64;
                if target_bps > ceiling {
                    tracing::debug!(
                        target_bps,
                        ceiling,
                        source_bps = source,
                        "Capping target bitrate to source"
                    );
                }
                target_bps.min(ceiling).max(1)
            }
            None => target_bps,
        };

        BitratePlan {
            target_bps,
            capped_bps,
            formatted: format_bitrate(capped_bps, unit),
        }
    }

    /// Budget-driven plan: `floor(size_budget_bytes * 8 / duration_secs)`.
    pub fn for_budget(&self, size_budget_bytes: u64, duration_secs: f64) -> MediaResult<BitratePlan> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(MediaError::invalid_argument(format!(
                "bitrate budget needs a positive duration, got {duration_secs}"
            )));
        }

        let target_bps = (size_budget_bytes as f64 * 8.0 / duration_secs).floor() as u64;
        Ok(BitratePlan {
            target_bps,
            capped_bps: target_bps,
            formatted: format_bitrate(target_bps, BitrateUnit::Kilo),
        })
    }
}
