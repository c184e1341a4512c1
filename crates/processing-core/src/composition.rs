//! Composition planning for multi-input templates.
//!
//! A template places N pre-probed sources into fixed cells of a canonical
//! canvas, stacks the cells into a grid, and optionally adds a corner text
//! overlay and a trailing outro card. The plan is pure data; the render
//! engine turns it into filter graphs.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use clipgrid_common::config::CompositionDefaults;
use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_platform_core::PlatformProfile;

use crate::bitrate::{BitratePlan, BitratePlanner};
use crate::fit::{fit_dimensions, FitPlan, OrientationPolicy};
use crate::media::{even_floor, AudioInfo, Dimensions, MediaMetadata};

/// Overlay colours picked from when none is forced.
pub const OVERLAY_PALETTE: [&str; 6] = ["white", "yellow", "cyan", "#FF69B4", "#7CFC00", "#FFA500"];

/// Frame rate assumed for the outro when the main segment reports none.
pub const DEFAULT_OUTRO_FRAME_RATE: f64 = 30.0;

/// Supported template layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    /// `1x1`: one source, full frame.
    Single,
    /// `2x2`: four quadrants.
    Grid2x2,
    /// `3x1`: three full-height columns.
    Row3x1,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "1x1",
            Self::Grid2x2 => "2x2",
            Self::Row3x1 => "3x1",
        }
    }

    /// Exact number of sources the layout consumes.
    pub fn required_inputs(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Grid2x2 => 4,
            Self::Row3x1 => 3,
        }
    }

    /// Size of one cell on `canvas`.
    pub fn cell_dimensions(&self, canvas: Dimensions) -> Dimensions {
        match self {
            Self::Single => canvas.even_floor(),
            Self::Grid2x2 => Dimensions::new(even_floor(canvas.width / 2), even_floor(canvas.height / 2)),
            Self::Row3x1 => Dimensions::new(even_floor(canvas.width / 3), even_floor(canvas.height)),
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1x1" => Ok(Self::Single),
            "2x2" => Ok(Self::Grid2x2),
            "3x1" => Ok(Self::Row3x1),
            other => Err(MediaError::UnsupportedTemplate {
                name: other.to_string(),
            }),
        }
    }
}

/// Enforce the template's input count.
///
/// Too few inputs is an error; extra inputs are dropped with a warning.
pub fn select_inputs<T>(kind: TemplateKind, mut inputs: Vec<T>) -> MediaResult<Vec<T>> {
    let expected = kind.required_inputs();
    if inputs.len() < expected {
        return Err(MediaError::InvalidInputCount {
            template: kind.to_string(),
            expected,
            actual: inputs.len(),
        });
    }
    if inputs.len() > expected {
        tracing::warn!(
            template = %kind,
            expected,
            actual = inputs.len(),
            "Too many inputs for template, ignoring the extras"
        );
        inputs.truncate(expected);
    }
    Ok(inputs)
}

/// Canvas geometry and size ceilings for one template invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionLayout {
    pub canvas: Dimensions,
    /// Canvas was turned portrait for a portrait-only destination.
    pub portrait: bool,
    pub single_cell_max_bytes: u64,
    pub grid_cell_max_bytes: u64,
    pub row_cell_max_bytes: u64,
    /// Ceiling for the final artifact.
    pub max_total_bytes: u64,
    pub overlay_font_size: u32,
    pub overlay_margin: u32,
    pub outro_duration_secs: f64,
    pub outro_fade_in_secs: f64,
}

impl Default for CompositionLayout {
    fn default() -> Self {
        Self::from_defaults(&CompositionDefaults::default(), false)
    }
}

impl CompositionLayout {
    pub fn from_defaults(defaults: &CompositionDefaults, portrait: bool) -> Self {
        let landscape = Dimensions::new(defaults.canonical_width, defaults.canonical_height);
        let canvas = if portrait && landscape.is_landscape() {
            landscape.swapped()
        } else {
            landscape
        };

        Self {
            canvas: canvas.even_floor(),
            portrait,
            single_cell_max_bytes: defaults.single_cell_max_bytes,
            grid_cell_max_bytes: defaults.grid_cell_max_bytes,
            row_cell_max_bytes: defaults.row_cell_max_bytes,
            max_total_bytes: defaults.max_total_bytes,
            overlay_font_size: if portrait {
                defaults.overlay_portrait_font_size
            } else {
                defaults.overlay_font_size
            },
            overlay_margin: defaults.overlay_margin,
            outro_duration_secs: defaults.outro_duration_secs,
            outro_fade_in_secs: defaults.outro_fade_in_secs,
        }
    }

    /// Layout for an optional destination platform: portrait-only platforms
    /// get a portrait canvas, and the total ceiling never exceeds the
    /// platform's upload limit.
    pub fn for_platform(defaults: &CompositionDefaults, platform: Option<&PlatformProfile>) -> Self {
        let Some(profile) = platform else {
            return Self::from_defaults(defaults, false);
        };
        let mut layout = Self::from_defaults(defaults, profile.force_portrait);
        layout.max_total_bytes = layout.max_total_bytes.min(profile.max_file_size);
        layout
    }

    /// Per-cell size ceiling for `kind`.
    pub fn cell_ceiling(&self, kind: TemplateKind) -> u64 {
        match kind {
            TemplateKind::Single => self.single_cell_max_bytes,
            TemplateKind::Grid2x2 => self.grid_cell_max_bytes,
            TemplateKind::Row3x1 => self.row_cell_max_bytes,
        }
    }
}

/// Cell adjacency: rows of cell indices, stacked top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTopology {
    pub rows: Vec<Vec<usize>>,
}

impl StackTopology {
    pub fn for_kind(kind: TemplateKind) -> Self {
        let rows = match kind {
            TemplateKind::Single => vec![vec![0]],
            TemplateKind::Grid2x2 => vec![vec![0, 1], vec![2, 3]],
            TemplateKind::Row3x1 => vec![vec![0, 1, 2]],
        };
        Self { rows }
    }

    pub fn columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Frame size of the stacked grid for uniform cells.
    pub fn output_dimensions(&self, cell: Dimensions) -> Dimensions {
        Dimensions::new(
            cell.width * self.columns() as u32,
            cell.height * self.rows.len() as u32,
        )
    }
}

/// Overlay anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Corner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Corner {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top-left" => Ok(Self::TopLeft),
            "top-right" => Ok(Self::TopRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "bottom-right" => Ok(Self::BottomRight),
            other => Err(MediaError::invalid_argument(format!(
                "unknown overlay corner '{other}' (expected top-left, top-right, bottom-left or bottom-right)"
            ))),
        }
    }
}

/// Overlay as asked for by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRequest {
    pub text: String,
    pub corner: Corner,
    /// Forced colour; picked from [`OVERLAY_PALETTE`] when absent.
    pub color: Option<String>,
}

impl OverlayRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            corner: Corner::default(),
            color: None,
        }
    }
}

/// Resolved corner text box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub text: String,
    pub corner: Corner,
    pub color: String,
    pub font_size: u32,
    pub margin: u32,
}

/// Pick an overlay colour from the palette.
pub fn pick_overlay_color<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    OVERLAY_PALETTE[rng.random_range(0..OVERLAY_PALETTE.len())]
}

/// Trailing title card, before its encoding parameters are known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutroRequest {
    pub lines: Vec<String>,
    pub duration_secs: f64,
    pub fade_in_secs: f64,
}

impl OutroRequest {
    /// Derive the outro's encoding parameters from the probed main segment,
    /// so both halves can be joined by stream copy.
    pub fn resolve(&self, main: &MediaMetadata, font_size: u32) -> OutroSpec {
        OutroSpec {
            lines: self.lines.clone(),
            duration_secs: self.duration_secs,
            fade_in_secs: self.fade_in_secs.min(self.duration_secs),
            dimensions: main.dimensions(),
            frame_rate: main
                .frame_rate
                .filter(|fps| fps.is_finite() && *fps > 0.0)
                .unwrap_or(DEFAULT_OUTRO_FRAME_RATE),
            audio: main.audio.clone(),
            font_size,
        }
    }
}

/// Fully parameterized outro segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutroSpec {
    pub lines: Vec<String>,
    pub duration_secs: f64,
    pub fade_in_secs: f64,
    pub dimensions: Dimensions,
    pub frame_rate: f64,
    /// Silent track parameters matching the main segment, if it has audio.
    pub audio: Option<AudioInfo>,
    pub font_size: u32,
}

/// One source placed in one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSpec {
    pub index: usize,
    pub source: PathBuf,
    pub metadata: MediaMetadata,
    pub cell: Dimensions,
    pub fit: FitPlan,
    /// Size ceiling for this cell's encode.
    pub ceiling_bytes: u64,
    /// Budget bitrate derived from the ceiling and the source duration.
    pub bitrate: BitratePlan,
}

/// Everything the engine needs to render one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionPlan {
    pub kind: TemplateKind,
    pub cells: Vec<CellSpec>,
    pub topology: StackTopology,
    /// Frame size of the composed grid.
    pub output: Dimensions,
    pub overlay: Option<OverlaySpec>,
    pub outro: Option<OutroRequest>,
    /// Cell whose audio track is carried into the composition.
    pub audio_source: Option<usize>,
    pub total_ceiling_bytes: u64,
    /// Length of the composed main segment.
    pub duration_secs: f64,
}

impl CompositionPlan {
    /// Budget bitrate for the composed segment under the total ceiling.
    pub fn total_bitrate(&self, planner: &BitratePlanner) -> MediaResult<BitratePlan> {
        planner.for_budget(self.total_ceiling_bytes, self.duration_secs)
    }
}

/// Builds [`CompositionPlan`]s for one layout.
#[derive(Debug, Clone, Default)]
pub struct CompositionPlanner {
    layout: CompositionLayout,
    bitrate: BitratePlanner,
}

impl CompositionPlanner {
    pub fn new(layout: CompositionLayout, bitrate: BitratePlanner) -> Self {
        Self { layout, bitrate }
    }

    pub fn layout(&self) -> &CompositionLayout {
        &self.layout
    }

    /// Plan a template from probed sources.
    ///
    /// `rng` picks the overlay colour when the request does not force one.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        kind: TemplateKind,
        inputs: Vec<(PathBuf, MediaMetadata)>,
        overlay: Option<OverlayRequest>,
        outro_lines: Vec<String>,
        rng: &mut R,
    ) -> MediaResult<CompositionPlan> {
        let inputs = select_inputs(kind, inputs)?;
        let cell = kind.cell_dimensions(self.layout.canvas);
        let ceiling_bytes = self.layout.cell_ceiling(kind);

        let mut cells = Vec::with_capacity(inputs.len());
        for (index, (source, metadata)) in inputs.into_iter().enumerate() {
            metadata.validate()?;
            let fit = fit_dimensions(metadata.dimensions(), cell, OrientationPolicy::FixedBox)?;
            let bitrate = self.bitrate.for_budget(ceiling_bytes, metadata.duration_secs)?;
            tracing::debug!(
                index,
                source = %source.display(),
                cell = %cell,
                scaled = %fit.scaled,
                bitrate = %bitrate.formatted,
                "Planned template cell"
            );
            cells.push(CellSpec {
                index,
                source,
                metadata,
                cell,
                fit,
                ceiling_bytes,
                bitrate,
            });
        }

        let topology = StackTopology::for_kind(kind);
        let output = topology.output_dimensions(cell);

        // Stacked inputs end with the shortest cell.
        let duration_secs = cells
            .iter()
            .map(|c| c.metadata.duration_secs)
            .fold(f64::INFINITY, f64::min);

        let overlay = overlay
            .filter(|request| !request.text.trim().is_empty())
            .map(|request| OverlaySpec {
                color: request
                    .color
                    .unwrap_or_else(|| pick_overlay_color(rng).to_string()),
                text: request.text,
                corner: request.corner,
                font_size: self.layout.overlay_font_size,
                margin: self.layout.overlay_margin,
            });

        let outro_lines: Vec<String> = outro_lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        let outro = (!outro_lines.is_empty()).then(|| OutroRequest {
            lines: outro_lines,
            duration_secs: self.layout.outro_duration_secs,
            fade_in_secs: self.layout.outro_fade_in_secs,
        });

        let audio_source = cells.iter().position(|c| c.metadata.audio.is_some());

        tracing::info!(
            template = %kind,
            output = %output,
            cells = cells.len(),
            overlay = overlay.is_some(),
            outro = outro.is_some(),
            "Composition planned"
        );

        Ok(CompositionPlan {
            kind,
            cells,
            topology,
            output,
            overlay,
            outro,
            audio_source,
            total_ceiling_bytes: self.layout.max_total_bytes,
            duration_secs,
        })
    }
}
