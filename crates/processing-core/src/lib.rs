//! Clipgrid Processing Core
//!
//! The planning layer between the CLI and the media engine:
//! - **Fit:** output dimensions and crop-or-pad decisions per target box
//! - **Bitrate:** platform-driven and budget-driven bitrate plans
//! - **Size Loop:** CRF escalation until an output fits a byte ceiling
//! - **Fallback:** ordered attempt/verify/escalate strategy chains
//! - **Composition:** grid layouts, overlays, and outro segments
//! - **Split:** duration-bounded chunk plans
//!
//! This crate is pure computation: no I/O, no engine invocations.
//! All inputs are data; all outputs are data.

pub mod bitrate;
pub mod composition;
pub mod fallback;
pub mod fit;
pub mod media;
pub mod size_loop;
pub mod split;

pub use bitrate::BitratePlan;
pub use composition::{CompositionPlan, TemplateKind};
pub use fit::{fit_dimensions, FitPlan, OrientationPolicy};
pub use media::{Dimensions, MediaMetadata};
pub use size_loop::{CrfPolicy, SizeConstrainedLoop};
