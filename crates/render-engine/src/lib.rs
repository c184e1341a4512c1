//! Clipgrid Render Engine
//!
//! Drives the external media engine (ffmpeg/ffprobe) to execute split and
//! template jobs planned by `clipgrid-processing-core`.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input_0 ──┐
//! input_1 ──┼── (obscurify) ── probe ── plan
//!   ...   ──┘                             │
//!                                         ├── fit + encode each cell (CRF loop)
//!                                         │         │
//!                                         │         ▼
//!                                         ├── hstack/vstack + overlay
//!                                         │         │
//!                                         │         ▼
//!                                         ├── outro card + concat
//!                                         │         │
//!                                         │         ▼
//!                                         └── as-composed → tightened
//!                                                   │
//!                                                   ▼
//!                                              output.mp4
//! ```
//!
//! Every job writes into its own [`workspace::JobWorkspace`]; only finished
//! artifacts are moved to their destination.

pub mod command;
pub mod engine;
pub mod filters;
pub mod format;
pub mod job;
pub mod probe;
pub mod split;
pub mod template;
pub mod workspace;

pub use command::FfmpegCommand;
pub use engine::{FfmpegEngine, MediaEngine};
pub use format::{EncoderSettings, OutputFormat};
pub use job::JobContext;
pub use split::{run_split, split_video, ChunkOutput, SplitReport, SplitRequest};
pub use template::{apply_template, run_template, TemplateReport, TemplateRequest};
