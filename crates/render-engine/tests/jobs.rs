//! Split and template jobs driven against a scripted engine.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clipgrid_common::config::{AppConfig, CompositionDefaults};
use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_platform_core::PlatformRegistry;
use clipgrid_processing_core::composition::OverlayRequest;
use clipgrid_processing_core::media::{AudioInfo, MediaMetadata};
use clipgrid_render_engine::{
    run_split, run_template, FfmpegCommand, JobContext, MediaEngine, SplitRequest,
    TemplateRequest,
};

type SizeScript = Box<dyn Fn(&FfmpegCommand) -> MediaResult<u64> + Send + Sync>;

/// Engine that writes files of scripted sizes and probes everything as the
/// same source.
struct FakeEngine {
    metadata: MediaMetadata,
    sizes: SizeScript,
    commands: Mutex<Vec<FfmpegCommand>>,
    probes: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    fn new(metadata: MediaMetadata, sizes: impl Fn(&FfmpegCommand) -> MediaResult<u64> + Send + Sync + 'static) -> Self {
        Self {
            metadata,
            sizes: Box::new(sizes),
            commands: Mutex::new(Vec::new()),
            probes: Mutex::new(Vec::new()),
        }
    }

    fn commands(&self) -> Vec<FfmpegCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn probe_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }
}

impl MediaEngine for FakeEngine {
    fn probe(&self, path: &Path) -> MediaResult<MediaMetadata> {
        self.probes.lock().unwrap().push(path.to_path_buf());
        if !path.exists() {
            return Err(MediaError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(self.metadata.clone())
    }

    fn run(&self, command: &FfmpegCommand) -> MediaResult<()> {
        self.commands.lock().unwrap().push(command.clone());
        let size = (self.sizes)(command)?;
        std::fs::write(command.output(), vec![0u8; size as usize])?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "fake"
    }
}

fn source_metadata(duration_secs: f64) -> MediaMetadata {
    let mut metadata = MediaMetadata::new(duration_secs, 1920, 1080, "h264");
    metadata.bitrate = Some(4_000_000);
    metadata.frame_rate = Some(30.0);
    metadata.audio = Some(AudioInfo {
        codec: "aac".into(),
        sample_rate: 48_000,
        channels: 2,
    });
    metadata
}

/// Small ceilings so scripted files stay tiny.
fn small_config() -> AppConfig {
    AppConfig {
        composition: CompositionDefaults {
            single_cell_max_bytes: 1_000,
            grid_cell_max_bytes: 1_000,
            row_cell_max_bytes: 1_000,
            max_total_bytes: 4_000,
            ..CompositionDefaults::default()
        },
        ..AppConfig::default()
    }
}

fn file_name(command: &FfmpegCommand) -> String {
    command
        .output()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn crf(command: &FfmpegCommand) -> u32 {
    command
        .output_option("-crf")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn write_inputs(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("clip_{i}.mp4"));
            std::fs::write(&path, b"source").unwrap();
            path
        })
        .collect()
}

/// Cells fit at CRF 23, the composition at `main` bytes, the tightened pass
/// at `tightened` bytes.
fn template_sizes(main: u64, tightened: u64) -> impl Fn(&FfmpegCommand) -> MediaResult<u64> {
    move |command: &FfmpegCommand| {
        let name = file_name(command);
        Ok(if name.starts_with("cell_") {
            if crf(command) >= 23 {
                900
            } else {
                1_500
            }
        } else if name.starts_with("main") || name.starts_with("joined") {
            main
        } else if name.starts_with("tightened") {
            tightened
        } else {
            500
        })
    }
}

#[test]
fn grid_template_escalates_cells_and_keeps_composition() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 4);
    let engine = FakeEngine::new(source_metadata(20.0), template_sizes(3_000, 0));
    let registry = PlatformRegistry::with_builtins();
    let config = small_config();
    let ctx = JobContext::new(&engine, &registry, &config);

    let mut request = TemplateRequest::new(dir.path().join("out/grid.mov"), "2x2", inputs);
    request.overlay = Some(OverlayRequest::new("Day 1"));
    request.seed = Some(7);
    let report = run_template(&ctx, &request).unwrap();

    assert_eq!(report.output, dir.path().join("out/grid.mp4"));
    assert_eq!(std::fs::metadata(&report.output).unwrap().len(), 3_000);
    assert_eq!(report.size_bytes, 3_000);
    assert_eq!(report.final_strategy, "as-composed");
    assert_eq!((report.dimensions.width, report.dimensions.height), (1280, 720));
    assert_eq!(report.cells.len(), 4);
    for cell in &report.cells {
        assert_eq!(cell.history.len(), 2);
        assert_eq!(cell.final_crf(), Some(23));
    }

    let commands = engine.commands();
    let compose = commands
        .iter()
        .find(|c| file_name(c).starts_with("main"))
        .unwrap();
    assert_eq!(compose.inputs().len(), 4);
    let args = compose.to_args();
    let graph = args
        .iter()
        .skip_while(|a| *a != "-filter_complex")
        .nth(1)
        .unwrap();
    assert!(graph.contains("vstack=inputs=2"));
    assert!(graph.contains("text=Day 1:fontsize="));
    assert!(args.contains(&"-shortest".to_string()));
    assert!(args.contains(&"0:a:0".to_string()));
}

#[test]
fn oversized_composition_is_tightened() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 3);
    let engine = FakeEngine::new(source_metadata(20.0), template_sizes(5_000, 3_500));
    let registry = PlatformRegistry::with_builtins();
    let config = small_config();
    let ctx = JobContext::new(&engine, &registry, &config);

    let request = TemplateRequest::new(dir.path().join("row.mp4"), "3x1", inputs);
    let report = run_template(&ctx, &request).unwrap();

    assert_eq!(report.final_strategy, "tightened");
    assert_eq!(report.size_bytes, 3_500);
    let tighten = engine
        .commands()
        .into_iter()
        .find(|c| file_name(c).starts_with("tightened"))
        .unwrap();
    assert_eq!(tighten.output_option("-crf"), Some("23"));
    assert_eq!(tighten.output_option("-c:a"), Some("copy"));
}

#[test]
fn output_too_large_after_tightening_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 1);
    let engine = FakeEngine::new(source_metadata(20.0), template_sizes(5_000, 4_500));
    let registry = PlatformRegistry::with_builtins();
    let config = small_config();
    let ctx = JobContext::new(&engine, &registry, &config);

    let output = dir.path().join("single.mp4");
    let request = TemplateRequest::new(&output, "1x1", inputs);
    let err = run_template(&ctx, &request).unwrap_err();

    assert!(matches!(
        err,
        MediaError::OutputTooLarge {
            size: 4_500,
            limit: 4_000
        }
    ));
    assert!(!output.exists());
}

#[test]
fn wrong_input_count_fails_before_engine_work() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 3);
    let engine = FakeEngine::new(source_metadata(20.0), template_sizes(3_000, 0));
    let registry = PlatformRegistry::with_builtins();
    let config = small_config();
    let ctx = JobContext::new(&engine, &registry, &config);

    let request = TemplateRequest::new(dir.path().join("grid.mp4"), "2x2", inputs);
    let err = run_template(&ctx, &request).unwrap_err();

    assert!(matches!(
        err,
        MediaError::InvalidInputCount {
            expected: 4,
            actual: 3,
            ..
        }
    ));
    assert!(engine.commands().is_empty());
    assert_eq!(engine.probe_count(), 0);
}

#[test]
fn unknown_template_and_platform_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 1);
    let engine = FakeEngine::new(source_metadata(20.0), template_sizes(3_000, 0));
    let registry = PlatformRegistry::with_builtins();
    let config = small_config();
    let ctx = JobContext::new(&engine, &registry, &config);

    let request = TemplateRequest::new(dir.path().join("a.mp4"), "4x4", inputs.clone());
    assert!(matches!(
        run_template(&ctx, &request).unwrap_err(),
        MediaError::UnsupportedTemplate { .. }
    ));

    let mut request = TemplateRequest::new(dir.path().join("a.mp4"), "1x1", inputs);
    request.platform = Some("myspace".into());
    assert!(matches!(
        run_template(&ctx, &request).unwrap_err(),
        MediaError::UnsupportedPlatform { .. }
    ));
    assert!(engine.commands().is_empty());
}

#[test]
fn outro_and_obscurify_add_their_passes() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 1);
    let engine = FakeEngine::new(source_metadata(20.0), template_sizes(3_000, 0));
    let registry = PlatformRegistry::with_builtins();
    let config = small_config();
    let ctx = JobContext::new(&engine, &registry, &config);

    let mut request = TemplateRequest::new(dir.path().join("single.mp4"), "1x1", inputs);
    request.obscurify = true;
    request.outro_lines = vec!["Thanks for watching".into(), "  ".into()];
    let report = run_template(&ctx, &request).unwrap();
    assert!(report.output.exists());

    let commands = engine.commands();
    let obscured = commands
        .iter()
        .find(|c| file_name(c).starts_with("obscured_0"))
        .unwrap();
    assert!(obscured.output_option("-af").is_some());

    let card = commands
        .iter()
        .find(|c| file_name(c).starts_with("outro"))
        .unwrap();
    assert_eq!(card.inputs().len(), 2);
    // Every file probes as the 1080p source here.
    assert!(card.inputs()[0].source.starts_with("color=c=black:s=1920x1080"));
    assert!(card.inputs()[1].source.starts_with("anullsrc="));

    let joined = commands
        .iter()
        .find(|c| file_name(c).starts_with("joined"))
        .unwrap();
    assert_eq!(joined.output_option("-c"), Some("copy"));
}

#[test]
fn workspace_is_cleaned_up_after_job() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = write_inputs(dir.path(), 1);
    let engine = FakeEngine::new(source_metadata(20.0), template_sizes(5_000, 4_500));
    let registry = PlatformRegistry::with_builtins();
    let config = small_config();
    let ctx = JobContext::new(&engine, &registry, &config);

    let request = TemplateRequest::new(dir.path().join("single.mp4"), "1x1", inputs);
    assert!(run_template(&ctx, &request).is_err());

    let scratch = engine.commands()[0].output().parent().unwrap().to_path_buf();
    assert!(!scratch.exists());
}

#[test]
fn split_falls_back_to_reencode_when_copy_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("My Clip!.mp4");
    std::fs::write(&input, b"source").unwrap();
    let engine = FakeEngine::new(source_metadata(47.0), |command| {
        if command.output_option("-c") == Some("copy") {
            Err(MediaError::encode_failed("exit status: 1", "codec not supported in container"))
        } else {
            Ok(100)
        }
    });
    let registry = PlatformRegistry::with_builtins();
    let config = AppConfig::default();
    let ctx = JobContext::new(&engine, &registry, &config);

    let out = dir.path().join("chunks");
    let report = run_split(&ctx, &SplitRequest::new(&input, &out, 15)).unwrap();

    assert_eq!(report.chunks.len(), 4);
    for (i, chunk) in report.chunks.iter().enumerate() {
        assert_eq!(chunk.path, out.join(format!("My_Clip_chunk_{:03}.webm", i + 1)));
        assert!(chunk.path.exists());
        assert_eq!(chunk.strategy, "reencode");
        assert_eq!(chunk.start_secs, 15.0 * i as f64);
    }
    assert_eq!(report.chunks[3].duration_secs, None);
    assert_eq!(engine.commands().len(), 8);
}

#[test]
fn split_copies_when_possible() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("talk.mp4");
    std::fs::write(&input, b"source").unwrap();
    let engine = FakeEngine::new(source_metadata(47.0), |_: &FfmpegCommand| Ok(100));
    let registry = PlatformRegistry::with_builtins();
    let config = AppConfig::default();
    let ctx = JobContext::new(&engine, &registry, &config);

    let mut request = SplitRequest::new(&input, dir.path().join("out"), 20);
    request.skip = "7s".into();
    request.format = Some("mp4".into());
    let report = run_split(&ctx, &request).unwrap();

    // 40 remaining seconds in 20s chunks.
    assert_eq!(report.chunks.len(), 2);
    assert_eq!(report.chunks[0].start_secs, 7.0);
    assert!(report.chunks.iter().all(|c| c.strategy == "copy"));
    assert!(report.chunks[1].path.to_string_lossy().ends_with("talk_chunk_002.mp4"));
}

#[test]
fn split_for_platform_fits_and_caps_bitrate() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("talk.mp4");
    std::fs::write(&input, b"source").unwrap();
    let mut metadata = source_metadata(47.0);
    metadata.bitrate = Some(1_000_000);
    let engine = FakeEngine::new(metadata, |_: &FfmpegCommand| Ok(100));
    let registry = PlatformRegistry::with_builtins();
    let config = AppConfig::default();
    let ctx = JobContext::new(&engine, &registry, &config);

    let mut request = SplitRequest::new(&input, dir.path().join("out"), 30);
    request.platform = Some("tiktok".into());
    let report = run_split(&ctx, &request).unwrap();

    assert_eq!(report.chunks.len(), 2);
    assert!(report.chunks.iter().all(|c| c.strategy == "platform"));

    let first = &engine.commands()[0];
    assert_eq!(first.output_option("-b:v"), Some("1050k"));
    assert!(first
        .output_option("-vf")
        .unwrap()
        .ends_with("scale=1080:1920,setsar=1"));
}

#[test]
fn split_rejects_chunks_longer_than_platform_limit() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("talk.mp4");
    std::fs::write(&input, b"source").unwrap();
    let engine = FakeEngine::new(source_metadata(600.0), |_: &FfmpegCommand| Ok(100));
    let registry = PlatformRegistry::with_builtins();
    let config = AppConfig::default();
    let ctx = JobContext::new(&engine, &registry, &config);

    let mut request = SplitRequest::new(&input, dir.path().join("out"), 120);
    request.platform = Some("instagram-reel".into());
    let err = run_split(&ctx, &request).unwrap_err();
    assert!(err.to_string().contains("exceeds the platform maximum"));
    assert!(engine.commands().is_empty());
    assert!(!dir.path().join("out").exists());
}
