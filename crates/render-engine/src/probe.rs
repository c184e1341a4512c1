//! ffprobe JSON parsing.

use std::path::Path;

use serde::Deserialize;

use clipgrid_common::error::{MediaError, MediaResult};
use clipgrid_processing_core::media::{AudioInfo, MediaMetadata};

/// Arguments placed before the probed path.
pub const FFPROBE_ARGS: [&str; 6] = [
    "-v",
    "quiet",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: Option<FfprobeFormat>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeStream {
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub nb_frames: Option<String>,
    pub bit_rate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
}

/// Container-level metadata.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
    pub size: Option<String>,
}

impl FfprobeOutput {
    fn first_stream(&self, kind: &str) -> Option<&FfprobeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    }
}

/// Parse ffprobe JSON for `path` into [`MediaMetadata`].
///
/// Duration comes from the video stream, then the container, then
/// `nb_frames / frame rate`. Bitrate comes from the container, then the
/// video stream, then `size * 8 / duration`.
pub fn parse_probe_output(json: &str, path: &Path) -> MediaResult<MediaMetadata> {
    let probe: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| MediaError::metadata_unavailable(path, format!("unparsable probe output: {e}")))?;

    let video = probe
        .first_stream("video")
        .ok_or_else(|| MediaError::metadata_unavailable(path, "no video stream"))?;

    let width = video.width.unwrap_or(0);
    let height = video.height.unwrap_or(0);
    if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
        return Err(MediaError::invalid_metadata(format!(
            "{}: invalid dimensions {width}x{height}",
            path.display()
        )));
    }

    let format = probe.format.as_ref();
    let frame_rate = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_fraction)
        .or_else(|| video.avg_frame_rate.as_deref().and_then(parse_fraction));

    let duration_secs = parse_positive(video.duration.as_deref())
        .or_else(|| parse_positive(format.and_then(|f| f.duration.as_deref())))
        .or_else(|| {
            let frames = parse_positive(video.nb_frames.as_deref())?;
            frame_rate.map(|fps| frames / fps)
        })
        .ok_or_else(|| {
            MediaError::invalid_metadata(format!("{}: no usable duration", path.display()))
        })?;

    let size_bytes = format
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.trim().parse::<u64>().ok());

    let bitrate = parse_positive(format.and_then(|f| f.bit_rate.as_deref()))
        .or_else(|| parse_positive(video.bit_rate.as_deref()))
        .or_else(|| size_bytes.map(|size| size as f64 * 8.0 / duration_secs))
        .map(|bps| bps.floor() as u64)
        .filter(|bps| *bps > 0);

    let audio = probe.first_stream("audio").map(|stream| AudioInfo {
        codec: stream.codec_name.clone().unwrap_or_default(),
        sample_rate: stream
            .sample_rate
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(48_000),
        channels: stream.channels.unwrap_or(2),
    });

    let metadata = MediaMetadata {
        duration_secs,
        width: width as u32,
        height: height as u32,
        codec: video.codec_name.clone().unwrap_or_default(),
        bitrate,
        frame_rate,
        size_bytes,
        audio,
    };
    metadata.validate()?;
    Ok(metadata)
}

/// Parse a fraction string like `"30/1"`; `None` for zero or malformed values.
fn parse_fraction(s: &str) -> Option<f64> {
    let value = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_positive(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("clip.mp4")
    }

    #[test]
    fn parses_typical_probe() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                 "r_frame_rate": "30000/1001", "duration": "60.060000", "bit_rate": "4800000"},
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "44100", "channels": 2}
            ],
            "format": {"duration": "60.100000", "bit_rate": "5000000", "size": "37562500"}
        }"#;

        let meta = parse_probe_output(json, path()).unwrap();
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(meta.codec, "h264");
        assert!((meta.duration_secs - 60.06).abs() < 1e-9);
        assert_eq!(meta.bitrate, Some(5_000_000));
        assert!((meta.frame_rate.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(meta.size_bytes, Some(37_562_500));
        let audio = meta.audio.unwrap();
        assert_eq!((audio.codec.as_str(), audio.sample_rate, audio.channels), ("aac", 44_100, 2));
    }

    #[test]
    fn duration_falls_back_to_container_then_frames() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "vp9", "width": 640, "height": 360}],
            "format": {"duration": "12.5"}
        }"#;
        assert_eq!(parse_probe_output(json, path()).unwrap().duration_secs, 12.5);

        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "vp9", "width": 640, "height": 360,
                         "nb_frames": "300", "r_frame_rate": "30/1"}],
            "format": {}
        }"#;
        assert_eq!(parse_probe_output(json, path()).unwrap().duration_secs, 10.0);
    }

    #[test]
    fn bitrate_falls_back_to_stream_then_size() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "duration": "10", "bit_rate": "800000"}],
            "format": {}
        }"#;
        assert_eq!(parse_probe_output(json, path()).unwrap().bitrate, Some(800_000));

        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360, "duration": "10"}],
            "format": {"size": "1250000"}
        }"#;
        assert_eq!(parse_probe_output(json, path()).unwrap().bitrate, Some(1_000_000));
    }

    #[test]
    fn degenerate_probe_is_invalid_metadata() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 0, "height": 360, "duration": "5"}]}"#;
        assert!(matches!(
            parse_probe_output(json, path()).unwrap_err(),
            MediaError::InvalidMetadata { .. }
        ));

        let json = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360}], "format": {}}"#;
        assert!(matches!(
            parse_probe_output(json, path()).unwrap_err(),
            MediaError::InvalidMetadata { .. }
        ));
    }

    #[test]
    fn missing_video_stream_is_unavailable() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3"}}"#;
        assert!(matches!(
            parse_probe_output(json, path()).unwrap_err(),
            MediaError::MetadataUnavailable { .. }
        ));
        assert!(matches!(
            parse_probe_output("not json", path()).unwrap_err(),
            MediaError::MetadataUnavailable { .. }
        ));
    }

    #[test]
    fn fractions() {
        assert_eq!(parse_fraction("30/1"), Some(30.0));
        assert_eq!(parse_fraction("25"), Some(25.0));
        assert_eq!(parse_fraction("0/0"), None);
        assert_eq!(parse_fraction("abc"), None);
    }
}
