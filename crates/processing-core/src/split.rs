//! Split planning: chunk boundaries, skip offsets and chunk naming.

use std::path::Path;

use serde::{Deserialize, Serialize};

use clipgrid_common::error::{MediaError, MediaResult};

/// Stem used when sanitizing leaves nothing of the input name.
pub const FALLBACK_STEM: &str = "video";

/// Parse a skip offset such as `"90s"`, `"1m30s"`, `"1.5m"` or `"500ms"`
/// into seconds. An empty string means no skip.
pub fn parse_skip_duration(value: &str) -> MediaResult<f64> {
    let value = value.trim();
    if value.is_empty() || value == "0" {
        return Ok(0.0);
    }

    let invalid = || MediaError::invalid_argument(format!("invalid skip duration '{value}'"));

    let mut rest = value.strip_prefix('+').unwrap_or(value);
    if rest.starts_with('-') {
        return Err(MediaError::invalid_argument(format!(
            "skip duration must not be negative, got '{value}'"
        )));
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if !number.chars().any(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let number: f64 = number.parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += number * scale;
    }

    Ok(total)
}

/// One output segment. The last chunk has no length bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkSpec {
    /// 0-based position.
    pub index: usize,
    pub start_secs: f64,
    /// `None` for the open-ended final chunk.
    pub duration_secs: Option<f64>,
}

impl ChunkSpec {
    /// 1-based number used in file names and logs.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn is_open_ended(&self) -> bool {
        self.duration_secs.is_none()
    }
}

/// All chunks of one split job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub chunks: Vec<ChunkSpec>,
    pub skip_secs: f64,
    pub chunk_secs: u32,
}

impl SplitPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Partition `[skip_secs, source_duration_secs)` into chunks of `chunk_secs`.
///
/// The chunk count is computed over whole seconds of the remaining span and
/// is at least one. `max_duration_secs` is the destination's per-upload
/// limit, when one applies.
pub fn plan_chunks(
    source_duration_secs: f64,
    chunk_secs: u32,
    skip_secs: f64,
    max_duration_secs: Option<u32>,
) -> MediaResult<SplitPlan> {
    if chunk_secs == 0 {
        return Err(MediaError::invalid_argument("chunk duration must be positive"));
    }
    if let Some(max) = max_duration_secs {
        if chunk_secs > max {
            return Err(MediaError::invalid_argument(format!(
                "chunk duration {chunk_secs}s exceeds the platform maximum of {max}s"
            )));
        }
    }
    if !skip_secs.is_finite() || skip_secs < 0.0 {
        return Err(MediaError::invalid_argument(format!(
            "invalid skip offset {skip_secs}"
        )));
    }

    let remaining = source_duration_secs - skip_secs;
    if remaining.is_nan() || remaining <= 0.0 {
        return Err(MediaError::invalid_argument(format!(
            "skip offset {skip_secs}s exceeds source duration {source_duration_secs}s"
        )));
    }

    let whole_secs = remaining.trunc() as u64;
    let count = whole_secs.div_ceil(chunk_secs as u64).max(1) as usize;

    let chunks = (0..count)
        .map(|index| ChunkSpec {
            index,
            start_secs: skip_secs + (index as u64 * chunk_secs as u64) as f64,
            duration_secs: (index + 1 < count).then_some(chunk_secs as f64),
        })
        .collect();

    Ok(SplitPlan {
        chunks,
        skip_secs,
        chunk_secs,
    })
}

/// Make a file stem safe for output names: characters outside
/// `[A-Za-z0-9-_.]` become `_`, runs of `_` collapse, and edge `_` are trimmed.
pub fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitized stem of `path`.
pub fn output_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sanitize_stem(&stem)
}

/// `<stem>_chunk_<NNN>.<ext>`
pub fn chunk_file_name(stem: &str, chunk: &ChunkSpec, extension: &str) -> String {
    format!("{stem}_chunk_{:03}.{extension}", chunk.number())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_style_durations() {
        assert_eq!(parse_skip_duration("").unwrap(), 0.0);
        assert_eq!(parse_skip_duration("0").unwrap(), 0.0);
        assert_eq!(parse_skip_duration("90s").unwrap(), 90.0);
        assert_eq!(parse_skip_duration("1m30s").unwrap(), 90.0);
        assert_eq!(parse_skip_duration("1.5m").unwrap(), 90.0);
        assert!((parse_skip_duration("500ms").unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(parse_skip_duration("1h").unwrap(), 3600.0);
        assert_eq!(parse_skip_duration("1h2m3s").unwrap(), 3723.0);
    }

    #[test]
    fn rejects_malformed_durations() {
        for bad in ["90", "s", "1x", "-5s", "1.5.2s", "abc", "+"] {
            let err = parse_skip_duration(bad).unwrap_err();
            assert!(
                matches!(err, MediaError::InvalidArgument { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn forty_seven_seconds_in_fifteen_second_chunks() {
        let plan = plan_chunks(47.0, 15, 0.0, None).unwrap();
        assert_eq!(plan.len(), 4);
        for (i, chunk) in plan.chunks[..3].iter().enumerate() {
            assert_eq!(chunk.start_secs, i as f64 * 15.0);
            assert_eq!(chunk.duration_secs, Some(15.0));
        }
        let last = plan.chunks[3];
        assert_eq!(last.start_secs, 45.0);
        assert!(last.is_open_ended());
    }

    #[test]
    fn skip_offsets_every_chunk() {
        let plan = plan_chunks(60.0, 20, 10.0, None).unwrap();
        let starts: Vec<f64> = plan.chunks.iter().map(|c| c.start_secs).collect();
        assert_eq!(starts, vec![10.0, 30.0, 50.0]);
        assert!(plan.chunks[2].is_open_ended());
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let plan = plan_chunks(45.4, 15, 0.0, None).unwrap();
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn short_remainder_still_yields_one_chunk() {
        let plan = plan_chunks(10.5, 15, 10.0, None).unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.chunks[0].is_open_ended());
    }

    #[test]
    fn invalid_split_arguments() {
        assert!(plan_chunks(47.0, 0, 0.0, None).is_err());
        assert!(plan_chunks(47.0, 15, 47.0, None).is_err());
        assert!(plan_chunks(47.0, 15, 60.0, None).is_err());
        let err = plan_chunks(600.0, 200, 0.0, Some(180)).unwrap_err();
        assert!(err.to_string().contains("platform maximum"));
    }

    #[test]
    fn sanitizes_stems() {
        assert_eq!(sanitize_stem("My Holiday (final)!"), "My_Holiday_final");
        assert_eq!(sanitize_stem("clip-01.v2"), "clip-01.v2");
        assert_eq!(sanitize_stem("___a  b___"), "a_b");
        assert_eq!(sanitize_stem("!!!"), FALLBACK_STEM);
        assert_eq!(output_stem(Path::new("/media/in put.mov")), "in_put");
    }

    #[test]
    fn chunk_names_are_zero_padded() {
        let chunk = ChunkSpec {
            index: 6,
            start_secs: 90.0,
            duration_secs: Some(15.0),
        };
        assert_eq!(chunk_file_name("talk", &chunk, "webm"), "talk_chunk_007.webm");
    }
}
