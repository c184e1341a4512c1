//! ffmpeg invocation builder.

use std::path::{Path, PathBuf};

/// Flags prepended to every invocation.
const GLOBAL_ARGS: [&str; 4] = ["-y", "-hide_banner", "-loglevel", "error"];

/// One `-i` input with its input-side options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub options: Vec<String>,
    pub source: String,
}

/// A single ffmpeg invocation: ordered inputs, an optional filter graph,
/// stream maps, output options and one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegCommand {
    inputs: Vec<InputSpec>,
    filter_complex: Option<String>,
    maps: Vec<String>,
    output_args: Vec<String>,
    output: PathBuf,
}

impl FfmpegCommand {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            inputs: Vec::new(),
            filter_complex: None,
            maps: Vec::new(),
            output_args: Vec::new(),
            output: output.into(),
        }
    }

    /// Plain file input.
    pub fn input(self, path: &Path) -> Self {
        self.input_with(Vec::new(), path.to_string_lossy())
    }

    /// Input with options placed before its `-i`.
    pub fn input_with(mut self, options: Vec<String>, source: impl Into<String>) -> Self {
        self.inputs.push(InputSpec {
            options,
            source: source.into(),
        });
        self
    }

    /// File input read from `start_secs`, bounded to `duration_secs` if given.
    pub fn seek_input(self, path: &Path, start_secs: f64, duration_secs: Option<f64>) -> Self {
        let mut options = vec!["-ss".to_string(), fmt_secs(start_secs)];
        if let Some(duration) = duration_secs {
            options.push("-t".to_string());
            options.push(fmt_secs(duration));
        }
        self.input_with(options, path.to_string_lossy())
    }

    /// Synthetic `lavfi` source such as `color=...` or `anullsrc=...`.
    pub fn lavfi_input(self, graph: impl Into<String>, duration_secs: f64) -> Self {
        self.input_with(
            vec![
                "-f".to_string(),
                "lavfi".to_string(),
                "-t".to_string(),
                fmt_secs(duration_secs),
            ],
            graph,
        )
    }

    /// Concat-demuxer list file.
    pub fn concat_input(self, list: &Path) -> Self {
        self.input_with(
            vec![
                "-f".to_string(),
                "concat".to_string(),
                "-safe".to_string(),
                "0".to_string(),
            ],
            list.to_string_lossy(),
        )
    }

    pub fn filter_complex(mut self, graph: impl Into<String>) -> Self {
        self.filter_complex = Some(graph.into());
        self
    }

    pub fn map(mut self, stream: impl Into<String>) -> Self {
        self.maps.push(stream.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    /// Value following `flag` among the output options.
    pub fn output_option(&self, flag: &str) -> Option<&str> {
        self.output_args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|i| self.output_args.get(i + 1))
            .map(String::as_str)
    }

    /// Full argument vector, without the program name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = GLOBAL_ARGS.iter().map(|s| s.to_string()).collect();
        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }
        if let Some(graph) = &self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }
        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Seconds with millisecond precision, as ffmpeg accepts them.
pub fn fmt_secs(secs: f64) -> String {
    format!("{secs:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_order_is_inputs_graph_maps_options_output() {
        let cmd = FfmpegCommand::new("/tmp/out.mp4")
            .seek_input(Path::new("in.mp4"), 15.0, Some(15.0))
            .filter_complex("[0:v]null[v]")
            .map("[v]")
            .args(["-c:v", "libx264"]);

        assert_eq!(
            cmd.to_args(),
            vec![
                "-y", "-hide_banner", "-loglevel", "error", "-ss", "15.000", "-t", "15.000",
                "-i", "in.mp4", "-filter_complex", "[0:v]null[v]", "-map", "[v]", "-c:v",
                "libx264", "/tmp/out.mp4",
            ]
        );
    }

    #[test]
    fn open_ended_seek_has_no_duration() {
        let cmd = FfmpegCommand::new("out.webm").seek_input(Path::new("in.mp4"), 45.0, None);
        assert_eq!(cmd.inputs()[0].options, vec!["-ss", "45.000"]);
    }

    #[test]
    fn output_option_lookup() {
        let cmd = FfmpegCommand::new("out.mp4").args(["-crf", "23", "-c:a", "copy"]);
        assert_eq!(cmd.output_option("-crf"), Some("23"));
        assert_eq!(cmd.output_option("-c:a"), Some("copy"));
        assert_eq!(cmd.output_option("-b:v"), None);
    }

    #[test]
    fn concat_and_lavfi_inputs() {
        let cmd = FfmpegCommand::new("out.mp4")
            .lavfi_input("color=c=black:s=1280x720:r=30", 3.0)
            .concat_input(Path::new("list.txt"));
        let args = cmd.to_args();
        assert!(args.windows(2).any(|w| w == ["-f", "lavfi"]));
        assert!(args.windows(4).any(|w| w == ["-f", "concat", "-safe", "0"]));
    }
}
