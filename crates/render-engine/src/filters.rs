//! Filter-graph strings for fits, grids, overlays, outros and obscurify.

use clipgrid_processing_core::composition::{CompositionPlan, Corner, OutroSpec, OverlaySpec};
use clipgrid_processing_core::fit::{FitPlan, FitStrategy};
use clipgrid_processing_core::media::{even_floor, Dimensions};

/// Label of the final video stream of a composition graph.
pub const COMPOSED_VIDEO_LABEL: &str = "vout";

/// Zoom applied by the obscurify pass before cropping back.
pub const OBSCURIFY_ZOOM: f64 = 1.025;

/// Audio chain of the obscurify pass (pitch up, tempo down).
pub const OBSCURIFY_AUDIO_FILTER: &str = "aresample=48000,asetrate=48000*1.05,atempo=0.95";

/// `-vf` chain realizing one fit plan.
pub fn fit_filter(fit: &FitPlan) -> String {
    let body = match &fit.strategy {
        FitStrategy::Scale => format!("scale={}:{}", fit.output.width, fit.output.height),
        FitStrategy::Pad(pad) => format!(
            "scale={}:{},pad={}:{}:{}:{}:{}",
            fit.scaled.width,
            fit.scaled.height,
            fit.output.width,
            fit.output.height,
            pad.left,
            pad.top,
            pad.color
        ),
        FitStrategy::Crop(crop) => format!(
            "crop={}:{}:{}:{},scale={}:{}",
            crop.width, crop.height, crop.x, crop.y, fit.output.width, fit.output.height
        ),
    };
    format!("{body},setsar=1")
}

fn backslash_escape(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape text for a drawtext `text=` value inside a filtergraph.
///
/// ffmpeg unescapes the value three times: the filtergraph parser
/// (`'`, `[`, `]`, `,`, `;`), the filter option parser (`'`, `:`) and
/// drawtext's own `%` expansion. Each level is escaped with backslashes,
/// innermost first, so the result is used unquoted.
pub fn escape_drawtext(text: &str) -> String {
    let expansion = backslash_escape(text, &['%']);
    let option = backslash_escape(&expansion, &['\'', ':']);
    backslash_escape(&option, &['\'', '[', ']', ',', ';'])
}

fn corner_position(corner: Corner, margin: u32) -> (String, String) {
    let left = margin.to_string();
    let right = format!("w-tw-{margin}");
    let top = margin.to_string();
    let bottom = format!("h-th-{margin}");
    match corner {
        Corner::TopLeft => (left, top),
        Corner::TopRight => (right, top),
        Corner::BottomLeft => (left, bottom),
        Corner::BottomRight => (right, bottom),
    }
}

/// Corner-anchored drawtext with border, shadow and a translucent box.
pub fn drawtext_filter(overlay: &OverlaySpec) -> String {
    let (x, y) = corner_position(overlay.corner, overlay.margin);
    format!(
        "drawtext=text={}:fontsize={}:fontcolor={}:bordercolor=black:borderw=2:\
         x={x}:y={y}:shadowcolor=black:shadowx=2:shadowy=2:\
         box=1:boxcolor=black@0.5:boxborderw=5",
        escape_drawtext(&overlay.text),
        overlay.font_size,
        overlay.color,
    )
}

/// `-filter_complex` stacking pre-fitted cell inputs (input `i` is cell `i`)
/// and drawing the optional overlay. The result is labelled
/// [`COMPOSED_VIDEO_LABEL`].
pub fn composition_graph(plan: &CompositionPlan) -> String {
    let mut chains = Vec::new();
    let mut row_labels = Vec::with_capacity(plan.topology.rows.len());

    for (r, row) in plan.topology.rows.iter().enumerate() {
        let inputs: String = row.iter().map(|i| format!("[{i}:v]")).collect();
        if row.len() == 1 {
            row_labels.push(inputs);
        } else {
            chains.push(format!("{inputs}hstack=inputs={}:shortest=1[row{r}]", row.len()));
            row_labels.push(format!("[row{r}]"));
        }
    }

    let stacked = if row_labels.len() == 1 {
        row_labels.remove(0)
    } else {
        chains.push(format!(
            "{}vstack=inputs={}:shortest=1[grid]",
            row_labels.concat(),
            row_labels.len()
        ));
        "[grid]".to_string()
    };

    let last = match &plan.overlay {
        Some(overlay) => drawtext_filter(overlay),
        None => "null".to_string(),
    };
    chains.push(format!("{stacked}{last}[{COMPOSED_VIDEO_LABEL}]"));
    chains.join(";")
}

/// Video chain of the outro card: centred lines over the colour source,
/// faded in from black.
pub fn outro_video_filter(outro: &OutroSpec) -> String {
    let line_height = outro.font_size as f64 * 1.5;
    let centre = (outro.lines.len() as f64 - 1.0) / 2.0;
    let mut filters: Vec<String> = outro
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let offset = ((i as f64 - centre) * line_height).round() as i64;
            format!(
                "drawtext=text={}:fontsize={}:fontcolor=white:x=(w-tw)/2:y=(h-th)/2{:+}",
                escape_drawtext(line),
                outro.font_size,
                offset
            )
        })
        .collect();
    if outro.fade_in_secs > 0.0 {
        filters.push(format!("fade=t=in:st=0:d={:.3}", outro.fade_in_secs));
    }
    filters.push("setsar=1".to_string());
    filters.join(",")
}

/// `lavfi` colour source sized like the main segment.
pub fn outro_color_source(outro: &OutroSpec) -> String {
    format!(
        "color=c=black:s={}x{}:r={}",
        outro.dimensions.width,
        outro.dimensions.height,
        fmt_rate(outro.frame_rate)
    )
}

/// `lavfi` silent audio matching the main segment's layout.
pub fn outro_silence_source(sample_rate: u32, channels: u32) -> String {
    let layout = if channels == 1 { "mono" } else { "stereo" };
    format!("anullsrc=channel_layout={layout}:sample_rate={sample_rate}")
}

/// Obscurify video chain: slight zoom cropped back to the source frame,
/// colour grade, sharpen and a soft vignette.
pub fn obscurify_video_filter(source: Dimensions) -> String {
    let frame = source.even_floor();
    let zoomed = Dimensions::new(
        even_floor((frame.width as f64 * OBSCURIFY_ZOOM).round() as u32),
        even_floor((frame.height as f64 * OBSCURIFY_ZOOM).round() as u32),
    );
    [
        format!("scale={}:{}", zoomed.width, zoomed.height),
        format!("crop={}:{}", frame.width, frame.height),
        "eq=gamma=1.05:saturation=1.2:contrast=1.1".to_string(),
        "unsharp=3:3:1.5:3:3:0.5".to_string(),
        "vignette=a=0.628319:x0=w/2:y0=h/2".to_string(),
    ]
    .join(",")
}

fn fmt_rate(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as u64)
    } else {
        format!("{fps:.3}")
    }
}
