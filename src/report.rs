//! Self-contained HTML report
//!
//! The page template, stylesheet, help text, icons and UI script are
//! embedded from `web-assets/` at compile time. Rendering fills the
//! template with the figure and the data tables the UI script reads, and
//! inlines every image as a data URI so the file can be mailed around on
//! its own.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Local, NaiveDate};
use log::warn;
use regex_lite::{Captures, Regex};
use rust_embed::RustEmbed;
use serde::Serialize;
use thiserror::Error;

use crate::figure::Figure;
use crate::labels::LabelSettings;
use crate::matrix::DistanceMatrix;
use crate::metadata::Metadata;

/// Embedded static assets
#[derive(RustEmbed)]
#[folder = "web-assets/"]
pub struct Assets;

const TEMPLATE: &str = "report.html";
const FAVICON: &str = "favicon.svg";

/// Errors that can occur when rendering a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Embedded asset '{0}' is missing")]
    MissingAsset(String),

    #[error("Embedded asset '{0}' is not valid UTF-8")]
    InvalidAsset(String),

    #[error("Template placeholder '{{{{{0}}}}}' has no value")]
    UnknownPlaceholder(String),

    #[error("Failed to read Plotly.js from {path}: {source}")]
    PlotlyJs {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize report data: {0}")]
    Json(#[from] serde_json::Error),
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([a-z_]+)\}\}").expect("placeholder pattern is valid"));

static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<img\b[^>]*?\bsrc=")([^"]+)(")"#).expect("img pattern is valid")
});

/// Where the report loads Plotly.js from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotlySource {
    Cdn(String),
    Inline(String),
}

impl PlotlySource {
    /// Inline a local copy when one is configured, else use the CDN
    pub fn resolve(local: Option<&Path>, cdn: &str) -> Result<Self, ReportError> {
        match local {
            Some(path) => fs::read_to_string(path)
                .map(Self::Inline)
                .map_err(|source| ReportError::PlotlyJs {
                    path: path.display().to_string(),
                    source,
                }),
            None => Ok(Self::Cdn(cdn.to_string())),
        }
    }

    fn script_tag(&self) -> String {
        match self {
            Self::Cdn(url) => format!(
                r#"<script src="{}" charset="utf-8"></script>"#,
                escape_html(url)
            ),
            Self::Inline(js) => format!("<script>{}</script>", js.replace("</script", "<\\/script")),
        }
    }
}

/// Label builder seed for the browser
#[derive(Serialize)]
struct LabelSeed<'a> {
    separator: &'a str,
    fields: &'a [String],
    label_by: &'a str,
}

/// Everything one report is built from
pub struct ReportInput<'a> {
    pub figure: &'a Figure,
    pub metadata: &'a Metadata,
    pub matrix: &'a DistanceMatrix,
    pub labels: &'a LabelSettings,
    pub plotly: &'a PlotlySource,
    pub plot_height: u32,
    pub generated: DateTime<Local>,
}

/// Default plot title for a report generated on `date`
pub fn default_title(date: NaiveDate) -> String {
    format!("Interactive Phylogeny, {}", date.format("%Y%m%d"))
}

/// Render the complete HTML document
pub fn render_report(input: &ReportInput<'_>) -> Result<String, ReportError> {
    let mut values: HashMap<&str, String> = HashMap::new();
    values.insert(
        "page_title",
        escape_html(&format!(
            "Intreeactive report (generated: {})",
            input.generated.format("%Y-%m-%d %H:%M:%S")
        )),
    );
    values.insert("favicon", asset_data_uri(FAVICON)?);
    values.insert("css", asset_text("main.css")?);
    values.insert("plotly", input.plotly.script_tag());
    values.insert("data", data_script(input)?);
    values.insert("plot_height", input.plot_height.to_string());
    values.insert("help", inline_images(&asset_text("help.html")?));
    values.insert("script", asset_text("main.js")?);

    fill_template(&asset_text(TEMPLATE)?, &values)
}

/// Replace each `{{name}}` in one pass, so substituted text is never
/// scanned again
fn fill_template(template: &str, values: &HashMap<&str, String>) -> Result<String, ReportError> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|name| !values.contains_key(name.as_str()))
    {
        return Err(ReportError::UnknownPlaceholder(missing));
    }

    Ok(PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned())
}

/// `const` declarations for the figure and data tables used by main.js
fn data_script(input: &ReportInput<'_>) -> Result<String, ReportError> {
    let labels = LabelSeed {
        separator: &input.labels.separator,
        fields: &input.labels.fields,
        label_by: &input.labels.label_by,
    };
    Ok(format!(
        "const inputMetadata = {};\nconst inputSnpMatrix = {};\nconst inputFigure = {};\nconst labelSeed = {};\n",
        script_json(&input.metadata.to_json_by_id())?,
        script_json(&input.matrix.to_split_json()?)?,
        script_json(input.figure)?,
        script_json(&labels)?,
    ))
}

/// Serialize for embedding inside a `<script>` element
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ReportError> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn asset_bytes(name: &str) -> Result<Vec<u8>, ReportError> {
    Assets::get(name)
        .map(|file| file.data.into_owned())
        .ok_or_else(|| ReportError::MissingAsset(name.to_string()))
}

fn asset_text(name: &str) -> Result<String, ReportError> {
    String::from_utf8(asset_bytes(name)?).map_err(|_| ReportError::InvalidAsset(name.to_string()))
}

fn asset_data_uri(name: &str) -> Result<String, ReportError> {
    Ok(data_uri(name, &asset_bytes(name)?))
}

/// Base64 data URI, with the MIME type guessed from `name`
pub fn data_uri(name: &str, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    format!("data:{};base64,{}", mime.essence_str(), BASE64.encode(bytes))
}

/// Point every `<img src>` that names an embedded asset at a data URI.
/// Remote and already-inlined sources are left alone.
pub fn inline_images(html: &str) -> String {
    IMG_SRC
        .replace_all(html, |caps: &Captures<'_>| {
            let src = &caps[2];
            if src.starts_with("data:") || src.contains("://") {
                return caps[0].to_string();
            }
            match Assets::get(src) {
                Some(file) => format!("{}{}{}", &caps[1], data_uri(src, &file.data), &caps[3]),
                None => {
                    warn!("Image '{}' referenced in help text is not embedded", src);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Counts reported after a build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub title: String,
    pub leaves: usize,
    pub samples: usize,
    pub dropped: Vec<String>,
    pub allowed: Vec<String>,
    pub colour_columns: Vec<String>,
    pub output: String,
}

/// Write a short human-readable summary of a build
pub fn write_summary<W: Write>(summary: &BuildSummary, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "Interactive tree: {}", summary.title)?;
    writeln!(writer, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    writeln!(
        writer,
        "Leaves: {} | Samples with metadata: {}",
        summary.leaves, summary.samples
    )?;
    if !summary.allowed.is_empty() {
        writeln!(writer, "Allowed without data: {}", summary.allowed.join(", "))?;
    }
    if !summary.dropped.is_empty() {
        writeln!(
            writer,
            "Dropped {} metadata rows not in the tree",
            summary.dropped.len()
        )?;
    }
    if summary.colour_columns.is_empty() {
        writeln!(writer, "Colour by: (no colourable columns)")?;
    } else {
        writeln!(writer, "Colour by: {}", summary.colour_columns.join(", "))?;
    }
    writeln!(writer, "Written to {}", summary.output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::{FigureSettings, build_figure};
    use crate::layout::{DEFAULT_LEAF_SPACING, TreeLayout};
    use crate::table::parse_table;
    use crate::tree::newick;

    fn render(plotly: &PlotlySource) -> String {
        let tree = newick::parse("(A:1,(B:1,C:2):1);").unwrap();
        let layout = TreeLayout::compute(&tree, DEFAULT_LEAF_SPACING);
        let mut metadata = Metadata::from_table(
            parse_table("ID,note\nA,</script><b>x</b>\nB,b\nC,c\n").unwrap(),
            None,
        )
        .unwrap();
        let matrix = DistanceMatrix::from_table(
            parse_table(",A,B,C\nA,0,2,4\nB,2,0,3\nC,4,3,0\n").unwrap(),
        )
        .unwrap();
        metadata.add_nearest_neighbours(&matrix);
        let figure = build_figure(&tree, &layout, &metadata, &FigureSettings::default());

        render_report(&ReportInput {
            figure: &figure,
            metadata: &metadata,
            matrix: &matrix,
            labels: &LabelSettings::default(),
            plotly,
            plot_height: 900,
            generated: Local::now(),
        })
        .unwrap()
    }

    #[test]
    fn test_render_report() {
        let html = render(&PlotlySource::Cdn("https://cdn.example/plotly.js".into()));

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Intreeactive report (generated: "));
        assert!(html.contains(r#"<link rel="icon" href="data:image/svg+xml;base64,"#));
        assert!(html.contains(r#"<script src="https://cdn.example/plotly.js""#));
        assert!(html.contains("const inputMetadata = {"));
        assert!(html.contains(r#"const inputSnpMatrix = {"index":["A","B","C"],"data":[[0,2,4],[2,0,3],[4,3,0]]};"#));
        assert!(html.contains(r#""Nearest_neighbour":["B=2"]"#));
        assert!(html.contains("const inputFigure = {"));
        assert!(html.contains(r#"class="plotly-graph-div""#));
        assert!(html.contains("function showLabels"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_metadata_cannot_close_script() {
        let html = render(&PlotlySource::Cdn("https://cdn.example/plotly.js".into()));
        assert!(!html.contains("</script><b>"));
        assert!(html.contains(r"<\/script><b>x<\/b>"));
    }

    #[test]
    fn test_inline_plotly() {
        let html = render(&PlotlySource::Inline("window.Plotly = {};".into()));
        assert!(html.contains("<script>window.Plotly = {};</script>"));
        assert!(!html.contains("cdn.plot.ly"));
    }

    #[test]
    fn test_help_images_inlined() {
        let html = render(&PlotlySource::Cdn("x".into()));
        assert!(!html.contains(r#"src="help-dropdown.svg""#));
        assert!(html.contains(r#"src="data:image/svg+xml;base64,"#));
    }

    #[test]
    fn test_inline_images_leaves_remote_and_missing() {
        let html = r#"<img src="https://example.org/a.png"><img alt="x" src="nope.png">"#;
        assert_eq!(inline_images(html), html);
    }

    #[test]
    fn test_fill_template() {
        let values = HashMap::from([("a", "{{b}}".to_string()), ("b", "B".to_string())]);
        assert_eq!(fill_template("x{{a}}y{{b}}", &values).unwrap(), "x{{b}}yB");
        assert!(matches!(
            fill_template("{{c}}", &values),
            Err(ReportError::UnknownPlaceholder(name)) if name == "c"
        ));
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("a.png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_default_title() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(default_title(date), "Interactive Phylogeny, 20240307");
    }

    #[test]
    fn test_plotly_source_missing_file() {
        let err = PlotlySource::resolve(Some(Path::new("/no/such/plotly.js")), "cdn").unwrap_err();
        assert!(matches!(err, ReportError::PlotlyJs { .. }));
        assert_eq!(
            PlotlySource::resolve(None, "cdn").unwrap(),
            PlotlySource::Cdn("cdn".into())
        );
    }

    #[test]
    fn test_write_summary() {
        let summary = BuildSummary {
            title: "T".into(),
            leaves: 3,
            samples: 3,
            dropped: vec!["Z".into()],
            allowed: vec![],
            colour_columns: vec!["country".into()],
            output: "out.html".into(),
        };
        let mut buf = Vec::new();
        write_summary(&summary, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Leaves: 3 | Samples with metadata: 3"));
        assert!(text.contains("Dropped 1 metadata rows"));
        assert!(text.contains("Colour by: country"));
    }

    /// Source of a top-level function in the embedded UI script
    fn script_function(name: &str) -> String {
        let script = asset_text("main.js").unwrap();
        let start = script.find(&format!("function {}(", name)).unwrap();
        let end = start + script[start..].find("\n}\n").unwrap();
        script[start..end].to_string()
    }

    #[test]
    fn test_clearing_compare_restores_colours() {
        let clear = script_function("clearMetadataIdsAndResults");
        assert!(clear.contains("if (state.customColours)"));
        assert!(clear.contains("restoreOriginalColours()"));
    }

    #[test]
    fn test_colour_change_resets_highlight() {
        let handler = script_function("colourColumnChanged");
        assert!(handler.contains(r#""marker.size": MARKER_SIZE"#));
        assert!(handler.contains(r#"byId("highlightInput").value = """#));
        assert!(script_function("init").contains(r#"plot.on("plotly_update", colourColumnChanged)"#));
    }

    #[test]
    fn test_dimmed_colour() {
        let script = asset_text("main.js").unwrap();
        assert!(script.contains(r#"const DIMMED_COLOUR = "rgb(100, 100, 100)";"#));
    }
}
