//! Configuration file support for intreeactive
//!
//! Settings that rarely change between runs of the same project live in
//! `.intreeactive.toml` (or `intreeactive.toml`), found by searching up
//! from the working directory. Command-line options override the file.
//!
//! ## Configuration File Format
//!
//! ```toml
//! # .intreeactive.toml
//!
//! [report]
//! title = "Outbreak 42"
//! plot_height = 1200
//! # Inline a local copy of Plotly.js so the report works offline
//! plotly_js = "vendor/plotly.min.js"
//!
//! [colours]
//! # Columns with more distinct values than this are not offered for colouring
//! max_categories = 24
//! internal_node_colour = "rgb(100,100,100)"
//!
//! [labels]
//! separator = " | "
//! # Fields joined into each node label when labels are first shown
//! fields = ["ID", "country"]
//!
//! [ids]
//! id_column = "sample_name"
//! # Tree leaves exempt from the metadata and matrix checks (glob patterns)
//! ignore = ["Reference", "outgroup_*"]
//! ```

use glob::Pattern;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::colour::{ColourSettings, DEFAULT_INTERNAL_NODE_COLOUR, DEFAULT_MAX_CATEGORIES};
use crate::figure::DEFAULT_PLOT_HEIGHT;
use crate::labels::{DEFAULT_LABEL_SEPARATOR, LabelSettings};
use crate::metadata::ID_COLUMN;

/// Plotly.js build loaded by reports that don't inline a local copy
pub const DEFAULT_PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const CONFIG_NAMES: [&str; 2] = [".intreeactive.toml", "intreeactive.toml"];

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    PatternError(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Report configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Plot title; defaults to "Interactive Phylogeny, <date>"
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default = "default_plot_height")]
    pub plot_height: u32,

    /// Local Plotly.js file to inline instead of loading from the CDN
    #[serde(default)]
    pub plotly_js: Option<PathBuf>,

    #[serde(default = "default_plotly_cdn")]
    pub plotly_cdn: String,
}

fn default_plot_height() -> u32 {
    DEFAULT_PLOT_HEIGHT
}

fn default_plotly_cdn() -> String {
    DEFAULT_PLOTLY_CDN.to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: None,
            plot_height: default_plot_height(),
            plotly_js: None,
            plotly_cdn: default_plotly_cdn(),
        }
    }
}

/// Colour configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ColoursConfig {
    #[serde(default = "default_max_categories")]
    pub max_categories: usize,

    #[serde(default = "default_internal_node_colour")]
    pub internal_node_colour: String,
}

fn default_max_categories() -> usize {
    DEFAULT_MAX_CATEGORIES
}

fn default_internal_node_colour() -> String {
    DEFAULT_INTERNAL_NODE_COLOUR.to_string()
}

impl Default for ColoursConfig {
    fn default() -> Self {
        Self {
            max_categories: default_max_categories(),
            internal_node_colour: default_internal_node_colour(),
        }
    }
}

/// Label configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LabelsConfig {
    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_separator() -> String {
    DEFAULT_LABEL_SEPARATOR.to_string()
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            fields: Vec::new(),
        }
    }
}

/// Sample ID configuration section
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IdsConfig {
    /// Metadata column holding the sample IDs
    #[serde(default)]
    pub id_column: Option<String>,

    /// IDs (glob patterns) exempt from cross-file checks
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IntreeactiveConfig {
    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub colours: ColoursConfig,

    #[serde(default)]
    pub labels: LabelsConfig,

    #[serde(default)]
    pub ids: IdsConfig,
}

/// Configuration with ignore patterns compiled, ready for a build
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub title: Option<String>,
    pub plot_height: u32,
    pub plotly_js: Option<PathBuf>,
    pub plotly_cdn: String,
    pub colours: ColourSettings,
    pub labels: LabelSettings,
    pub id_column: String,
    ignore_patterns: Vec<Pattern>,
}

impl CompiledConfig {
    /// Create a compiled config from raw config
    pub fn from_config(config: IntreeactiveConfig) -> Result<Self, ConfigError> {
        if config.colours.max_categories == 0 {
            return Err(ConfigError::InvalidValue {
                key: "colours.max_categories",
                message: "must be at least 1".into(),
            });
        }
        if config.report.plot_height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "report.plot_height",
                message: "must be at least 1".into(),
            });
        }

        let ignore_patterns = config
            .ids
            .ignore
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| ConfigError::PatternError(format!("{}: {}", p, e))))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            title: config.report.title,
            plot_height: config.report.plot_height,
            plotly_js: config.report.plotly_js,
            plotly_cdn: config.report.plotly_cdn,
            colours: ColourSettings {
                max_categories: config.colours.max_categories,
                internal_node_colour: config.colours.internal_node_colour,
            },
            labels: LabelSettings {
                separator: config.labels.separator,
                fields: config.labels.fields,
                ..LabelSettings::default()
            },
            id_column: config.ids.id_column.unwrap_or_else(|| ID_COLUMN.to_string()),
            ignore_patterns,
        })
    }

    /// Create a config with every setting at its default
    pub fn empty() -> Self {
        Self {
            title: None,
            plot_height: DEFAULT_PLOT_HEIGHT,
            plotly_js: None,
            plotly_cdn: DEFAULT_PLOTLY_CDN.to_string(),
            colours: ColourSettings::default(),
            labels: LabelSettings::default(),
            id_column: ID_COLUMN.to_string(),
            ignore_patterns: Vec::new(),
        }
    }

    /// Exempt IDs given on the command line. They match literally.
    pub fn add_ignored_ids(&mut self, ids: &[String]) {
        self.ignore_patterns.extend(
            ids.iter()
                .filter_map(|id| Pattern::new(&Pattern::escape(id)).ok()),
        );
    }

    /// Check whether a sample ID is exempt from the cross-file checks
    pub fn is_ignored(&self, id: &str) -> bool {
        self.ignore_patterns.iter().any(|p| p.matches(id))
    }

    pub fn ignore_pattern_count(&self) -> usize {
        self.ignore_patterns.len()
    }
}

/// Read one config file. A relative `plotly_js` path is resolved against
/// the file's directory.
pub fn load_config_file(path: &Path) -> Result<IntreeactiveConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: IntreeactiveConfig = toml::from_str(&content)?;

    if let (Some(js), Some(dir)) = (&config.report.plotly_js, path.parent()) {
        if js.is_relative() {
            config.report.plotly_js = Some(dir.join(js));
        }
    }
    Ok(config)
}

/// Load configuration for a working directory
///
/// Searches for `.intreeactive.toml` in the given directory and parent
/// directories, falling back to defaults.
pub fn load_config(start_path: &Path) -> Result<IntreeactiveConfig, ConfigError> {
    match find_config_file(start_path) {
        Some(path) => {
            log::debug!("Using config file {}", path.display());
            load_config_file(&path)
        }
        None => Ok(IntreeactiveConfig::default()),
    }
}

/// Find the config file by searching up the directory tree
pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path.parent()?.to_path_buf()
    } else {
        start_path.to_path_buf()
    };

    loop {
        for name in &CONFIG_NAMES {
            let config_path = current.join(name);
            if config_path.is_file() {
                return Some(config_path);
            }
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// Load and compile configuration, from `explicit` when given or else by
/// searching up from `start_path`
pub fn load_compiled_config(
    explicit: Option<&Path>,
    start_path: &Path,
) -> Result<CompiledConfig, ConfigError> {
    let config = match explicit {
        Some(path) => load_config_file(path)?,
        None => load_config(start_path)?,
    };
    CompiledConfig::from_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = IntreeactiveConfig::default();
        assert_eq!(config.report.plot_height, 900);
        assert_eq!(config.report.plotly_cdn, DEFAULT_PLOTLY_CDN);
        assert_eq!(config.colours.max_categories, 48);
        assert_eq!(config.labels.separator, " | ");
        assert!(config.ids.ignore.is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [report]
            title = "Outbreak"
            plot_height = 1200

            [colours]
            max_categories = 12

            [labels]
            fields = ["ID", "country"]

            [ids]
            id_column = "sample"
            ignore = ["Reference"]
        "#;

        let config: IntreeactiveConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.report.title.as_deref(), Some("Outbreak"));
        assert_eq!(config.report.plot_height, 1200);
        assert_eq!(config.colours.max_categories, 12);
        assert_eq!(config.colours.internal_node_colour, "rgb(100,100,100)");
        assert_eq!(config.labels.fields, ["ID", "country"]);
        assert_eq!(config.ids.id_column.as_deref(), Some("sample"));
    }

    #[test]
    fn test_compiled_config() {
        let toml = r#"
            [ids]
            ignore = ["outgroup_*", "Reference"]
        "#;

        let config: IntreeactiveConfig = toml::from_str(toml).unwrap();
        let compiled = CompiledConfig::from_config(config).unwrap();

        assert!(compiled.is_ignored("outgroup_1"));
        assert!(compiled.is_ignored("Reference"));
        assert!(!compiled.is_ignored("Sample_1"));
        assert_eq!(compiled.id_column, "ID");
    }

    #[test]
    fn test_cli_ids_match_literally() {
        let mut compiled = CompiledConfig::empty();
        compiled.add_ignored_ids(&["ref[1]".to_string(), "S*".to_string()]);

        assert!(compiled.is_ignored("ref[1]"));
        assert!(!compiled.is_ignored("ref1"));
        assert!(compiled.is_ignored("S*"));
        assert!(!compiled.is_ignored("S1"));
        assert_eq!(compiled.ignore_pattern_count(), 2);
    }

    #[test]
    fn test_invalid_values() {
        let config: IntreeactiveConfig = toml::from_str("[colours]\nmax_categories = 0").unwrap();
        assert!(matches!(
            CompiledConfig::from_config(config),
            Err(ConfigError::InvalidValue { .. })
        ));

        let config: IntreeactiveConfig = toml::from_str("[ids]\nignore = [\"[\"]").unwrap();
        assert!(matches!(
            CompiledConfig::from_config(config),
            Err(ConfigError::PatternError(_))
        ));
    }

    #[test]
    fn test_find_config_in_parent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("runs").join("today");
        fs::create_dir_all(&nested).unwrap();
        fs::write(
            dir.path().join(".intreeactive.toml"),
            "[report]\nplotly_js = \"plotly.min.js\"\n",
        )
        .unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join(".intreeactive.toml"));

        let config = load_config(&nested).unwrap();
        assert_eq!(config.report.plotly_js, Some(dir.path().join("plotly.min.js")));
    }

    #[test]
    fn test_explicit_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[report]\ntitle = \"Custom\"\n").unwrap();

        let compiled = load_compiled_config(Some(&path), dir.path()).unwrap();
        assert_eq!(compiled.title.as_deref(), Some("Custom"));
    }
}
