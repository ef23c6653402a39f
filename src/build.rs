//! End-to-end report build
//!
//! Reads the three inputs, cross-checks their sample IDs, lays out the
//! tree and writes the HTML report.

use std::path::PathBuf;

use chrono::Local;
use log::{debug, info, warn};
use thiserror::Error;

use crate::config::CompiledConfig;
use crate::figure::{FigureSettings, build_figure};
use crate::layout::{DEFAULT_LEAF_SPACING, TreeLayout};
use crate::matrix::{MatrixError, read_distance_matrix};
use crate::metadata::read_metadata;
use crate::output::{OutputError, prepare_output, write_report};
use crate::report::{BuildSummary, PlotlySource, ReportError, ReportInput, default_title, render_report};
use crate::table::TableError;
use crate::tree::{TreeError, TreeFormat, read_tree};
use crate::validate::{ValidationError, check_ids};

/// Errors that can occur during a build, tagged with the failing input
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Tree: {0}")]
    Tree(#[from] TreeError),

    #[error("Metadata: {0}")]
    Metadata(#[from] TableError),

    #[error("SNP distance matrix: {0}")]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Inputs and per-run choices for one report
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub tree: PathBuf,
    pub metadata: PathBuf,
    pub snp_distance_matrix: PathBuf,
    pub tree_format: TreeFormat,
    pub outgroup: Option<String>,
    pub output: PathBuf,
    pub force: bool,
    /// Overrides the configured title
    pub title: Option<String>,
}

/// Build the report described by `options` and write it to `options.output`
pub fn build_report(
    options: &BuildOptions,
    config: &CompiledConfig,
) -> Result<BuildSummary, BuildError> {
    prepare_output(&options.output, options.force)?;

    info!("Reading tree from {}", options.tree.display());
    let tree = read_tree(&options.tree, options.tree_format, options.outgroup.as_deref())?;

    info!("Reading metadata from {}", options.metadata.display());
    let mut metadata = read_metadata(&options.metadata, Some(&config.id_column))?;

    info!(
        "Reading SNP distances from {}",
        options.snp_distance_matrix.display()
    );
    let matrix = read_distance_matrix(&options.snp_distance_matrix)?;
    debug!(
        "Loaded {} leaves, {} metadata rows, {} matrix samples",
        tree.count_terminals(),
        metadata.len(),
        matrix.len()
    );

    let check = check_ids(&tree, &mut metadata, &matrix, |id| config.is_ignored(id))?;
    metadata.add_nearest_neighbours(&matrix);

    for field in &config.labels.fields {
        if !metadata.columns().contains(field) {
            warn!("Label field '{}' is not a metadata column", field);
        }
    }

    let title = options
        .title
        .clone()
        .or_else(|| config.title.clone())
        .unwrap_or_else(|| default_title(Local::now().date_naive()));
    info!(
        "Creating tree '{}' with {} leaves",
        title,
        tree.count_terminals()
    );

    let layout = TreeLayout::compute(&tree, DEFAULT_LEAF_SPACING);
    let settings = FigureSettings {
        title: title.clone(),
        plot_height: config.plot_height,
        colours: config.colours.clone(),
        labels: config.labels.clone(),
    };
    let figure = build_figure(&tree, &layout, &metadata, &settings);

    let plotly = PlotlySource::resolve(config.plotly_js.as_deref(), &config.plotly_cdn)?;
    let html = render_report(&ReportInput {
        figure: &figure,
        metadata: &metadata,
        matrix: &matrix,
        labels: &config.labels,
        plotly: &plotly,
        plot_height: config.plot_height,
        generated: Local::now(),
    })?;

    write_report(&options.output, &html)?;
    info!("Report written to {}", options.output.display());

    let colour_columns = figure
        .layout
        .updatemenus
        .iter()
        .flat_map(|menu| menu.buttons.iter().map(|b| b.label.clone()))
        .collect();

    Ok(BuildSummary {
        title,
        leaves: tree.count_terminals(),
        samples: metadata.len(),
        dropped: check.dropped,
        allowed: check.allowed,
        colour_columns,
        output: options.output.display().to_string(),
    })
}
