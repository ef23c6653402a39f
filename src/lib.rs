//! # intreeactive - Interactive Phylogeny Reports
//!
//! Turns a phylogenetic tree, a sample metadata sheet and a pairwise SNP
//! distance matrix into one self-contained HTML page with a zoomable tree,
//! per-sample hover text, recolouring by any metadata column, node labels
//! built from metadata fields, and a side panel for comparing samples and
//! their nearest neighbours.
//!
//! ## Usage
//!
//! ```bash
//! # Build a report rooted on the outgroup
//! intreeactive build -t tree.nwk -m metadata.tsv -s snp_dists.tsv -O Reference -x Reference
//!
//! # Nearest neighbours of one sample
//! intreeactive neighbours -s snp_dists.tsv --sample S12
//!
//! # Preview a report in the browser
//! intreeactive serve interactive_tree.html
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! tree     -> parse -> reroot -> ladderize -> layout ---------.
//! metadata -> table -> check IDs -> nearest neighbours ------+-> figure -> HTML
//! matrix   -> table -----------------------------------------'
//! ```

pub mod build;
pub mod colour;
pub mod config;
pub mod dates;
pub mod figure;
pub mod labels;
pub mod layout;
pub mod matrix;
pub mod metadata;
pub mod output;
pub mod report;
pub mod table;
pub mod tree;
pub mod validate;
pub mod web;

pub use build::{BuildError, BuildOptions, build_report};
pub use colour::{ColourOption, ColourSettings, categorical_colours, colour_options, date_colours};
pub use config::{
    CompiledConfig, ConfigError, IntreeactiveConfig, load_compiled_config, load_config,
};
pub use figure::{Figure, FigureSettings, build_figure};
pub use labels::{LabelSettings, build_label, hover_text};
pub use layout::{BranchLine, TreeLayout, branch_lines, svg_path};
pub use matrix::{DistanceMatrix, MatrixError, Neighbour, read_distance_matrix};
pub use metadata::{Metadata, read_metadata};
pub use output::{OutputError, output_path};
pub use report::{BuildSummary, ReportError, render_report, write_summary};
pub use table::{Table, TableError};
pub use tree::{Tree, TreeError, TreeFormat, read_tree};
pub use validate::{IdCheck, ValidationError, check_ids};
