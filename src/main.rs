//! intreeactive CLI - Interactive Phylogeny Reports
//!
//! Builds self-contained HTML tree reports and answers quick
//! nearest-neighbour questions from a SNP distance matrix.
//!
//! Usage:
//!   intreeactive build -t TREE -m METADATA -s SNP_DISTS [OPTIONS]
//!   intreeactive neighbours -s SNP_DISTS [--sample ID] [--threshold N]
//!   intreeactive serve REPORT.html

use std::collections::BTreeMap;
use std::io::{Write, stderr, stdout};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use log::{debug, info, warn};

use intreeactive::{
    BuildOptions, CompiledConfig, TreeFormat, build_report, load_compiled_config,
    matrix::{Neighbour, read_distance_matrix},
    output::{DEFAULT_OUTPUT_NAME, output_path},
    read_metadata,
    web::{ServeConfig, start_server},
    write_summary,
};

/// intreeactive - Interactive phylogenetic trees with SNP neighbourhoods
#[derive(Parser, Debug)]
#[command(name = "intreeactive")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an interactive HTML report
    Build(BuildArgs),

    /// Print nearest neighbours from a SNP distance matrix
    Neighbours(NeighboursArgs),

    /// Serve a report on localhost
    Serve(ServeArgs),
}

#[derive(Parser, Debug)]
struct BuildArgs {
    /// Phylogenetic tree file
    #[arg(short, long)]
    tree: PathBuf,

    /// Sample metadata (CSV, TSV or other delimited text)
    #[arg(short, long)]
    metadata: PathBuf,

    /// Pairwise SNP distance matrix; header order must match row order
    #[arg(short, long = "snp-distance-matrix")]
    snp_distance_matrix: PathBuf,

    /// Tree file format (newick, nexus)
    #[arg(short = 'T', long, default_value = "newick")]
    tree_format: TreeFormat,

    /// Reroot the tree on this leaf or clade
    #[arg(short = 'O', long)]
    outgroup: Option<String>,

    /// Metadata column holding the sample IDs (default: ID, else the first column)
    #[arg(short = 'I', long)]
    id_column: Option<String>,

    /// Sample ID exempt from the metadata and matrix checks (repeatable)
    #[arg(short = 'x', long = "ignore")]
    ignore: Vec<String>,

    /// Output file name, without the .html suffix
    #[arg(short, long, default_value = DEFAULT_OUTPUT_NAME)]
    output: String,

    /// Output directory, created if missing (default: current directory)
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Plot title (default: "Interactive Phylogeny, <date>")
    #[arg(short = 'y', long)]
    title: Option<String>,

    /// Overwrite an existing output file
    #[arg(long)]
    force: bool,

    /// Config file path (default: search for .intreeactive.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Open the report in the default browser when done
    #[arg(long)]
    open: bool,

    /// Number of threads for the neighbour scan (default: all CPU cores)
    #[arg(long, short = 'j', value_name = "N")]
    jobs: Option<usize>,
}

#[derive(Parser, Debug)]
struct NeighboursArgs {
    /// Pairwise SNP distance matrix
    #[arg(short, long = "snp-distance-matrix")]
    snp_distance_matrix: PathBuf,

    /// Only report this sample (default: every sample)
    #[arg(long)]
    sample: Option<String>,

    /// Report every sample within this many SNPs instead of the closest ones
    #[arg(long)]
    threshold: Option<u64>,

    /// Metadata file; limits the output to samples it lists
    #[arg(short, long)]
    metadata: Option<PathBuf>,

    /// Print JSON instead of tab-separated text
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Report HTML file to serve
    report: PathBuf,

    /// Port for the web server
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Don't open browser automatically
    #[arg(long)]
    no_open: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::Neighbours(args) => run_neighbours(args),
        Commands::Serve(args) => run_serve(args),
    }
}

fn run_build(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .unwrap_or_else(|e| warn!("Could not set thread count: {}", e));
    }

    let cwd = std::env::current_dir()?;

    // An explicit config must load; a discovered one may be skipped
    let mut config = match load_compiled_config(args.config.as_deref(), &cwd) {
        Ok(config) => config,
        Err(e) if args.config.is_none() => {
            warn!("Ignoring config file: {}", e);
            CompiledConfig::empty()
        }
        Err(e) => return Err(e.into()),
    };

    // CLI args override config, which overrides defaults
    if let Some(id_column) = args.id_column {
        config.id_column = id_column;
    }
    config.add_ignored_ids(&args.ignore);
    debug!(
        "ID column '{}', {} ignore pattern(s)",
        config.id_column,
        config.ignore_pattern_count()
    );

    let options = BuildOptions {
        tree: args.tree,
        metadata: args.metadata,
        snp_distance_matrix: args.snp_distance_matrix,
        tree_format: args.tree_format,
        outgroup: args.outgroup,
        output: output_path(args.output_dir.as_deref(), &args.output),
        force: args.force,
        title: args.title,
    };

    let summary = build_report(&options, &config)?;
    write_summary(&summary, &mut stderr())?;

    if args.open {
        info!("Opening report...");
        if let Err(e) = open::that(&options.output) {
            warn!("Could not open browser: {}", e);
        }
    }

    Ok(())
}

fn run_neighbours(args: NeighboursArgs) -> Result<(), Box<dyn std::error::Error>> {
    let matrix = read_distance_matrix(&args.snp_distance_matrix)?;

    let samples: Vec<String> = match (&args.sample, &args.metadata) {
        (Some(sample), _) => vec![sample.clone()],
        (None, Some(path)) => {
            let metadata = read_metadata(path, None)?;
            metadata
                .ids()
                .filter(|id| matrix.contains(id))
                .map(str::to_string)
                .collect()
        }
        (None, None) => matrix.ids().to_vec(),
    };

    let lookup = |id: &str| -> Vec<Neighbour> {
        match args.threshold {
            Some(max) => matrix.neighbours_within(id, max),
            None => matrix.nearest_neighbours(id),
        }
    };

    let mut out = stdout().lock();
    if args.json {
        let by_sample: BTreeMap<&str, Vec<Neighbour>> =
            samples.iter().map(|s| (s.as_str(), lookup(s.as_str()))).collect();
        serde_json::to_writer_pretty(&mut out, &by_sample)?;
        writeln!(out)?;
    } else {
        writeln!(out, "sample\tneighbour\tdistance")?;
        for sample in &samples {
            for n in lookup(sample.as_str()) {
                writeln!(out, "{}\t{}\t{}", sample, n.id, n.distance)?;
            }
        }
    }

    Ok(())
}

fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.report.is_file() {
        return Err(format!("Report {} not found", args.report.display()).into());
    }

    let config = ServeConfig {
        port: args.port,
        open_browser: !args.no_open,
    };

    // Run the web server using tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(start_server(args.report, config))
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;

    Ok(())
}
