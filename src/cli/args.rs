//! Command line argument parsing for the geosearch CLI using clap.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// geosearch - geospatial range queries over a segmented index
#[derive(Parser, Debug, Clone)]
#[command(name = "geosearch")]
#[command(about = "Index geo points and run radius searches over them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct GeoSearchArgs {
    /// Increase verbosity (-v verbose, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl GeoSearchArgs {
    /// Get the effective verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose.saturating_add(1)
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Index documents from a JSON Lines file
    Index(IndexArgs),

    /// Find documents within a radius of a point
    Search(SearchArgs),

    /// Show segment statistics
    Stats(StatsArgs),
}

/// Arguments for indexing documents
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Points file, one `{"locations": [[lat, lon], ...]}` object per line
    #[arg(value_name = "POINTS_FILE")]
    pub points_file: PathBuf,

    /// Geo field name
    #[arg(long, default_value = "location")]
    pub field: String,

    /// Documents per segment
    #[arg(long, default_value = "10000")]
    pub max_buffered_docs: usize,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("range").required(true).args(["range_km", "range_mi"])))]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Centroid latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Centroid longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Search radius in kilometres
    #[arg(long)]
    pub range_km: Option<f32>,

    /// Search radius in miles
    #[arg(long)]
    pub range_mi: Option<f32>,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Geo field name
    #[arg(long, default_value = "location")]
    pub field: String,

    /// Minimum score threshold for results
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Score segments one after another
    #[arg(long)]
    pub sequential: bool,

    /// Skip failing segments instead of failing the search
    #[arg(long)]
    pub allow_partial: bool,

    /// Search timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Read segment files through memory maps
    #[arg(long)]
    pub mmap: bool,
}

/// Arguments for index statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_PATH")]
    pub index_path: PathBuf,

    /// Geo field name
    #[arg(long, default_value = "location")]
    pub field: String,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// JSON
    Json,
}
