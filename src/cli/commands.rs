//! Command implementations for the geosearch CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use log::info;
use serde::Deserialize;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::geo::coord::GeoCoordinate;
use crate::index::{GeoIndexConfig, GeoIndexReader, GeoIndexWriter, SearchOptions};
use crate::query::GeoQuery;
use crate::storage::file::FileStorageConfig;
use crate::storage::{Storage, StorageConfig, StorageFactory};

/// One line of a points file.
#[derive(Debug, Deserialize)]
struct PointsLine {
    #[serde(default)]
    locations: Vec<[f64; 2]>,
}

/// Execute a CLI command.
pub fn execute_command(args: GeoSearchArgs) -> anyhow::Result<()> {
    match &args.command {
        Command::Index(index_args) => index_points(index_args, &args),
        Command::Search(search_args) => search_index(search_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
    }
}

fn open_storage(path: &Path, use_mmap: bool) -> anyhow::Result<Arc<dyn Storage>> {
    let mut config = FileStorageConfig::new(path);
    config.use_mmap = use_mmap;
    StorageFactory::create(StorageConfig::File(config))
        .with_context(|| format!("failed to open index directory {}", path.display()))
}

fn open_reader(path: &Path, config: GeoIndexConfig, use_mmap: bool) -> anyhow::Result<GeoIndexReader> {
    if !path.is_dir() {
        bail!("index directory {} does not exist", path.display());
    }
    let storage = open_storage(path, use_mmap)?;
    GeoIndexReader::open(storage, config).with_context(|| format!("failed to open index {}", path.display()))
}

/// Parse one points line into validated coordinates.
fn parse_points_line(line: &str) -> anyhow::Result<Vec<GeoCoordinate>> {
    let parsed: PointsLine = serde_json::from_str(line)?;
    parsed
        .locations
        .iter()
        .map(|[lat, lon]| GeoCoordinate::new(*lat, *lon).map_err(anyhow::Error::from))
        .collect()
}

/// Index every document of a points file.
fn index_points(args: &IndexArgs, cli_args: &GeoSearchArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = GeoIndexConfig {
        field_name: args.field.clone(),
        max_buffered_docs: args.max_buffered_docs,
        ..Default::default()
    };

    let storage = open_storage(&args.index_path, false)?;
    let mut writer = GeoIndexWriter::new(storage.clone(), config.clone())?;

    let file = File::open(&args.points_file)
        .with_context(|| format!("failed to open points file {}", args.points_file.display()))?;

    let mut documents_added = 0u64;
    let mut locations_added = 0u64;
    for (line_number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let locations = parse_points_line(&line).with_context(|| {
            format!("{}:{}", args.points_file.display(), line_number + 1)
        })?;
        writer.add_document(&locations)?;
        documents_added += 1;
        locations_added += locations.len() as u64;
    }
    writer.close()?;
    info!("Indexed {documents_added} documents from {}", args.points_file.display());

    let reader = GeoIndexReader::open(storage, config)?;
    output_result(
        "Indexing completed",
        &IndexingResult {
            documents_added,
            locations_added,
            segments: reader.segment_count(),
            duration_ms: start.elapsed().as_millis() as u64,
        },
        cli_args,
    )?;

    Ok(())
}

/// Run a radius search.
fn search_index(args: &SearchArgs, cli_args: &GeoSearchArgs) -> anyhow::Result<()> {
    let mut builder = GeoQuery::builder(args.field.clone()).centroid(args.lat, args.lon);
    builder = match (args.range_km, args.range_mi) {
        (Some(km), _) => builder.range_in_km(km),
        (None, Some(miles)) => builder.range_in_miles(miles),
        (None, None) => bail!("one of --range-km or --range-mi is required"),
    };
    let query = builder.build()?;

    let mut config = GeoIndexConfig {
        field_name: args.field.clone(),
        ..Default::default()
    };
    config.search.allow_partial_results = args.allow_partial;
    let reader = open_reader(&args.index_path, config, args.mmap)?;

    let mut options = SearchOptions::new(args.limit).with_parallel(!args.sequential);
    if let Some(min_score) = args.min_score {
        options = options.with_min_score(min_score);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }

    let start = Instant::now();
    let results = reader.search(&query, &options)?;

    output_result(
        "Search completed",
        &SearchOutput {
            query: query.to_string(),
            hits: results.hits,
            total_hits: results.total_hits,
            max_score: results.max_score,
            failed_segments: results.failed_segments,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        cli_args,
    )?;

    Ok(())
}

/// Show segment statistics.
fn show_stats(args: &StatsArgs, cli_args: &GeoSearchArgs) -> anyhow::Result<()> {
    let config = GeoIndexConfig {
        field_name: args.field.clone(),
        ..Default::default()
    };
    let reader = open_reader(&args.index_path, config, false)?;

    let segments: Vec<SegmentStats> = reader
        .segments()
        .iter()
        .map(|segment| SegmentStats {
            name: segment.name().to_string(),
            doc_base: segment.doc_base(),
            max_doc: segment.max_doc(),
            records: segment.reader().len(),
        })
        .collect();

    output_result(
        "Index statistics",
        &IndexStats {
            field: args.field.clone(),
            generation: reader.generation(),
            total_documents: reader.num_docs(),
            total_records: reader.num_records(),
            segments,
        },
        cli_args,
    )?;

    Ok(())
}
