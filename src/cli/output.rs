//! Output formatting for CLI commands.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::cli::args::{GeoSearchArgs, OutputFormat};
use crate::error::Result;
use crate::query::GeoOnlyHit;

/// Rendering of a command result as plain text.
pub trait HumanOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Result structure for indexing.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_added: u64,
    pub locations_added: u64,
    pub segments: usize,
    pub duration_ms: u64,
}

impl HumanOutput for IndexingResult {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Documents added: {}", self.documents_added)?;
        writeln!(out, "Locations added: {}", self.locations_added)?;
        writeln!(out, "Segments: {}", self.segments)?;
        writeln!(out, "Duration: {} ms", self.duration_ms)
    }
}

/// Result structure for search operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchOutput {
    pub query: String,
    pub hits: Vec<GeoOnlyHit>,
    pub total_hits: u64,
    pub max_score: f64,
    pub failed_segments: usize,
    pub duration_ms: u64,
}

impl HumanOutput for SearchOutput {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.query)?;
        writeln!(
            out,
            "Found {} matching documents in {} ms",
            self.total_hits, self.duration_ms
        )?;
        if self.failed_segments > 0 {
            writeln!(out, "Warning: {} segments failed and were skipped", self.failed_segments)?;
        }

        if self.hits.is_empty() {
            return writeln!(out, "No results found.");
        }

        writeln!(out)?;
        for (rank, hit) in self.hits.iter().enumerate() {
            writeln!(out, "{:>4}. doc {:<10} score {:.6}", rank + 1, hit.doc_id, hit.score)?;
        }
        Ok(())
    }
}

/// Per-segment statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentStats {
    pub name: String,
    pub doc_base: u64,
    pub max_doc: u32,
    pub records: usize,
}

/// Index statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexStats {
    pub field: String,
    pub generation: u64,
    pub total_documents: u64,
    pub total_records: u64,
    pub segments: Vec<SegmentStats>,
}

impl HumanOutput for IndexStats {
    fn write_human(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Field: {}", self.field)?;
        writeln!(out, "Generation: {}", self.generation)?;
        writeln!(out, "Documents: {}", self.total_documents)?;
        writeln!(out, "Locations: {}", self.total_records)?;
        writeln!(out, "Segments: {}", self.segments.len())?;
        for segment in &self.segments {
            writeln!(
                out,
                "  {} base={} docs={} records={}",
                segment.name, segment.doc_base, segment.max_doc, segment.records
            )?;
        }
        Ok(())
    }
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize + HumanOutput>(message: &str, result: &T, args: &GeoSearchArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_result(&mut out, message, result, args)
}

/// Write a result in the specified format to `out`.
pub fn write_result<T: Serialize + HumanOutput>(
    out: &mut dyn Write,
    message: &str,
    result: &T,
    args: &GeoSearchArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 1 {
                writeln!(out, "{message}")?;
                writeln!(out)?;
            }
            result.write_human(out)?;
        }
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            writeln!(out, "{json}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> GeoSearchArgs {
        let mut argv = vec!["geosearch"];
        argv.extend_from_slice(extra);
        argv.extend_from_slice(&["stats", "/tmp/idx"]);
        GeoSearchArgs::try_parse_from(argv).unwrap()
    }

    fn sample() -> SearchOutput {
        SearchOutput {
            query: "GeoQuery [centroidLatitude=1.0, centroidLongitude=2.0, rangeInKm =3.0]".to_string(),
            hits: vec![GeoOnlyHit::new(4, 0.5), GeoOnlyHit::new(9, 0.25)],
            total_hits: 2,
            max_score: 0.5,
            failed_segments: 0,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_human_search_output() {
        let mut buffer = Vec::new();
        write_result(&mut buffer, "Search completed", &sample(), &args(&[])).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("GeoQuery [centroidLatitude=1"));
        assert!(text.contains("Found 2 matching documents"));
        assert!(text.contains("   1. doc 4"));
        assert!(text.contains("score 0.250000"));
        assert!(!text.contains("Search completed"));
    }

    #[test]
    fn test_json_output() {
        let mut buffer = Vec::new();
        write_result(&mut buffer, "Search completed", &sample(), &args(&["-f", "json"])).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["total_hits"], 2);
        assert_eq!(value["hits"][1]["doc_id"], 9);
    }

    #[test]
    fn test_empty_search_output() {
        let mut output = sample();
        output.hits.clear();
        output.total_hits = 0;

        let mut buffer = Vec::new();
        output.write_human(&mut buffer).unwrap();
        assert!(String::from_utf8(buffer).unwrap().contains("No results found."));
    }
}
