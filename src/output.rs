use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::download::DownloadStats;
use crate::pipeline::{OutcomeCounts, ResolutionMapping, ResolutionResult};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub destination: String,
    pub proteins: usize,
    pub outcomes: OutcomeCounts,
    pub downloads: DownloadStats,
    pub mapping_path: Option<String>,
    pub annotated_path: Option<String>,
    pub results: Vec<ResolutionResult>,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        destination: String,
        mapping: &ResolutionMapping,
        downloads: DownloadStats,
    ) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            destination,
            proteins: mapping.len(),
            outcomes: mapping.counts(),
            downloads,
            mapping_path: None,
            annotated_path: None,
            results: mapping.results(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreEntry {
    pub structure_id: String,
    pub method: Option<String>,
    pub citation_count: Option<u64>,
    pub polymer_coverage: Option<f64>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResult {
    pub selected: Option<String>,
    pub candidates: Vec<ScoreEntry>,
}

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_scores(result: &ScoreResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_summary(report: &RunReport) {
    let outcomes = &report.outcomes;
    println!(
        "Resolved {} protein(s) into {}",
        report.proteins, report.destination
    );
    println!("  selected:            {}", outcomes.selected);
    println!("  no candidates:       {}", outcomes.no_candidates);
    println!("  no usable metadata:  {}", outcomes.no_usable_metadata);
    println!("  download failed:     {}", outcomes.download_failed);
    println!("  task failed:         {}", outcomes.task_failed);
    if outcomes.cancelled > 0 {
        println!("  cancelled:           {}", outcomes.cancelled);
    }
    println!(
        "Downloads: {} new, {} already present, {} failed",
        report.downloads.downloaded, report.downloads.seeded, report.downloads.failed
    );
    if let Some(path) = &report.mapping_path {
        println!("Mapping written to {path}");
    }
    if let Some(path) = &report.annotated_path {
        println!("Annotated table written to {path}");
    }
}

pub fn print_scores(result: &ScoreResult) {
    for entry in &result.candidates {
        match entry.score {
            Some(score) => println!(
                "{}  {:>12.2}  {}  citations={} coverage={:.2}",
                entry.structure_id,
                score,
                entry.method.as_deref().unwrap_or("UNKNOWN"),
                entry.citation_count.unwrap_or(0),
                entry.polymer_coverage.unwrap_or(0.0)
            ),
            None => println!("{}  metadata unavailable", entry.structure_id),
        }
    }
    match &result.selected {
        Some(id) => println!("Selected: {id}"),
        None => println!("Selected: none"),
    }
}
