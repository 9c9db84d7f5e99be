// Listings pipeline: load -> clean -> derive features -> report -> persist

pub mod ingestion;
pub mod processing;
pub mod report;
pub mod storage;

use crate::config::PipelineConfig;
use crate::error::Result;
use metrics::{counter, histogram};
use processing::CleanReport;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

/// Row counts and timing for one pipeline stage
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: &'static str,
    pub rows_in: usize,
    pub rows_out: usize,
    pub elapsed_ms: u128,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub input_file: String,
    pub stages: Vec<StageSummary>,
    pub clean_report: CleanReport,
    pub price_trend_bins: usize,
    pub charts: Vec<String>,
    pub output_file: String,
    pub duration_secs: f64,
}

pub struct Pipeline;

impl Pipeline {
    /// Run every stage in order. The first fatal error aborts the run.
    #[instrument(skip(config), fields(input = %config.input_path.display()))]
    pub fn run(config: &PipelineConfig) -> Result<PipelineResult> {
        info!("{}", "=".repeat(50));
        info!("🚀 Starting listings pipeline");
        info!("{}", "=".repeat(50));
        counter!("listings_pipeline_runs_total").increment(1);
        let t_pipeline = Instant::now();
        let mut stages = Vec::new();

        // Step 1: Load
        let t = Instant::now();
        let raw = ingestion::load_dataset(
            &config.input_path,
            config.delimiter_byte(),
            &config.encoding,
        )?;
        counter!("listings_rows_loaded_total").increment(raw.len() as u64);
        stages.push(StageSummary {
            stage: "load",
            rows_in: 0,
            rows_out: raw.len(),
            elapsed_ms: t.elapsed().as_millis(),
        });

        // Step 2: Clean
        let t = Instant::now();
        let rows_in = raw.len();
        let (cleaned, clean_report) = processing::clean_with_report(raw);
        counter!("listings_rows_removed_total", "reason" => "duplicate_id")
            .increment(clean_report.duplicate_ids_removed as u64);
        counter!("listings_rows_removed_total", "reason" => "duplicate_address")
            .increment(clean_report.duplicate_addresses_removed as u64);
        counter!("listings_rows_removed_total", "reason" => "missing_price_or_area")
            .increment(clean_report.rows_missing_price_or_area as u64);
        let unparseable: usize = clean_report.unparseable_values.values().sum();
        counter!("listings_unparseable_values_total").increment(unparseable as u64);
        stages.push(StageSummary {
            stage: "clean",
            rows_in,
            rows_out: cleaned.len(),
            elapsed_ms: t.elapsed().as_millis(),
        });

        // Step 3: Derive features
        let t = Instant::now();
        let rows_in = cleaned.len();
        let features = processing::derive(cleaned);
        stages.push(StageSummary {
            stage: "features",
            rows_in,
            rows_out: features.dataset.len(),
            elapsed_ms: t.elapsed().as_millis(),
        });

        // Step 4: Charts
        let t = Instant::now();
        let charts = report::render_reports(&features, &config.figures_dir, &config.report)?;
        stages.push(StageSummary {
            stage: "report",
            rows_in: features.dataset.len(),
            rows_out: features.dataset.len(),
            elapsed_ms: t.elapsed().as_millis(),
        });

        // Step 5: Persist
        let t = Instant::now();
        let output = storage::write_parquet(&features.dataset, &config.output_path)?;
        counter!("listings_rows_persisted_total").increment(features.dataset.len() as u64);
        stages.push(StageSummary {
            stage: "persist",
            rows_in: features.dataset.len(),
            rows_out: features.dataset.len(),
            elapsed_ms: t.elapsed().as_millis(),
        });

        let total_secs = t_pipeline.elapsed().as_secs_f64();
        histogram!("listings_pipeline_duration_seconds").record(total_secs);

        info!("{}", "=".repeat(50));
        info!("✅ Pipeline finished in {:.2}s", total_secs);
        info!("{}", "=".repeat(50));

        Ok(PipelineResult {
            input_file: config.input_path.display().to_string(),
            stages,
            clean_report,
            price_trend_bins: features.price_trend.len(),
            charts: charts.iter().map(|p| p.display().to_string()).collect(),
            output_file: output.display().to_string(),
            duration_secs: total_secs,
        })
    }
}
