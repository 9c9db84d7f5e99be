use anyhow::Context;
use listings_etl::{logging, Pipeline, PipelineConfig};
use tracing::error;

fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::load().context("Failed to load pipeline configuration")?;

    // Initialize logging; the guard flushes the log file on exit
    let _guard = logging::init_logging(&config.logs_dir);

    match Pipeline::run(&config) {
        Ok(result) => {
            println!("\n📊 Pipeline results:");
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(e).context("Pipeline run failed")
        }
    }
}
