use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "pipeline.toml";

const ENV_INPUT_PATH: &str = "LISTINGS_INPUT_PATH";
const ENV_OUTPUT_PATH: &str = "LISTINGS_OUTPUT_PATH";
const ENV_FIGURES_DIR: &str = "LISTINGS_FIGURES_DIR";
const ENV_LOGS_DIR: &str = "LISTINGS_LOGS_DIR";

/// Everything a pipeline run needs to know, passed explicitly into `Pipeline::run`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw delimited listings file
    pub input_path: PathBuf,
    /// Parquet file written at the end of the run (overwritten)
    pub output_path: PathBuf,
    /// Directory receiving chart images
    pub figures_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub delimiter: char,
    /// Encoding label understood by `encoding_rs`
    pub encoding: String,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Upper bound of the price axis on the bedrooms chart; hides extreme outliers
    pub price_ceiling: f64,
    /// How many of the most frequent states the median price chart shows
    pub top_states: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/raw/apartments_for_rent_classified_10K.csv"),
            output_path: PathBuf::from("data/processed/apartments_processed.parquet"),
            figures_dir: PathBuf::from("reports/figures"),
            logs_dir: PathBuf::from("logs"),
            delimiter: ';',
            encoding: "iso-8859-1".to_string(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            price_ceiling: 10_000.0,
            top_states: 15,
        }
    }
}

impl PipelineConfig {
    /// Loads `pipeline.toml` when present (defaults otherwise), then applies
    /// `LISTINGS_*` environment overrides, including ones from a `.env` file.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = if Path::new(CONFIG_FILE).exists() {
            Self::from_file(Path::new(CONFIG_FILE))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Config rooted at `base`, keeping the default relative layout.
    pub fn rooted_at(base: &Path) -> Self {
        let defaults = Self::default();
        Self {
            input_path: base.join(defaults.input_path),
            output_path: base.join(defaults.output_path),
            figures_dir: base.join(defaults.figures_dir),
            logs_dir: base.join(defaults.logs_dir),
            ..defaults
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(ENV_INPUT_PATH) {
            self.input_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_OUTPUT_PATH) {
            self.output_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_FIGURES_DIR) {
            self.figures_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(ENV_LOGS_DIR) {
            self.logs_dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(PipelineError::Config("input_path must not be empty".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(PipelineError::Config("output_path must not be empty".into()));
        }
        if !self.delimiter.is_ascii() {
            return Err(PipelineError::Config(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        if encoding_rs::Encoding::for_label(self.encoding.as_bytes()).is_none() {
            return Err(PipelineError::Config(format!(
                "unknown encoding '{}'",
                self.encoding
            )));
        }
        if self.report.price_ceiling.is_nan() || self.report.price_ceiling <= 0.0 {
            return Err(PipelineError::Config(
                "report.price_ceiling must be positive".into(),
            ));
        }
        if self.report.top_states == 0 {
            return Err(PipelineError::Config(
                "report.top_states must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII
        self.delimiter as u8
    }
}
