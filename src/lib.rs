//! Batch cleaning, feature derivation and reporting for classified rental listings.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod types;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineResult};
pub use types::{Dataset, Row, Value};
