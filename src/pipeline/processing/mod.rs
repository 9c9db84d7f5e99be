// Pipeline processing: cleaning and feature derivation

pub mod clean;
pub mod coerce;
pub mod features;

// Re-export key types and functions
pub use clean::{clean, clean_with_report, CleanReport};
pub use features::{derive, FeatureSet, PriceTrendPoint};
