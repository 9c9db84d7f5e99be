// Pipeline ingestion: reading the raw delimited listings file into a Dataset

use crate::error::{PipelineError, Result};
use crate::types::{Dataset, Row, Value};
use encoding_rs::Encoding;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

/// Load a delimited listings file, decoding it from `encoding_label` first.
///
/// A missing or unreadable file is fatal and is logged before being returned.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_dataset(path: &Path, delimiter: u8, encoding_label: &str) -> Result<Dataset> {
    info!("📥 Loading listings from {}...", path.display());

    if !path.exists() {
        error!("Input file not found at {}. Check the configured path.", path.display());
        return Err(PipelineError::InputNotFound(path.to_path_buf()));
    }

    let bytes = fs::read(path).map_err(|e| {
        error!("Failed to read {}: {}", path.display(), e);
        PipelineError::Io(e)
    })?;

    let encoding = Encoding::for_label(encoding_label.as_bytes()).ok_or_else(|| {
        PipelineError::Encoding(format!("unknown encoding label '{}'", encoding_label))
    })?;
    let (text, used, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(
            "Input contained bytes invalid for {}; replaced with U+FFFD",
            used.name()
        );
    }

    let dataset = parse_delimited(&text, delimiter).map_err(|e| {
        error!("Failed to parse {}: {}", path.display(), e);
        e
    })?;
    info!(
        "✅ Loaded {} rows with {} columns",
        dataset.len(),
        dataset.columns().len()
    );
    Ok(dataset)
}

/// Parse already-decoded delimited text. The first record is the header.
///
/// Text without a header row is rejected with [`PipelineError::EmptyInput`].
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::EmptyInput);
    }
    debug!("Header columns: {:?}", headers);

    let mut dataset = Dataset::new(headers.clone());
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        // Short records leave trailing columns missing; extra fields are ignored
        for (column, field) in headers.iter().zip(record.iter()) {
            row.set(column, infer_value(field));
        }
        dataset.push_row(row);
    }
    Ok(dataset)
}

/// Best-effort typing of a raw cell. Sentinels like "null" stay text on purpose.
pub fn infer_value(field: &str) -> Value {
    let field = field.trim();
    if field.is_empty() {
        return Value::Missing;
    }
    if let Ok(i) = field.parse::<i64>() {
        return Value::Integer(i);
    }
    match field.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::Real(f),
        _ => Value::Text(field.to_string()),
    }
}
