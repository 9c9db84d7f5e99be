use crate::error::{PipelineError, Result};
use crate::types::{Dataset, Value};
use parquet::basic::{
    Compression, LogicalType, Repetition, TimeUnit, Type as PhysicalType, ZstdLevel,
};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::{Type, TypePtr};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Physical layout chosen for one dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Boolean,
    Timestamp,
    Text,
}

/// Infer a column's kind from its non-missing values. Mixed integer/real
/// widens to real; any other mix, or an all-missing column, is text.
pub fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in values {
        let this = match value {
            Value::Missing => continue,
            Value::Integer(_) => ColumnKind::Integer,
            Value::Real(_) => ColumnKind::Real,
            Value::Boolean(_) => ColumnKind::Boolean,
            Value::Timestamp(_) => ColumnKind::Timestamp,
            Value::Text(_) => return ColumnKind::Text,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Integer), ColumnKind::Real)
            | (Some(ColumnKind::Real), ColumnKind::Integer) => ColumnKind::Real,
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn column_type(name: &str, kind: ColumnKind) -> Result<TypePtr> {
    let (physical, logical) = match kind {
        ColumnKind::Integer => (PhysicalType::INT64, None),
        ColumnKind::Real => (PhysicalType::DOUBLE, None),
        ColumnKind::Boolean => (PhysicalType::BOOLEAN, None),
        ColumnKind::Timestamp => (
            PhysicalType::INT64,
            Some(LogicalType::Timestamp {
                is_adjusted_to_u_t_c: false,
                unit: TimeUnit::MICROS(Default::default()),
            }),
        ),
        ColumnKind::Text => (PhysicalType::BYTE_ARRAY, Some(LogicalType::String)),
    };
    let field = Type::primitive_type_builder(name, physical)
        .with_repetition(Repetition::OPTIONAL)
        .with_logical_type(logical)
        .build()?;
    Ok(Arc::new(field))
}

// One OPTIONAL leaf per dataset column, in dataset order
fn build_schema(dataset: &Dataset, kinds: &[ColumnKind]) -> Result<TypePtr> {
    let fields = dataset
        .columns()
        .iter()
        .zip(kinds)
        .map(|(name, kind)| column_type(name, *kind))
        .collect::<Result<Vec<_>>>()?;
    let schema = Type::group_type_builder("schema")
        .with_fields(fields)
        .build()?;
    Ok(Arc::new(schema))
}

/// Definition levels (1 = present, 0 = null) plus the present values.
fn levels_and_values<T>(
    dataset: &Dataset,
    column: &str,
    extract: impl Fn(&Value) -> Option<T>,
) -> (Vec<i16>, Vec<T>) {
    let mut levels = Vec::with_capacity(dataset.len());
    let mut values = Vec::new();
    for value in dataset.column_values(column) {
        match extract(value) {
            Some(v) => {
                levels.push(1);
                values.push(v);
            }
            None => levels.push(0),
        }
    }
    (levels, values)
}

/// Write the dataset as a single-row-group parquet file, replacing any
/// existing file at `path`.
#[instrument(skip(dataset), fields(rows = dataset.len()))]
pub fn write_parquet(dataset: &Dataset, path: &Path) -> Result<PathBuf> {
    info!("💾 Saving {} rows to {}...", dataset.len(), path.display());
    write_file(dataset, path).map_err(|e| {
        error!("Failed to save processed data: {}", e);
        e
    })?;
    info!("✅ Processed data saved to {}", path.display());
    Ok(path.to_path_buf())
}

fn write_file(dataset: &Dataset, path: &Path) -> Result<()> {
    if dataset.columns().is_empty() {
        return Err(PipelineError::Parquet(
            parquet::errors::ParquetError::General("dataset has no columns".into()),
        ));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let kinds: Vec<ColumnKind> = dataset
        .columns()
        .iter()
        .map(|c| infer_kind(dataset.column_values(c)))
        .collect();
    let schema = build_schema(dataset, &kinds)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();

    let file = File::create(path)?;
    let mut writer = SerializedFileWriter::new(file, schema, Arc::new(props))?;
    let mut row_group = writer.next_row_group()?;

    let mut col_index = 0;
    while let Some(mut col_writer) = row_group.next_column()? {
        let column = dataset.columns()[col_index].as_str();
        match kinds[col_index] {
            ColumnKind::Integer => {
                let (levels, values) = levels_and_values(dataset, column, Value::as_i64);
                col_writer
                    .typed::<Int64Type>()
                    .write_batch(&values, Some(levels.as_slice()), None)?;
            }
            ColumnKind::Real => {
                let (levels, values) = levels_and_values(dataset, column, Value::as_f64);
                col_writer
                    .typed::<DoubleType>()
                    .write_batch(&values, Some(levels.as_slice()), None)?;
            }
            ColumnKind::Boolean => {
                let (levels, values) = levels_and_values(dataset, column, Value::as_bool);
                col_writer
                    .typed::<BoolType>()
                    .write_batch(&values, Some(levels.as_slice()), None)?;
            }
            ColumnKind::Timestamp => {
                let (levels, values) = levels_and_values(dataset, column, |v| match v {
                    Value::Timestamp(ts) => Some(ts.and_utc().timestamp_micros()),
                    _ => None,
                });
                col_writer
                    .typed::<Int64Type>()
                    .write_batch(&values, Some(levels.as_slice()), None)?;
            }
            ColumnKind::Text => {
                let (levels, values) = levels_and_values(dataset, column, |v| {
                    (!v.is_missing()).then(|| ByteArray::from(v.to_string().as_str()))
                });
                col_writer
                    .typed::<ByteArrayType>()
                    .write_batch(&values, Some(levels.as_slice()), None)?;
            }
        }
        col_writer.close()?;
        col_index += 1;
    }
    row_group.close()?;
    writer.close()?;
    Ok(())
}
