//! Deduplication and field repair for raw listings.
//!
//! Every rule checks that its column exists first; a dataset without a column
//! simply skips the rules that need it. Cleaning is total: bad cells become
//! missing values and are counted, never raised.

use crate::constants::{
    ADDRESS, BATHROOMS, BEDROOMS, DEFAULT_BATHROOMS, FALLBACK_BEDROOMS, HAS_PHOTO, ID,
    NUMERIC_COLUMNS, PETS_ALLOWED, PRICE, SQUARE_FEET,
};
use crate::pipeline::processing::coerce::{
    coerce_numeric, is_null_sentinel, pets_flag, photo_flag, Coerced, Flag,
};
use crate::types::{Dataset, Row, Value};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// What the cleaner removed, filled and could not interpret.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub input_rows: usize,
    pub duplicate_ids_removed: usize,
    pub duplicate_addresses_removed: usize,
    /// Non-empty text cells that did not parse as numbers, per column
    pub unparseable_values: BTreeMap<String, usize>,
    pub bathrooms_filled: usize,
    pub bedrooms_filled: usize,
    /// Fill value used for `bedrooms`, when that column exists
    pub bedrooms_median: Option<f64>,
    pub rows_missing_price_or_area: usize,
    /// Categorical cells outside the known vocabulary, per column
    pub unknown_categories: BTreeMap<String, usize>,
    pub output_rows: usize,
}

impl CleanReport {
    pub fn rows_removed(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

/// Clean a dataset, discarding the report.
pub fn clean(dataset: Dataset) -> Dataset {
    clean_with_report(dataset).0
}

#[instrument(skip_all, fields(rows = dataset.len()))]
pub fn clean_with_report(dataset: Dataset) -> (Dataset, CleanReport) {
    info!("🧹 Cleaning {} rows...", dataset.len());
    let mut report = CleanReport {
        input_rows: dataset.len(),
        ..CleanReport::default()
    };

    let mut dataset = dedup_by_id(dataset, &mut report);
    dataset = dedup_by_address(dataset, &mut report);
    replace_null_sentinels(&mut dataset);
    coerce_numeric_columns(&mut dataset, &mut report);
    apply_missing_policy(&mut dataset, &mut report);
    narrow_counts(&mut dataset);
    normalize_flag(&mut dataset, HAS_PHOTO, photo_flag, &mut report);
    normalize_flag(&mut dataset, PETS_ALLOWED, pets_flag, &mut report);

    report.output_rows = dataset.len();
    info!(
        "✅ Cleaning finished: {} -> {} rows ({} duplicate ids, {} duplicate addresses, {} without price/area)",
        report.input_rows,
        report.output_rows,
        report.duplicate_ids_removed,
        report.duplicate_addresses_removed,
        report.rows_missing_price_or_area
    );
    (dataset, report)
}

/// Keep the first row per `id`. Rows without an id are kept.
fn dedup_by_id(mut dataset: Dataset, report: &mut CleanReport) -> Dataset {
    if !dataset.has_column(ID) {
        debug!("No '{}' column; skipping id dedup", ID);
        return dataset;
    }
    let before = dataset.len();
    let mut seen = HashSet::new();
    dataset.retain(|row| match row.get(ID).dedup_key() {
        Some(key) => seen.insert(key),
        None => true,
    });
    report.duplicate_ids_removed = before - dataset.len();
    info!("{} duplicate rows removed by id", report.duplicate_ids_removed);
    dataset
}

/// Keep the first row per non-missing `address`.
///
/// Missing addresses are never duplicates of each other. The result lists
/// rows with an address first, then rows without one, each group in its
/// original relative order.
fn dedup_by_address(mut dataset: Dataset, report: &mut CleanReport) -> Dataset {
    if !dataset.has_column(ADDRESS) {
        debug!("No '{}' column; skipping address dedup", ADDRESS);
        return dataset;
    }
    let (with_address, without_address): (Vec<Row>, Vec<Row>) = dataset
        .take_rows()
        .into_iter()
        .partition(|row| !row.get(ADDRESS).is_missing());

    let before = with_address.len();
    let mut seen = HashSet::new();
    let mut rows: Vec<Row> = with_address
        .into_iter()
        .filter(|row| match row.get(ADDRESS).dedup_key() {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect();
    report.duplicate_addresses_removed = before - rows.len();
    rows.extend(without_address);

    dataset.replace_rows(rows);
    info!(
        "{} duplicate rows removed by address",
        report.duplicate_addresses_removed
    );
    dataset
}

fn replace_null_sentinels(dataset: &mut Dataset) {
    for column in present(dataset, &NUMERIC_COLUMNS) {
        for row in dataset.rows_mut() {
            if row.get(column).as_str().is_some_and(is_null_sentinel) {
                row.set(column, Value::Missing);
            }
        }
    }
}

fn coerce_numeric_columns(dataset: &mut Dataset, report: &mut CleanReport) {
    for column in present(dataset, &NUMERIC_COLUMNS) {
        let mut failures = 0;
        for row in dataset.rows_mut() {
            let coerced = match coerce_numeric(row.get(column)) {
                Coerced::Number(n) => Value::Real(n),
                Coerced::Null => Value::Missing,
                Coerced::Unparseable => {
                    debug!("Unparseable {} value {:?}", column, row.get(column));
                    failures += 1;
                    Value::Missing
                }
            };
            row.set(column, coerced);
        }
        if failures > 0 {
            warn!("{} unparseable values in '{}' treated as missing", failures, column);
            report.unparseable_values.insert(column.to_string(), failures);
        }
    }
}

/// Fill `bathrooms` with 1 and `bedrooms` with their median, then drop rows
/// lacking `price` or `square_feet`. Neither of those two is ever imputed.
fn apply_missing_policy(dataset: &mut Dataset, report: &mut CleanReport) {
    if dataset.has_column(BATHROOMS) {
        report.bathrooms_filled =
            fill_missing(dataset, BATHROOMS, Value::Real(DEFAULT_BATHROOMS as f64));
    }

    if dataset.has_column(BEDROOMS) {
        let mut values: Vec<f64> = dataset
            .column_values(BEDROOMS)
            .filter_map(Value::as_f64)
            .collect();
        let fill = median(&mut values).unwrap_or_else(|| {
            warn!(
                "'{}' has no values to take a median from; filling with {}",
                BEDROOMS, FALLBACK_BEDROOMS
            );
            FALLBACK_BEDROOMS
        });
        report.bedrooms_median = Some(fill);
        report.bedrooms_filled = fill_missing(dataset, BEDROOMS, Value::Real(fill));
    }

    let required: Vec<&str> = present(dataset, &[PRICE, SQUARE_FEET]);
    if !required.is_empty() {
        let before = dataset.len();
        dataset.retain(|row| required.iter().all(|c| !row.get(c).is_missing()));
        report.rows_missing_price_or_area = before - dataset.len();
    }
}

fn fill_missing(dataset: &mut Dataset, column: &str, fill: Value) -> usize {
    let mut filled = 0;
    for row in dataset.rows_mut() {
        if row.get(column).is_missing() {
            row.set(column, fill.clone());
            filled += 1;
        }
    }
    filled
}

/// Truncate room counts to integers. Runs after the fills, so nothing is missing.
fn narrow_counts(dataset: &mut Dataset) {
    for column in present(dataset, &[BATHROOMS, BEDROOMS]) {
        for row in dataset.rows_mut() {
            if let Value::Real(f) = row.get(column) {
                let narrowed = Value::Integer(f.trunc() as i64);
                row.set(column, narrowed);
            }
        }
    }
}

fn normalize_flag(
    dataset: &mut Dataset,
    column: &str,
    map: fn(&Value) -> Flag,
    report: &mut CleanReport,
) {
    if !dataset.has_column(column) {
        return;
    }
    let mut unknown = 0;
    for row in dataset.rows_mut() {
        let flag = map(row.get(column));
        if flag == Flag::Unrecognized {
            debug!("Unrecognized {} value {:?}", column, row.get(column));
            unknown += 1;
        }
        row.set(column, flag.into_value());
    }
    if unknown > 0 {
        warn!("{} unrecognized values in '{}' treated as missing", unknown, column);
        report.unknown_categories.insert(column.to_string(), unknown);
    }
}

fn present<'a>(dataset: &Dataset, columns: &[&'a str]) -> Vec<&'a str> {
    columns
        .iter()
        .copied()
        .filter(|c| dataset.has_column(c))
        .collect()
}

/// Median of the values; averages the two middle values for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ds: &Dataset) -> Vec<i64> {
        ds.column_values(ID).filter_map(Value::as_i64).collect()
    }

    #[test]
    fn keeps_first_row_per_id() {
        let ds = Dataset::from_rows(
            &[ID, ADDRESS, PRICE],
            vec![
                Row::new().with(ID, 1i64).with(ADDRESS, "Rua A").with(PRICE, "$1,000"),
                Row::new().with(ID, 2i64).with(ADDRESS, "Rua B").with(PRICE, "500"),
                Row::new().with(ID, 2i64).with(ADDRESS, "Rua B"),
            ],
        );
        let mut report = CleanReport::default();
        let out = dedup_by_id(ds, &mut report);
        assert_eq!(report.duplicate_ids_removed, 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out.rows()[1].get(PRICE), &Value::from("500"));
    }

    #[test]
    fn rows_without_id_are_kept() {
        let ds = Dataset::from_rows(
            &[ID, ADDRESS],
            vec![
                Row::new().with(ADDRESS, "Rua A"),
                Row::new().with(ID, 5i64).with(ADDRESS, "Rua B"),
                Row::new().with(ADDRESS, "Rua C"),
            ],
        );
        let mut report = CleanReport::default();
        let out = dedup_by_id(ds, &mut report);
        assert_eq!(report.duplicate_ids_removed, 0);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn missing_addresses_survive_and_go_last() {
        let ds = Dataset::from_rows(
            &[ID, ADDRESS],
            vec![
                Row::new().with(ID, 1i64),
                Row::new().with(ID, 2i64).with(ADDRESS, "Main St"),
                Row::new().with(ID, 3i64),
                Row::new().with(ID, 4i64).with(ADDRESS, "Main St"),
            ],
        );
        let mut report = CleanReport::default();
        let out = dedup_by_address(ds, &mut report);
        assert_eq!(report.duplicate_addresses_removed, 1);
        assert_eq!(ids(&out), vec![2, 1, 3]);
    }

    #[test]
    fn null_rooms_are_filled() {
        let ds = Dataset::from_rows(
            &[ID, PRICE, SQUARE_FEET, BATHROOMS, BEDROOMS],
            vec![
                Row::new().with(ID, 1i64).with(PRICE, 900i64).with(SQUARE_FEET, 700i64)
                    .with(BATHROOMS, "null").with(BEDROOMS, 2i64),
                Row::new().with(ID, 2i64).with(PRICE, 900i64).with(SQUARE_FEET, 700i64)
                    .with(BATHROOMS, 2i64).with(BEDROOMS, 1i64),
                Row::new().with(ID, 3i64).with(PRICE, 900i64).with(SQUARE_FEET, 700i64)
                    .with(BATHROOMS, 1.5).with(BEDROOMS, 2i64),
                Row::new().with(ID, 4i64).with(PRICE, 900i64).with(SQUARE_FEET, 700i64)
                    .with(BATHROOMS, 1i64).with(BEDROOMS, "null"),
            ],
        );
        let (out, report) = clean_with_report(ds);
        assert_eq!(out.rows()[0].get(BATHROOMS), &Value::Integer(1));
        assert_eq!(out.rows()[2].get(BATHROOMS), &Value::Integer(1));
        assert_eq!(out.rows()[3].get(BEDROOMS), &Value::Integer(2));
        assert_eq!(report.bedrooms_median, Some(2.0));
        assert_eq!(report.bathrooms_filled, 1);
        assert_eq!(report.bedrooms_filled, 1);
    }

    #[test]
    fn bedrooms_without_values_fall_back_to_zero() {
        let ds = Dataset::from_rows(
            &[ID, PRICE, SQUARE_FEET, BEDROOMS],
            vec![
                Row::new().with(ID, 1i64).with(PRICE, 900i64).with(SQUARE_FEET, 700i64)
                    .with(BEDROOMS, "null"),
                Row::new().with(ID, 2i64).with(PRICE, 1200i64).with(SQUARE_FEET, 800i64)
                    .with(BEDROOMS, "null"),
            ],
        );
        let (out, report) = clean_with_report(ds);
        assert_eq!(report.bedrooms_median, Some(0.0));
        assert_eq!(report.bedrooms_filled, 2);
        for row in out.rows() {
            assert_eq!(row.get(BEDROOMS), &Value::Integer(0));
        }
        assert_eq!(clean(out.clone()), out);
    }

    #[test]
    fn price_is_parsed_or_row_dropped() {
        let ds = Dataset::from_rows(
            &[ID, PRICE, SQUARE_FEET],
            vec![
                Row::new().with(ID, 1i64).with(PRICE, "$1,200.50").with(SQUARE_FEET, "900"),
                Row::new().with(ID, 2i64).with(SQUARE_FEET, 600i64),
                Row::new().with(ID, 3i64).with(PRICE, "None").with(SQUARE_FEET, 600i64),
                Row::new().with(ID, 4i64).with(PRICE, "ask me").with(SQUARE_FEET, 600i64),
            ],
        );
        let (out, report) = clean_with_report(ds);
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0].get(PRICE), &Value::Real(1200.50));
        assert_eq!(out.rows()[0].get(SQUARE_FEET), &Value::Real(900.0));
        assert_eq!(report.rows_missing_price_or_area, 3);
        assert_eq!(report.unparseable_values.get(PRICE), Some(&1));
    }

    #[test]
    fn categorical_flags() {
        let ds = Dataset::from_rows(
            &[ID, HAS_PHOTO, PETS_ALLOWED],
            vec![
                Row::new().with(ID, 1i64).with(HAS_PHOTO, "Thumbnail").with(PETS_ALLOWED, "Cats,Dogs"),
                Row::new().with(ID, 2i64).with(HAS_PHOTO, "no").with(PETS_ALLOWED, "None"),
                Row::new().with(ID, 3i64).with(HAS_PHOTO, "blurry").with(PETS_ALLOWED, "Cats"),
            ],
        );
        let (out, report) = clean_with_report(ds);
        let rows = out.rows();
        assert_eq!(rows[0].get(HAS_PHOTO), &Value::Boolean(true));
        assert_eq!(rows[0].get(PETS_ALLOWED), &Value::Boolean(true));
        assert_eq!(rows[1].get(HAS_PHOTO), &Value::Boolean(false));
        assert_eq!(rows[1].get(PETS_ALLOWED), &Value::Boolean(false));
        assert_eq!(rows[2].get(HAS_PHOTO), &Value::Missing);
        assert_eq!(report.unknown_categories.get(HAS_PHOTO), Some(&1));
    }

    #[test]
    fn survivor_of_mixed_input() {
        let ds = Dataset::from_rows(
            &[ID, PRICE, SQUARE_FEET, BEDROOMS, BATHROOMS],
            vec![
                Row::new().with(ID, 1i64).with(PRICE, "1,000").with(SQUARE_FEET, "800")
                    .with(BEDROOMS, 2i64).with(BATHROOMS, 1i64),
                Row::new().with(ID, 2i64).with(PRICE, "500").with(SQUARE_FEET, "null")
                    .with(BEDROOMS, 1i64).with(BATHROOMS, "null"),
                Row::new().with(ID, 2i64).with(PRICE, "500").with(SQUARE_FEET, "800")
                    .with(BEDROOMS, 1i64).with(BATHROOMS, "null"),
                Row::new().with(ID, 3i64).with(SQUARE_FEET, "650")
                    .with(BEDROOMS, "null").with(BATHROOMS, 1.0),
            ],
        );
        let out = clean(ds);
        assert_eq!(ids(&out), vec![1]);
        let row = &out.rows()[0];
        assert_eq!(row.get(PRICE), &Value::Real(1000.0));
        assert_eq!(row.get(BEDROOMS), &Value::Integer(2));
        assert_eq!(row.get(BATHROOMS), &Value::Integer(1));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let ds = Dataset::from_rows(
            &[ID, ADDRESS, PRICE, SQUARE_FEET, BEDROOMS, BATHROOMS, HAS_PHOTO, PETS_ALLOWED],
            vec![
                Row::new().with(ID, 1i64).with(PRICE, "$950").with(SQUARE_FEET, 500i64)
                    .with(BEDROOMS, "null").with(BATHROOMS, 1.5)
                    .with(HAS_PHOTO, "Yes").with(PETS_ALLOWED, "Dogs"),
                Row::new().with(ID, 2i64).with(ADDRESS, "Main St").with(PRICE, 1500i64)
                    .with(SQUARE_FEET, "1,100").with(BEDROOMS, 3i64)
                    .with(HAS_PHOTO, "odd").with(PETS_ALLOWED, "null"),
                Row::new().with(ID, 3i64).with(ADDRESS, "Main St").with(PRICE, 700i64)
                    .with(SQUARE_FEET, 400i64).with(BEDROOMS, 1i64),
                Row::new().with(ID, 4i64).with(ADDRESS, "Elm St").with(PRICE, 800i64)
                    .with(SQUARE_FEET, 450i64).with(BEDROOMS, 2i64).with(BATHROOMS, "None"),
                Row::new().with(ID, 1i64).with(PRICE, 1i64).with(SQUARE_FEET, 1i64),
            ],
        );
        let once = clean(ds);
        let (twice, report) = clean_with_report(once.clone());
        assert_eq!(once, twice);
        assert_eq!(report.rows_removed(), 0);
        assert_eq!(report.bathrooms_filled + report.bedrooms_filled, 0);
    }

    #[test]
    fn absent_columns_are_skipped() {
        let ds = Dataset::from_rows(&["state"], vec![Row::new().with("state", "CA")]);
        let (out, report) = clean_with_report(ds.clone());
        assert_eq!(out, ds);
        assert_eq!(report.bedrooms_median, None);
    }

    #[test]
    fn median_of_even_and_odd() {
        assert_eq!(median(&mut [2.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [1.0, 2.0]), Some(1.5));
        assert_eq!(median(&mut Vec::<f64>::new()), None);
    }
}
