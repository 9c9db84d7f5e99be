use crate::constants::{
    OTHER_SOURCE, POST_DATE, PRICE, PRICE_PER_SQFT, RARE_SOURCE_SHARE, SOURCE, SOURCE_GROUPED,
    SQUARE_FEET, SQUARE_FEET_BIN, SQUARE_FEET_BIN_WIDTH, TIME,
};
use crate::types::{Dataset, Value};
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

/// Mean price of the listings falling in one square-footage bin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTrendPoint {
    pub square_feet_bin: i64,
    pub mean_price: f64,
    pub listings: usize,
}

/// Row-level dataset with derived columns, plus the binned price trend that
/// only feeds the trend chart.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub dataset: Dataset,
    /// Sorted by bin
    pub price_trend: Vec<PriceTrendPoint>,
}

/// Derive analytical columns from a cleaned dataset.
#[instrument(skip_all, fields(rows = dataset.len()))]
pub fn derive(mut dataset: Dataset) -> FeatureSet {
    info!("🔧 Deriving features for {} rows...", dataset.len());

    add_price_per_sqft(&mut dataset);
    add_post_date(&mut dataset);
    add_source_grouped(&mut dataset);
    let price_trend = add_square_feet_bins(&mut dataset);

    info!(
        "✅ Feature derivation finished: {} rows, {} trend bins",
        dataset.len(),
        price_trend.len()
    );
    FeatureSet { dataset, price_trend }
}

fn add_price_per_sqft(dataset: &mut Dataset) {
    if !(dataset.has_column(SQUARE_FEET) && dataset.has_column(PRICE)) {
        return;
    }
    let before = dataset.len();
    dataset.retain(|row| row.get(SQUARE_FEET).as_f64().is_some_and(|sqft| sqft > 0.0));
    if dataset.len() < before {
        debug!("Dropped {} rows without a positive area", before - dataset.len());
    }

    dataset.add_column(PRICE_PER_SQFT);
    for row in dataset.rows_mut() {
        let ratio = match (row.get(PRICE).as_f64(), row.get(SQUARE_FEET).as_f64()) {
            (Some(price), Some(sqft)) => Value::Real(price / sqft),
            _ => Value::Missing,
        };
        row.set(PRICE_PER_SQFT, ratio);
    }
}

fn add_post_date(dataset: &mut Dataset) {
    if !dataset.has_column(TIME) {
        return;
    }
    dataset.add_column(POST_DATE);
    for row in dataset.rows_mut() {
        let post_date = epoch_seconds(row.get(TIME))
            .and_then(timestamp_from_epoch)
            .map_or(Value::Missing, Value::Timestamp);
        row.set(POST_DATE, post_date);
    }
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(secs) => Some(*secs),
        Value::Real(secs) if secs.is_finite() => Some(secs.trunc() as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn timestamp_from_epoch(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Collapse sources under 1% of all rows into one bucket, then label each
/// bucket with its share of the collapsed distribution, e.g. "RentLingo (41.20%)".
fn add_source_grouped(dataset: &mut Dataset) {
    if !dataset.has_column(SOURCE) {
        return;
    }
    let min_count = RARE_SOURCE_SHARE * dataset.len() as f64;

    let mut counts: HashMap<String, usize> = HashMap::new();
    for source in dataset.column_values(SOURCE).filter_map(Value::dedup_key) {
        *counts.entry(source).or_default() += 1;
    }

    let collapsed: Vec<Option<String>> = dataset
        .column_values(SOURCE)
        .map(|v| {
            v.dedup_key().map(|source| {
                if counts[&source] as f64 >= min_count {
                    source
                } else {
                    OTHER_SOURCE.to_string()
                }
            })
        })
        .collect();

    let mut grouped_counts: HashMap<&str, usize> = HashMap::new();
    for label in collapsed.iter().flatten() {
        *grouped_counts.entry(label.as_str()).or_default() += 1;
    }
    let labeled: usize = grouped_counts.values().sum();
    debug!(
        "{} sources collapsed into {} groups",
        counts.len(),
        grouped_counts.len()
    );

    let labels: Vec<Value> = collapsed
        .iter()
        .map(|label| match label {
            Some(label) => {
                let share = grouped_counts[label.as_str()] as f64 * 100.0 / labeled as f64;
                Value::Text(format!("{label} ({share:.2}%)"))
            }
            None => Value::Missing,
        })
        .collect();

    dataset.add_column(SOURCE_GROUPED);
    for (row, label) in dataset.rows_mut().iter_mut().zip(labels) {
        row.set(SOURCE_GROUPED, label);
    }
}

/// Tag each row with its 500 sqft bin and return the mean price per bin.
fn add_square_feet_bins(dataset: &mut Dataset) -> Vec<PriceTrendPoint> {
    if !dataset.has_column(SQUARE_FEET) {
        return Vec::new();
    }
    dataset.add_column(SQUARE_FEET_BIN);

    let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for row in dataset.rows_mut() {
        let bin = row.get(SQUARE_FEET).as_f64().map(square_feet_bin);
        if let (Some(bin), Some(price)) = (bin, row.get(PRICE).as_f64()) {
            let entry = sums.entry(bin).or_insert((0.0, 0));
            entry.0 += price;
            entry.1 += 1;
        }
        row.set(SQUARE_FEET_BIN, bin.map_or(Value::Missing, Value::Integer));
    }

    sums.into_iter()
        .map(|(bin, (total, listings))| PriceTrendPoint {
            square_feet_bin: bin,
            mean_price: total / listings as f64,
            listings,
        })
        .collect()
}

pub fn square_feet_bin(square_feet: f64) -> i64 {
    ((square_feet / SQUARE_FEET_BIN_WIDTH).floor() * SQUARE_FEET_BIN_WIDTH) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Row;

    fn listing(price: f64, sqft: f64) -> Row {
        Row::new().with(PRICE, price).with(SQUARE_FEET, sqft)
    }

    #[test]
    fn ratio_only_for_positive_area() {
        let ds = Dataset::from_rows(
            &[PRICE, SQUARE_FEET],
            vec![listing(1200.0, 900.0), listing(800.0, 0.0), listing(500.0, 250.0)],
        );
        let out = derive(ds).dataset;
        assert_eq!(out.len(), 2);
        for row in out.rows() {
            let price = row.get(PRICE).as_f64().unwrap();
            let sqft = row.get(SQUARE_FEET).as_f64().unwrap();
            let ratio = row.get(PRICE_PER_SQFT).as_f64().unwrap();
            assert!(sqft > 0.0);
            assert!((ratio - price / sqft).abs() < 1e-12);
        }
    }

    #[test]
    fn post_date_from_epoch_seconds() {
        let ds = Dataset::from_rows(
            &[TIME],
            vec![
                Row::new().with(TIME, 1577359415i64),
                Row::new().with(TIME, "garbage"),
            ],
        );
        let out = derive(ds).dataset;
        match out.rows()[0].get(POST_DATE) {
            Value::Timestamp(ts) => {
                assert_eq!(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "2019-12-26 11:23:35")
            }
            other => panic!("expected timestamp, got {other:?}"),
        }
        assert_eq!(out.rows()[1].get(POST_DATE), &Value::Missing);
    }

    #[test]
    fn rare_sources_collapse_into_other() {
        let mut rows = Vec::new();
        rows.extend((0..400).map(|_| Row::new().with(SOURCE, "RentLingo")));
        rows.extend((0..555).map(|_| Row::new().with(SOURCE, "RentDigs.com")));
        for i in 0..9 {
            let name = format!("tiny-{i}");
            rows.extend((0..5).map(|_| Row::new().with(SOURCE, name.as_str())));
        }
        let ds = Dataset::from_rows(&[SOURCE], rows);
        let out = derive(ds).dataset;

        let labels: std::collections::HashSet<String> = out
            .column_values(SOURCE_GROUPED)
            .map(|v| v.to_string())
            .collect();
        assert_eq!(labels.len(), 3);
        assert!(labels.contains("RentLingo (40.00%)"));
        assert!(labels.contains("RentDigs.com (55.50%)"));
        assert!(labels.contains("Other (4.50%)"));
    }

    #[test]
    fn bins_and_trend() {
        let ds = Dataset::from_rows(
            &[PRICE, SQUARE_FEET],
            vec![
                listing(1000.0, 450.0),
                listing(1200.0, 499.0),
                listing(2000.0, 1000.0),
            ],
        );
        let features = derive(ds);
        let bins: Vec<i64> = features
            .dataset
            .column_values(SQUARE_FEET_BIN)
            .filter_map(Value::as_i64)
            .collect();
        assert_eq!(bins, vec![0, 0, 1000]);
        assert_eq!(
            features.price_trend,
            vec![
                PriceTrendPoint { square_feet_bin: 0, mean_price: 1100.0, listings: 2 },
                PriceTrendPoint { square_feet_bin: 1000, mean_price: 2000.0, listings: 1 },
            ]
        );
    }

    #[test]
    fn nothing_derived_without_inputs() {
        let ds = Dataset::from_rows(&["state"], vec![Row::new().with("state", "TX")]);
        let features = derive(ds);
        assert_eq!(features.dataset.columns(), &["state".to_string()]);
        assert!(features.price_trend.is_empty());
    }
}
