use crate::config::ReportConfig;
use crate::constants::{BEDROOMS, PRICE, SQUARE_FEET_BIN_WIDTH, STATE};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::clean::median;
use crate::pipeline::processing::{FeatureSet, PriceTrendPoint};
use crate::types::{Dataset, Value};
use plotters::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

pub const BEDROOMS_CHART: &str = "price_by_bedrooms.svg";
pub const STATE_CHART: &str = "median_price_by_state.svg";
pub const TREND_CHART: &str = "price_trend_by_sqft.svg";

type DrawResult<T> = std::result::Result<T, Box<dyn Error>>;

/// Render every chart whose inputs are present. Returns the files written.
#[instrument(skip(features, config), fields(figures_dir = %figures_dir.display()))]
pub fn render_reports(
    features: &FeatureSet,
    figures_dir: &Path,
    config: &ReportConfig,
) -> Result<Vec<PathBuf>> {
    info!("📊 Rendering charts into {}...", figures_dir.display());
    fs::create_dir_all(figures_dir)?;
    let dataset = &features.dataset;
    let mut written = Vec::new();

    let by_bedrooms = prices_by_bedrooms(dataset);
    if by_bedrooms.is_empty() {
        warn!("No price/bedrooms data; skipping {}", BEDROOMS_CHART);
    } else {
        let path = figures_dir.join(BEDROOMS_CHART);
        draw_price_by_bedrooms(&path, &by_bedrooms, config.price_ceiling)
            .map_err(|e| chart_error(&path, e))?;
        info!("Chart '{}' saved", BEDROOMS_CHART);
        written.push(path);
    }

    let medians = top_states_by_median(dataset, config.top_states);
    if medians.is_empty() {
        warn!("No price/state data; skipping {}", STATE_CHART);
    } else {
        let path = figures_dir.join(STATE_CHART);
        draw_median_by_state(&path, &medians).map_err(|e| chart_error(&path, e))?;
        info!("Chart '{}' saved", STATE_CHART);
        written.push(path);
    }

    if features.price_trend.is_empty() {
        warn!("No binned price trend; skipping {}", TREND_CHART);
    } else {
        let path = figures_dir.join(TREND_CHART);
        draw_price_trend(&path, &features.price_trend).map_err(|e| chart_error(&path, e))?;
        info!("Chart '{}' saved", TREND_CHART);
        written.push(path);
    }

    Ok(written)
}

fn chart_error(path: &Path, e: Box<dyn Error>) -> PipelineError {
    PipelineError::Chart(format!("{}: {}", path.display(), e))
}

/// Prices grouped by bedroom count, ascending.
pub fn prices_by_bedrooms(dataset: &Dataset) -> BTreeMap<i64, Vec<f64>> {
    let mut groups: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    if !(dataset.has_column(BEDROOMS) && dataset.has_column(PRICE)) {
        return groups;
    }
    for row in dataset.rows() {
        if let (Some(bedrooms), Some(price)) = (row.get(BEDROOMS).as_i64(), row.get(PRICE).as_f64()) {
            groups.entry(bedrooms).or_default().push(price);
        }
    }
    groups
}

/// Median price of the `top_n` states with the most listings, highest median
/// first. Ties are broken by state name.
pub fn top_states_by_median(dataset: &Dataset, top_n: usize) -> Vec<(String, f64)> {
    if !(dataset.has_column(STATE) && dataset.has_column(PRICE)) {
        return Vec::new();
    }
    let mut listings: HashMap<String, usize> = HashMap::new();
    let mut prices: HashMap<String, Vec<f64>> = HashMap::new();
    for row in dataset.rows() {
        let state = match row.get(STATE) {
            Value::Missing => continue,
            other => other.to_string(),
        };
        *listings.entry(state.clone()).or_default() += 1;
        if let Some(price) = row.get(PRICE).as_f64() {
            prices.entry(state).or_default().push(price);
        }
    }

    let mut busiest: Vec<(String, usize)> = listings.into_iter().collect();
    busiest.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    busiest.truncate(top_n);

    let mut medians: Vec<(String, f64)> = busiest
        .into_iter()
        .filter_map(|(state, _)| {
            let m = prices.get_mut(&state).and_then(|p| median(p))?;
            Some((state, m))
        })
        .collect();
    medians.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    medians
}

/// Box statistics per bedroom count, taken over the unclipped prices.
/// The chart's fixed y window cuts off anything above the ceiling.
pub fn bedroom_quartiles(groups: &BTreeMap<i64, Vec<f64>>) -> Vec<Quartiles> {
    groups.values().map(|prices| Quartiles::new(prices.as_slice())).collect()
}

fn draw_price_by_bedrooms(
    path: &Path,
    groups: &BTreeMap<i64, Vec<f64>>,
    price_ceiling: f64,
) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let labels: Vec<String> = groups.keys().map(|b| b.to_string()).collect();
    let quartiles = bedroom_quartiles(groups);

    let mut chart = ChartBuilder::on(&root)
        .caption("Price distribution by number of bedrooms", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(labels[..].into_segmented(), 0f32..price_ceiling as f32)?;
    chart
        .configure_mesh()
        .x_desc("Bedrooms")
        .y_desc("Price (USD)")
        .draw()?;
    chart.draw_series(
        labels
            .iter()
            .zip(quartiles.iter())
            .map(|(label, q)| Boxplot::new_vertical(SegmentValue::CenterOf(label), q)),
    )?;

    root.present()?;
    Ok(())
}

fn draw_median_by_state(path: &Path, medians: &[(String, f64)]) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let labels: Vec<String> = medians.iter().map(|(state, _)| state.clone()).collect();
    let y_max = medians.iter().map(|(_, m)| *m).fold(0.0, f64::max) * 1.1;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Median rent by state (top {})", medians.len()),
            ("sans-serif", 24),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(labels[..].into_segmented(), 0f64..y_max.max(1.0))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("State")
        .y_desc("Median price (USD)")
        .draw()?;
    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.6).filled())
            .margin(5)
            .data(labels.iter().zip(medians.iter()).map(|(label, (_, m))| (label, *m))),
    )?;

    root.present()?;
    Ok(())
}

fn draw_price_trend(path: &Path, trend: &[PriceTrendPoint]) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_min = trend.first().map_or(0, |p| p.square_feet_bin) as f64;
    let x_max = trend.last().map_or(0, |p| p.square_feet_bin) as f64 + SQUARE_FEET_BIN_WIDTH;
    let y_max = trend.iter().map(|p| p.mean_price).fold(0.0, f64::max) * 1.1;
    let points: Vec<(f64, f64)> = trend
        .iter()
        .map(|p| (p.square_feet_bin as f64, p.mean_price))
        .collect();

    let mut chart = ChartBuilder::on(&root)
        .caption("Mean price by square footage", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, 0f64..y_max.max(1.0))?;
    chart
        .configure_mesh()
        .x_desc("Square feet (500 sqft bins)")
        .y_desc("Mean price (USD)")
        .draw()?;
    chart.draw_series(LineSeries::new(points.iter().copied(), &RED))?;
    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 3, RED.filled())),
    )?;

    root.present()?;
    Ok(())
}
