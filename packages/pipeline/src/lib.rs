#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The per-region modeling pipeline.
//!
//! A run loads and merges the input tables, then for every region
//! independently:
//!
//! 1. regresses tree cover on the four drivers ([`drivers`]),
//! 2. extrapolates each driver along its linear trend ([`exogenous`]),
//! 3. fits ARIMAX(1,1,1) and forecasts the horizon ([`target`]),
//! 4. scores the forecasts against observed actuals ([`compare`]).
//!
//! Regions run in parallel on the rayon pool. A region that fails a stage
//! is recorded as a [`RegionFailure`] and left out of the affected tables;
//! it never stops the other regions. The run produces one immutable
//! [`PipelineResult`].

pub mod compare;
pub mod drivers;
pub mod exogenous;
pub mod export;
pub mod progress;
pub mod target;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use forestcast_dataset::{Actuals, Dataset, DatasetConfig, DatasetError};
use forestcast_models::{
    ComparisonRow, DriverEstimate, FailureKind, ForecastHorizon, ForecastPoint, Observation,
    PipelineStage, RegionFailure, Summary,
};
use forestcast_stats::StatsError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compare::CompareError;
use crate::progress::ProgressCallback;

/// Errors that abort a whole pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// An input table could not be loaded or merged.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Driver coefficients, grouped by region in region order.
    pub drivers: Vec<DriverEstimate>,
    /// Forecasts, grouped by region in region order.
    pub forecasts: Vec<ForecastPoint>,
    /// Forecast-vs-actual rows, one per `(Region, Year)`.
    pub comparison: Vec<ComparisonRow>,
    /// Overall accuracy.
    pub summary: Summary,
    /// Regions of the base table in first-appearance order.
    pub regions: Vec<String>,
    /// Per-region failures.
    pub failures: Vec<RegionFailure>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
}

/// What one region contributed to a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionOutcome {
    /// Driver estimates, empty if the regression failed.
    pub drivers: Vec<DriverEstimate>,
    /// Forecasts, empty if extrapolation or the ARIMAX fit failed.
    pub forecasts: Vec<ForecastPoint>,
    /// Scored forecasts.
    pub comparison: Vec<ComparisonRow>,
    /// Everything that went wrong for this region.
    pub failures: Vec<RegionFailure>,
}

const fn failure_kind(err: &StatsError) -> FailureKind {
    match err {
        StatsError::Convergence { .. } => FailureKind::Convergence,
        StatsError::InsufficientData { .. }
        | StatsError::Singular(_)
        | StatsError::InvalidInput(_) => FailureKind::InsufficientData,
    }
}

fn stats_failure(region: &str, stage: PipelineStage, message: String, err: &StatsError) -> RegionFailure {
    RegionFailure {
        region: region.to_string(),
        stage,
        kind: failure_kind(err),
        year: None,
        message,
    }
}

fn compare_failure(region: &str, err: &CompareError) -> RegionFailure {
    let year = match err {
        CompareError::ZeroActual { year, .. } => Some(*year),
        CompareError::Empty => None,
    };
    RegionFailure {
        region: region.to_string(),
        stage: PipelineStage::Comparison,
        kind: FailureKind::Division,
        year,
        message: err.to_string(),
    }
}

/// Runs every stage for one region.
///
/// `rows` must hold only this region's observations, sorted by year.
#[must_use]
pub fn run_region(
    region: &str,
    rows: &[Observation],
    actuals: &Actuals,
    horizon: ForecastHorizon,
) -> RegionOutcome {
    let mut outcome = RegionOutcome::default();

    match drivers::estimate_drivers(region, rows) {
        Ok(estimates) => outcome.drivers = estimates,
        Err(e) => outcome.failures.push(stats_failure(
            region,
            PipelineStage::Drivers,
            e.to_string(),
            &e,
        )),
    }

    let projection = match exogenous::project_drivers(rows, horizon.len) {
        Ok(projection) => projection,
        Err(e) => {
            outcome.failures.push(stats_failure(
                region,
                PipelineStage::ExogenousTrend,
                e.to_string(),
                &e.source,
            ));
            return outcome;
        }
    };

    match target::forecast_target(region, rows, &projection, horizon) {
        Ok(points) => outcome.forecasts = points,
        Err(e) => {
            outcome.failures.push(stats_failure(
                region,
                PipelineStage::TargetForecast,
                e.to_string(),
                &e,
            ));
            return outcome;
        }
    }

    let (rows, errors) = compare::compare(&outcome.forecasts, actuals);
    outcome.comparison = rows;
    outcome
        .failures
        .extend(errors.iter().map(|e| compare_failure(region, e)));

    outcome
}

/// Loads the inputs described by `config` from `data_dir` and runs the
/// pipeline over them.
///
/// # Errors
///
/// Returns [`PipelineError::Dataset`] if the inputs cannot be loaded.
/// Per-region problems are reported in [`PipelineResult::failures`].
pub fn run_pipeline(
    config: &DatasetConfig,
    data_dir: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<PipelineResult, PipelineError> {
    let dataset = forestcast_dataset::load(config, data_dir)?;
    Ok(run_with_dataset(&dataset, config.horizon(), progress))
}

/// Runs the pipeline over an already loaded dataset.
#[must_use]
pub fn run_with_dataset(
    dataset: &Dataset,
    horizon: ForecastHorizon,
    progress: &Arc<dyn ProgressCallback>,
) -> PipelineResult {
    let regions = dataset.merged.regions().to_vec();
    log::info!(
        "Modeling {} regions for {:?}",
        regions.len(),
        horizon.years()
    );

    progress.set_total(regions.len() as u64);
    progress.set_message("Modeling regions".to_string());

    let outcomes: Vec<RegionOutcome> = regions
        .par_iter()
        .map(|region| {
            let rows = dataset.merged.region_rows(region);
            let outcome = run_region(region, &rows, &dataset.actuals, horizon);
            progress.inc(1);
            outcome
        })
        .collect();

    let result = assemble(regions, outcomes, horizon);
    progress.finish(format!(
        "Modeled {} regions ({} failures)",
        result.regions.len(),
        result.failures.len()
    ));
    result
}

/// Combines per-region outcomes, in region order, into the final result.
fn assemble(
    regions: Vec<String>,
    outcomes: Vec<RegionOutcome>,
    horizon: ForecastHorizon,
) -> PipelineResult {
    let mut drivers = Vec::new();
    let mut forecasts = Vec::new();
    let mut comparison = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        drivers.extend(outcome.drivers);
        forecasts.extend(outcome.forecasts);
        comparison.extend(outcome.comparison);
        failures.extend(outcome.failures);
    }

    for failure in &failures {
        log::warn!("{failure}");
    }

    let comparison = compare::deduplicate(comparison);
    let summary = summarize(&comparison, regions.len(), horizon);

    log::info!(
        "Pipeline finished: {} driver estimates, {} forecasts, {} comparison rows, {} failures",
        drivers.len(),
        forecasts.len(),
        comparison.len(),
        failures.len()
    );

    PipelineResult {
        drivers,
        forecasts,
        comparison,
        summary,
        regions,
        failures,
        completed_at: Utc::now(),
    }
}

/// Builds the summary; MAE and MAPE are `None` without comparison rows.
#[must_use]
pub fn summarize(comparison: &[ComparisonRow], total_regions: usize, horizon: ForecastHorizon) -> Summary {
    let (overall_mae, overall_mape) = match compare::aggregate(comparison) {
        Ok(metrics) => (Some(metrics.mae), Some(metrics.mape)),
        Err(e) => {
            log::warn!("Overall MAE/MAPE undefined: {e}");
            (None, None)
        }
    };

    Summary {
        overall_mae,
        overall_mape,
        total_regions,
        forecast_years: horizon.years(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use forestcast_dataset::MergedTable;

    use super::*;
    use crate::progress::null_progress;
    use crate::progress::tests::CountingProgress;

    /// Two regions over 2015-2020 with linear histories; region B is
    /// missing its 2017 agriculture value.
    fn synthetic_dataset() -> Dataset {
        let mut observations = Vec::new();
        for (region, base, slope) in [("A", 5_000.0, -20.0), ("B", 3_000.0, -12.0)] {
            for year in 2015..=2020 {
                let t = f64::from(year - 2015);
                let mut o = Observation::empty(region, year);
                o.tree_cover = Some(t.mul_add(slope, base));
                let harvest_cycle = if year % 2 == 0 { 0.0 } else { 3.0 };
                o.agriculture = Some(t.mul_add(4.0, 200.0) + harvest_cycle);
                o.logging = Some((0.2 * t).mul_add(t, t.mul_add(-1.5, 60.0)));
                o.urbanization = Some((0.05 * t * t).mul_add(t, t.mul_add(0.4, 35.0)));
                o.roads_km = Some(t.mul_add(25.0, 32_000.0));
                if region == "B" && year == 2017 {
                    o.agriculture = None;
                }
                observations.push(o);
            }
        }

        let actuals = Actuals::from_entries([
            ("A", 2021, 4_880.0),
            ("A", 2022, 4_860.0),
            ("A", 2023, 4_845.0),
            ("A", 2024, 4_820.0),
            ("B", 2021, 2_928.0),
            ("B", 2022, 2_916.0),
            ("B", 2023, 2_900.0),
            ("B", 2024, 2_892.0),
        ]);

        Dataset {
            merged: MergedTable::from_observations(observations),
            actuals,
        }
    }

    #[test]
    fn end_to_end_forecasts_both_regions() {
        let result = run_with_dataset(&synthetic_dataset(), ForecastHorizon::default(), &null_progress());

        assert_eq!(result.regions, vec!["A".to_string(), "B".to_string()]);
        for region in ["A", "B"] {
            let years: Vec<i32> = result
                .forecasts
                .iter()
                .filter(|p| p.region == region)
                .map(|p| p.year)
                .collect();
            assert_eq!(years, vec![2021, 2022, 2023, 2024, 2025], "{region}");
        }
        assert!(result.forecasts.iter().all(|p| p.forecast.is_finite()));

        // Actuals exist for 2021-2024 only.
        assert_eq!(result.comparison.len(), 8);
        assert!(result.comparison.iter().all(|r| r.year <= 2024));
        assert!(result.comparison.iter().all(|r| r.ae >= 0.0 && r.ape >= 0.0));

        // A's regression has six complete rows; B lost one to the gap.
        assert_eq!(result.drivers.len(), 5);
        assert!(result.drivers.iter().all(|d| d.region == "A"));
        assert!(result.failures.iter().any(|f| f.region == "B"
            && f.stage == PipelineStage::Drivers
            && f.kind == FailureKind::InsufficientData));

        assert_eq!(result.summary.total_regions, 2);
        assert_eq!(result.summary.forecast_years, vec![2021, 2022, 2023, 2024, 2025]);
        assert!(result.summary.overall_mae.is_some_and(f64::is_finite));
        assert!(result.summary.overall_mape.is_some_and(f64::is_finite));
    }

    #[test]
    fn zero_actual_is_reported_not_scored() {
        let mut dataset = synthetic_dataset();
        dataset.actuals = Actuals::from_entries([("A", 2021, 0.0), ("A", 2022, 4_860.0)]);

        let result = run_with_dataset(&dataset, ForecastHorizon::default(), &null_progress());
        assert_eq!(result.comparison.len(), 1);
        assert_eq!(result.comparison[0].year, 2022);
        assert!(result.failures.iter().any(|f| f.kind == FailureKind::Division
            && f.year == Some(2021)
            && f.stage == PipelineStage::Comparison));
        assert!(result.comparison.iter().all(|r| r.ape.is_finite()));
    }

    #[test]
    fn no_actuals_leaves_metrics_undefined() {
        let mut dataset = synthetic_dataset();
        dataset.actuals = Actuals::default();

        let result = run_with_dataset(&dataset, ForecastHorizon::default(), &null_progress());
        assert!(result.comparison.is_empty());
        assert_eq!(result.summary.overall_mae, None);
        assert_eq!(result.summary.overall_mape, None);
        assert_eq!(result.forecasts.len(), 10);
    }

    #[test]
    fn short_region_fails_without_stopping_others() {
        let mut dataset = synthetic_dataset();
        let mut observations = dataset.merged.observations().to_vec();
        let mut lonely = Observation::empty("C", 2020);
        lonely.tree_cover = Some(10.0);
        observations.push(lonely);
        dataset.merged = MergedTable::from_observations(observations);

        let result = run_with_dataset(&dataset, ForecastHorizon::default(), &null_progress());
        assert_eq!(result.regions.len(), 3);
        assert_eq!(result.summary.total_regions, 3);
        assert!(result.forecasts.iter().all(|p| p.region != "C"));
        assert!(result.failures.iter().any(|f| f.region == "C"
            && f.stage == PipelineStage::ExogenousTrend));
        assert_eq!(result.forecasts.len(), 10);
    }

    #[test]
    fn reports_progress_per_region() {
        let counting = Arc::new(CountingProgress::default());
        let progress: Arc<dyn ProgressCallback> = counting.clone();
        let result = run_with_dataset(&synthetic_dataset(), ForecastHorizon::default(), &progress);

        assert_eq!(result.regions.len(), 2);
        assert_eq!(counting.total.load(Ordering::SeqCst), 2);
        assert_eq!(counting.position.load(Ordering::SeqCst), 2);
        assert_eq!(counting.finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runs_from_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, header: &str, rows: Vec<String>| {
            let body = std::iter::once(header.to_string())
                .chain(rows)
                .collect::<Vec<_>>()
                .join("\n");
            std::fs::write(dir.path().join(name), body).unwrap();
        };
        let keyed = |f: &dyn Fn(&str, i32) -> String| {
            ["CAR", "NCR"]
                .iter()
                .flat_map(|r| (2015..=2020).map(move |y| (*r, y)))
                .map(|(r, y)| f(r, y))
                .collect::<Vec<_>>()
        };

        write(
            "Annual_Tree_Cover_Analysis_ha.csv",
            "Region,Year,tree_cover_ha",
            keyed(&|r: &str, y: i32| format!("{r},{y},{}", 9_000 - (y - 2015) * if r == "CAR" { 30 } else { 10 })),
        );
        write(
            "agriculture_ha.csv",
            "Region,Year,harvested_area_ha",
            keyed(&|r: &str, y: i32| format!("{r},{y},{}", 400 + (y - 2015) * 5 + (y % 2) * 7)),
        );
        write(
            "log_production.csv",
            "Region,Year,log_production_cbm",
            keyed(&|r: &str, y: i32| format!("{r},{y},{}", 80 - (y - 2015) * 2 + (y - 2015).pow(2))),
        );
        write(
            "urbanization_percentage.csv",
            "Region,Year,extrapolated_urbanization_percentage",
            keyed(&|r: &str, y: i32| format!("{r},{y},{}", 30 + (y - 2015).pow(3))),
        );
        write(
            "national_roads.csv",
            "Year,Total_km",
            (2015..=2020).map(|y| format!("{y},{}", 32_000 + (y - 2015) * 40)).collect(),
        );
        write(
            "actual_tree_cover.csv",
            "Region,Year,tree_cover_ha",
            vec!["CAR,2021,8800".to_string(), "NCR,2022,8930".to_string()],
        );

        let config = DatasetConfig::embedded().unwrap();
        let result = run_pipeline(&config, dir.path(), &null_progress()).unwrap();

        assert_eq!(result.regions, vec!["CAR".to_string(), "NCR".to_string()]);
        assert_eq!(result.forecasts.len(), 10);
        assert_eq!(result.drivers.len(), 10);
        let compared: Vec<(&str, i32)> = result
            .comparison
            .iter()
            .map(|r| (r.region.as_str(), r.year))
            .collect();
        assert_eq!(compared, vec![("CAR", 2021), ("NCR", 2022)]);
    }

    #[test]
    fn missing_input_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasetConfig::embedded().unwrap();
        let err = run_pipeline(&config, dir.path(), &null_progress()).unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(DatasetError::Io { .. })));
    }

    #[test]
    fn failure_kinds_follow_error_type() {
        assert_eq!(
            failure_kind(&StatsError::Convergence {
                iterations: 1,
                message: String::new()
            }),
            FailureKind::Convergence
        );
        assert_eq!(
            failure_kind(&StatsError::Singular(String::new())),
            FailureKind::InsufficientData
        );
    }
}
