//! Writing a pipeline result to disk and reading it back.
//!
//! The three tables go to `driver_df.csv`, `forecast_df.csv` and
//! `comparison_df.csv` with the same column names as the JSON records.
//! Failures go to `diagnostics.csv`, and the summary, region list and run
//! time to `overview.json`.
//!
//! Reading tolerates missing files: an absent table loads as empty, and an
//! absent overview is rebuilt from the comparison table.

use std::path::Path;

use chrono::{DateTime, Utc};
use forestcast_models::{
    ComparisonRow, DriverEstimate, ForecastHorizon, ForecastPoint, RegionFailure, Summary,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::PipelineResult;

/// File name of the driver estimate table.
pub const DRIVERS_FILE: &str = "driver_df.csv";
/// File name of the forecast table.
pub const FORECASTS_FILE: &str = "forecast_df.csv";
/// File name of the comparison table.
pub const COMPARISON_FILE: &str = "comparison_df.csv";
/// File name of the per-region failure table.
pub const DIAGNOSTICS_FILE: &str = "diagnostics.csv";
/// File name of the run overview.
pub const OVERVIEW_FILE: &str = "overview.json";

/// Errors that can occur while exporting or loading results.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A file or directory could not be accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A table could not be written or parsed.
    #[error("CSV error in {file}: {source}")]
    Csv {
        /// File name.
        file: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The overview could not be written or parsed.
    #[error("JSON error in overview.json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Overview {
    summary: Summary,
    regions: Vec<String>,
    completed_at: DateTime<Utc>,
}

fn write_table<T: Serialize>(dir: &Path, file: &str, rows: &[T]) -> Result<(), ExportError> {
    let csv_err = |source: csv::Error| ExportError::Csv {
        file: file.to_string(),
        source,
    };
    let mut writer = csv::Writer::from_path(dir.join(file)).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| ExportError::Io {
        path: dir.join(file).display().to_string(),
        source: e,
    })?;
    log::debug!("Wrote {} rows to {file}", rows.len());
    Ok(())
}

fn read_table<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>, ExportError> {
    let path = dir.join(file);
    if !path.exists() {
        log::warn!("{} not found; serving an empty table", path.display());
        return Ok(Vec::new());
    }
    let csv_err = |source: csv::Error| ExportError::Csv {
        file: file.to_string(),
        source,
    };
    let mut reader = csv::Reader::from_path(&path).map_err(csv_err)?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(csv_err)
}

/// Writes `result` into `dir`, creating the directory if needed.
///
/// # Errors
///
/// Returns [`ExportError`] if any file cannot be written.
pub fn export(result: &PipelineResult, dir: &Path) -> Result<(), ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| ExportError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    write_table(dir, DRIVERS_FILE, &result.drivers)?;
    write_table(dir, FORECASTS_FILE, &result.forecasts)?;
    write_table(dir, COMPARISON_FILE, &result.comparison)?;
    write_table(dir, DIAGNOSTICS_FILE, &result.failures)?;

    let overview = Overview {
        summary: result.summary.clone(),
        regions: result.regions.clone(),
        completed_at: result.completed_at,
    };
    let path = dir.join(OVERVIEW_FILE);
    let json = serde_json::to_string_pretty(&overview)?;
    std::fs::write(&path, json).map_err(|e| ExportError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    log::info!("Exported results to {}", dir.display());
    Ok(())
}

/// Reads a result previously written by [`export`].
///
/// # Errors
///
/// Returns [`ExportError`] if a file exists but cannot be parsed.
pub fn load_exports(dir: &Path) -> Result<PipelineResult, ExportError> {
    let drivers: Vec<DriverEstimate> = read_table(dir, DRIVERS_FILE)?;
    let forecasts: Vec<ForecastPoint> = read_table(dir, FORECASTS_FILE)?;
    let comparison: Vec<ComparisonRow> = read_table(dir, COMPARISON_FILE)?;
    let failures: Vec<RegionFailure> = read_table(dir, DIAGNOSTICS_FILE)?;

    let overview_path = dir.join(OVERVIEW_FILE);
    let overview = if overview_path.exists() {
        let text = std::fs::read_to_string(&overview_path).map_err(|e| ExportError::Io {
            path: overview_path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&text)?
    } else {
        log::warn!(
            "{} not found; rebuilding the overview from the tables",
            overview_path.display()
        );
        rebuild_overview(&drivers, &forecasts, &comparison)
    };

    log::info!(
        "Loaded exports from {}: {} driver estimates, {} forecasts, {} comparison rows",
        dir.display(),
        drivers.len(),
        forecasts.len(),
        comparison.len()
    );

    Ok(PipelineResult {
        drivers,
        forecasts,
        comparison,
        summary: overview.summary,
        regions: overview.regions,
        failures,
        completed_at: overview.completed_at,
    })
}

fn rebuild_overview(
    drivers: &[DriverEstimate],
    forecasts: &[ForecastPoint],
    comparison: &[ComparisonRow],
) -> Overview {
    let mut regions: Vec<String> = Vec::new();
    for region in drivers
        .iter()
        .map(|d| &d.region)
        .chain(forecasts.iter().map(|f| &f.region))
    {
        if !regions.contains(region) {
            regions.push(region.clone());
        }
    }

    let mut years: Vec<i32> = forecasts.iter().map(|f| f.year).collect();
    years.sort_unstable();
    years.dedup();
    let horizon = ForecastHorizon {
        start_year: years.first().copied().unwrap_or_default(),
        len: years.len(),
    };

    Overview {
        summary: crate::summarize(comparison, regions.len(), horizon),
        regions,
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use forestcast_models::{Driver, FailureKind, PipelineStage};

    use super::*;

    fn sample() -> PipelineResult {
        PipelineResult {
            drivers: vec![DriverEstimate {
                region: "CAR".to_string(),
                driver: Driver::RoadsKm,
                coefficient: -0.25,
                p_value: 0.03,
            }],
            forecasts: vec![
                ForecastPoint {
                    region: "CAR".to_string(),
                    year: 2021,
                    forecast: 110.0,
                },
                ForecastPoint {
                    region: "CAR".to_string(),
                    year: 2022,
                    forecast: 108.5,
                },
            ],
            comparison: vec![ComparisonRow {
                region: "CAR".to_string(),
                year: 2021,
                actual: 100.0,
                forecast: 110.0,
                ae: 10.0,
                ape: 10.0,
            }],
            summary: Summary {
                overall_mae: Some(10.0),
                overall_mape: Some(10.0),
                total_regions: 2,
                forecast_years: vec![2021, 2022],
            },
            regions: vec!["CAR".to_string(), "NCR".to_string()],
            failures: vec![RegionFailure {
                region: "NCR".to_string(),
                stage: PipelineStage::TargetForecast,
                kind: FailureKind::Convergence,
                year: None,
                message: "failed to converge".to_string(),
            }],
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn export_then_load_preserves_tables() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample();
        export(&result, dir.path()).unwrap();

        for file in [DRIVERS_FILE, FORECASTS_FILE, COMPARISON_FILE, DIAGNOSTICS_FILE, OVERVIEW_FILE] {
            assert!(dir.path().join(file).exists(), "{file}");
        }

        let loaded = load_exports(dir.path()).unwrap();
        assert_eq!(loaded, result);
    }

    #[test]
    fn csv_headers_use_record_field_names() {
        let dir = tempfile::tempdir().unwrap();
        export(&sample(), dir.path()).unwrap();

        let header = |file: &str| {
            std::fs::read_to_string(dir.path().join(file))
                .unwrap()
                .lines()
                .next()
                .unwrap()
                .to_string()
        };
        assert_eq!(header(DRIVERS_FILE), "Region,Driver,Coefficient,P-value");
        assert_eq!(header(FORECASTS_FILE), "Region,Year,Forecast");
        assert_eq!(header(COMPARISON_FILE), "Region,Year,Actual,Forecast,AE,APE");

        let drivers = std::fs::read_to_string(dir.path().join(DRIVERS_FILE)).unwrap();
        assert!(drivers.contains("CAR,Roads_km,-0.25,0.03"), "{drivers}");
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_exports(dir.path()).unwrap();
        assert!(loaded.drivers.is_empty());
        assert!(loaded.forecasts.is_empty());
        assert!(loaded.comparison.is_empty());
        assert!(loaded.failures.is_empty());
        assert_eq!(loaded.summary.overall_mae, None);
        assert_eq!(loaded.summary.total_regions, 0);
    }

    #[test]
    fn overview_is_rebuilt_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        export(&sample(), dir.path()).unwrap();
        std::fs::remove_file(dir.path().join(OVERVIEW_FILE)).unwrap();

        let loaded = load_exports(dir.path()).unwrap();
        assert_eq!(loaded.regions, vec!["CAR".to_string()]);
        assert_eq!(loaded.summary.overall_mae, Some(10.0));
        assert_eq!(loaded.summary.forecast_years, vec![2021, 2022]);
    }
}
