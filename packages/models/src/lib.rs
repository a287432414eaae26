#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Row types shared across the tree-cover modeling pipeline.
//!
//! These types describe the merged per-region observations that feed the
//! models and the three derived tables the pipeline produces: driver
//! estimates, forecasts, and forecast-vs-actual comparisons. Serialized
//! field names (`Region`, `Year`, `P-value`, ...) are part of the public
//! JSON/CSV contract and must not change.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Canonical name of the modeled target column.
pub const TARGET_COLUMN: &str = "Tree_Cover";

/// A regressor in the driver regression.
///
/// [`Driver::Intercept`] only appears in regression output; the remaining
/// variants are the exogenous series that also feed the forecaster.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Driver {
    /// Constant term of the regression.
    #[serde(rename = "intercept")]
    #[strum(serialize = "intercept")]
    Intercept,
    /// Harvested agricultural area.
    Agriculture,
    /// Log production volume.
    Logging,
    /// Urban population share, in percent.
    Urbanization,
    /// Length of the national road network.
    #[serde(rename = "Roads_km")]
    #[strum(serialize = "Roads_km")]
    RoadsKm,
}

impl Driver {
    /// The exogenous drivers, in regressor order.
    pub const EXOGENOUS: [Self; 4] = [
        Self::Agriculture,
        Self::Logging,
        Self::Urbanization,
        Self::RoadsKm,
    ];

    /// Every regression term, intercept first.
    pub const ALL: [Self; 5] = [
        Self::Intercept,
        Self::Agriculture,
        Self::Logging,
        Self::Urbanization,
        Self::RoadsKm,
    ];
}

/// One merged (Region, Year) row.
///
/// Values are `None` when the source table had no row for this key.
/// Missing values are carried through as-is and never imputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Region name.
    #[serde(rename = "Region")]
    pub region: String,
    /// Calendar year.
    #[serde(rename = "Year")]
    pub year: i32,
    /// Tree cover in hectares (the target series).
    #[serde(rename = "Tree_Cover")]
    pub tree_cover: Option<f64>,
    /// Harvested agricultural area.
    #[serde(rename = "Agriculture")]
    pub agriculture: Option<f64>,
    /// Log production.
    #[serde(rename = "Logging")]
    pub logging: Option<f64>,
    /// Urbanization percentage.
    #[serde(rename = "Urbanization")]
    pub urbanization: Option<f64>,
    /// National roads length in km.
    #[serde(rename = "Roads_km")]
    pub roads_km: Option<f64>,
}

impl Observation {
    /// Creates an observation with no measured attributes.
    #[must_use]
    pub fn empty(region: impl Into<String>, year: i32) -> Self {
        Self {
            region: region.into(),
            year,
            tree_cover: None,
            agriculture: None,
            logging: None,
            urbanization: None,
            roads_km: None,
        }
    }

    /// Returns the value of a regression term for this row.
    ///
    /// The intercept is always `1.0`.
    #[must_use]
    pub const fn driver(&self, driver: Driver) -> Option<f64> {
        match driver {
            Driver::Intercept => Some(1.0),
            Driver::Agriculture => self.agriculture,
            Driver::Logging => self.logging,
            Driver::Urbanization => self.urbanization,
            Driver::RoadsKm => self.roads_km,
        }
    }

    /// Returns a mutable slot for an exogenous driver, or `None` for the
    /// intercept.
    pub const fn driver_mut(&mut self, driver: Driver) -> Option<&mut Option<f64>> {
        match driver {
            Driver::Intercept => None,
            Driver::Agriculture => Some(&mut self.agriculture),
            Driver::Logging => Some(&mut self.logging),
            Driver::Urbanization => Some(&mut self.urbanization),
            Driver::RoadsKm => Some(&mut self.roads_km),
        }
    }

    /// Returns the exogenous driver values, or `None` if any is missing.
    #[must_use]
    pub fn exogenous(&self) -> Option<[f64; 4]> {
        Some([
            self.agriculture?,
            self.logging?,
            self.urbanization?,
            self.roads_km?,
        ])
    }

    /// Whether the target and all four drivers are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.tree_cover.is_some() && self.exogenous().is_some()
    }
}

/// One regression coefficient for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverEstimate {
    /// Region the model was fitted for.
    #[serde(rename = "Region")]
    pub region: String,
    /// Regression term.
    #[serde(rename = "Driver")]
    pub driver: Driver,
    /// Estimated coefficient.
    #[serde(rename = "Coefficient")]
    pub coefficient: f64,
    /// Two-sided p-value of the coefficient's t statistic.
    #[serde(rename = "P-value")]
    pub p_value: f64,
}

/// A point forecast of the target for one region and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Region name.
    #[serde(rename = "Region")]
    pub region: String,
    /// Forecast year.
    #[serde(rename = "Year")]
    pub year: i32,
    /// Forecast tree cover.
    #[serde(rename = "Forecast")]
    pub forecast: f64,
}

/// A forecast matched against an observed actual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    /// Region name.
    #[serde(rename = "Region")]
    pub region: String,
    /// Year of the forecast and the actual.
    #[serde(rename = "Year")]
    pub year: i32,
    /// Observed tree cover.
    #[serde(rename = "Actual")]
    pub actual: f64,
    /// Forecast tree cover.
    #[serde(rename = "Forecast")]
    pub forecast: f64,
    /// Absolute error.
    #[serde(rename = "AE")]
    pub ae: f64,
    /// Absolute percentage error, in percent.
    #[serde(rename = "APE")]
    pub ape: f64,
}

/// Overall accuracy figures for a pipeline run.
///
/// `overall_mae` and `overall_mape` are `None` when no forecast could be
/// matched against an actual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Mean absolute error over all comparison rows.
    pub overall_mae: Option<f64>,
    /// Mean absolute percentage error over all comparison rows.
    pub overall_mape: Option<f64>,
    /// Number of regions in the base table.
    pub total_regions: usize,
    /// Forecast horizon years, ascending.
    pub forecast_years: Vec<i32>,
}

/// The fixed set of future years forecasts are produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastHorizon {
    /// First forecast year.
    pub start_year: i32,
    /// Number of consecutive years.
    pub len: usize,
}

impl ForecastHorizon {
    /// Returns the horizon years in ascending order.
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        (self.start_year..).take(self.len).collect()
    }
}

impl Default for ForecastHorizon {
    fn default() -> Self {
        Self {
            start_year: 2021,
            len: 5,
        }
    }
}

/// Pipeline stage in which a per-region failure occurred.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    /// Driver regression.
    Drivers,
    /// Linear extrapolation of the exogenous drivers.
    ExogenousTrend,
    /// ARIMAX fit and forecast of the target.
    TargetForecast,
    /// Forecast-vs-actual scoring.
    Comparison,
}

/// Category of a per-region failure.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Too few usable rows, or a rank-deficient design.
    InsufficientData,
    /// The likelihood optimizer did not converge.
    Convergence,
    /// A percentage error had a zero denominator.
    Division,
}

/// A per-region failure recorded during a pipeline run.
///
/// Failed regions are absent from the affected output tables; the
/// failure itself is reported here instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionFailure {
    /// Region that failed.
    #[serde(rename = "Region")]
    pub region: String,
    /// Stage that failed.
    #[serde(rename = "Stage")]
    pub stage: PipelineStage,
    /// Failure category.
    #[serde(rename = "Kind")]
    pub kind: FailureKind,
    /// Year involved, for failures tied to a single row.
    #[serde(rename = "Year")]
    pub year: Option<i32>,
    /// Human-readable description.
    #[serde(rename = "Message")]
    pub message: String,
}

impl std::fmt::Display for RegionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.region, self.stage, self.kind)?;
        if let Some(year) = self.year {
            write!(f, " year {year}")?;
        }
        write!(f, ": {}", self.message)
    }
}
