//! TOML dataset configuration.
//!
//! [`DatasetConfig`] names every input file and column the loader touches,
//! so that the canonical column set (`Tree_Cover`, `Agriculture`, ...) is
//! bound to source names only here. A default layout is embedded at
//! compile time from `forestcast.toml`.

use std::path::{Path, PathBuf};

use forestcast_models::{Driver, ForecastHorizon};
use serde::Deserialize;

use crate::DatasetError;

/// The embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../forestcast.toml");

/// Complete description of the pipeline inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Where the files live and how they are delimited.
    #[serde(default)]
    pub data: DataSection,
    /// Forecast horizon.
    #[serde(default)]
    pub forecast: ForecastSection,
    /// The base table holding the target series. Its `(Region, Year)`
    /// pairs define which observations exist.
    pub target: TableSpec,
    /// One table per exogenous driver, merged in this order.
    pub drivers: Vec<DriverTableSpec>,
    /// Ground-truth target values for the forecast years.
    pub actuals: TableSpec,
}

/// File location settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSection {
    /// Directory the table files are resolved against.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Single-character field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            delimiter: default_delimiter(),
        }
    }
}

/// Forecast horizon settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ForecastSection {
    /// First forecast year.
    pub start_year: i32,
    /// Number of years to forecast.
    pub horizon: usize,
}

impl Default for ForecastSection {
    fn default() -> Self {
        let horizon = ForecastHorizon::default();
        Self {
            start_year: horizon.start_year,
            horizon: horizon.len,
        }
    }
}

/// Column layout of one input table.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    /// File name, relative to [`DataSection::dir`].
    pub file: PathBuf,
    /// Name of the region key column.
    #[serde(default = "default_region_column")]
    pub region_column: String,
    /// Name of the year key column.
    #[serde(default = "default_year_column")]
    pub year_column: String,
    /// Name of the source value column. It is renamed to the canonical
    /// column implied by the table's role.
    pub value_column: String,
}

/// A driver table and the canonical driver its value column maps to.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverTableSpec {
    /// Canonical driver this table provides.
    pub driver: Driver,
    /// Column layout.
    #[serde(flatten)]
    pub table: TableSpec,
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_region_column() -> String {
    "Region".to_string()
}

fn default_year_column() -> String {
    "Year".to_string()
}

impl DatasetConfig {
    /// Parses and validates the embedded default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the embedded TOML is malformed.
    pub fn embedded() -> Result<Self, DatasetError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Parses and validates a TOML configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Toml`] on syntax errors and
    /// [`DatasetError::Config`] if the configuration is inconsistent.
    pub fn from_toml(toml_str: &str) -> Result<Self, DatasetError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the file cannot be read or is invalid.
    pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
        let contents = std::fs::read_to_string(path).map_err(|e| DatasetError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Returns the forecast horizon.
    #[must_use]
    pub const fn horizon(&self) -> ForecastHorizon {
        ForecastHorizon {
            start_year: self.forecast.start_year,
            len: self.forecast.horizon,
        }
    }

    /// Returns the delimiter as a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Config`] if the delimiter is not exactly one
    /// ASCII character.
    pub fn delimiter(&self) -> Result<u8, DatasetError> {
        match self.data.delimiter.as_bytes() {
            [byte] if byte.is_ascii() => Ok(*byte),
            _ => Err(DatasetError::Config(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.data.delimiter
            ))),
        }
    }

    fn validate(&self) -> Result<(), DatasetError> {
        self.delimiter()?;

        if self.forecast.horizon == 0 {
            return Err(DatasetError::Config(
                "forecast horizon must be at least one year".to_string(),
            ));
        }

        for spec in &self.drivers {
            if spec.driver == Driver::Intercept {
                return Err(DatasetError::Config(
                    "'intercept' is not a data-backed driver".to_string(),
                ));
            }
        }

        for driver in Driver::EXOGENOUS {
            let count = self.drivers.iter().filter(|d| d.driver == driver).count();
            if count != 1 {
                return Err(DatasetError::Config(format!(
                    "driver {driver} must be configured exactly once (found {count})"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [target]
        file = "tree.csv"
        value_column = "tree_cover_ha"

        [[drivers]]
        driver = "Agriculture"
        file = "agri.csv"
        value_column = "harvested_area_ha"

        [[drivers]]
        driver = "Logging"
        file = "log.csv"
        value_column = "log_production_cbm"

        [[drivers]]
        driver = "Urbanization"
        file = "urban.csv"
        value_column = "urbanization"

        [[drivers]]
        driver = "Roads_km"
        file = "roads.csv"
        value_column = "Total_km"

        [actuals]
        file = "actual.csv"
        value_column = "tree_cover_ha"
    "#;

    #[test]
    fn parses_embedded_config() {
        let config = DatasetConfig::embedded().unwrap();
        assert_eq!(config.drivers.len(), 4);
        assert_eq!(config.target.region_column, "Region");
        assert_eq!(config.horizon().years(), vec![2021, 2022, 2023, 2024, 2025]);
        assert_eq!(config.delimiter().unwrap(), b',');
    }

    #[test]
    fn applies_defaults() {
        let config = DatasetConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.data.dir, PathBuf::from("."));
        assert_eq!(config.forecast.start_year, 2021);
        assert_eq!(config.drivers[3].driver, Driver::RoadsKm);
        assert_eq!(config.drivers[3].table.year_column, "Year");
    }

    #[test]
    fn rejects_missing_driver() {
        let toml_str = MINIMAL.replace("driver = \"Logging\"", "driver = \"Agriculture\"");
        let err = DatasetConfig::from_toml(&toml_str).unwrap_err();
        assert!(matches!(err, DatasetError::Config(_)), "{err}");
    }

    #[test]
    fn rejects_intercept_driver() {
        let toml_str = MINIMAL.replace("driver = \"Logging\"", "driver = \"intercept\"");
        assert!(DatasetConfig::from_toml(&toml_str).is_err());
    }

    #[test]
    fn rejects_multi_char_delimiter() {
        let toml_str = format!("[data]\ndelimiter = \";;\"\n{MINIMAL}");
        let err = DatasetConfig::from_toml(&toml_str).unwrap_err();
        assert!(matches!(err, DatasetError::Config(_)), "{err}");
    }

    #[test]
    fn rejects_zero_horizon() {
        let toml_str = format!("[forecast]\nstart_year = 2021\nhorizon = 0\n{MINIMAL}");
        assert!(DatasetConfig::from_toml(&toml_str).is_err());
    }
}
