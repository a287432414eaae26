#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loading and merging of the per-topic input tables.
//!
//! Each topic (tree cover, agriculture, logging, ...) arrives as its own
//! delimited file keyed by `(Region, Year)`. [`load`] reads them as
//! described by a [`DatasetConfig`], broadcasts region-less tables to every
//! region, and left-joins everything onto the tree-cover table to produce
//! one [`Observation`](forestcast_models::Observation) per key.
//!
//! Any failure here is fatal to a pipeline run: a partial merge is never
//! meaningful.

pub mod actuals;
pub mod config;
pub mod merge;
pub mod table;

use std::path::Path;

use forestcast_models::Driver;

pub use actuals::Actuals;
pub use config::{DatasetConfig, TableSpec};
pub use merge::MergedTable;
pub use table::RawTable;

/// Errors that can occur while loading input tables.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// A file could not be opened or read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The delimited file could not be parsed.
    #[error("CSV error in {table}: {source}")]
    Csv {
        /// Table label (usually the file name).
        table: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// The TOML configuration could not be parsed.
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The configuration parsed but is not usable.
    #[error("Invalid config: {0}")]
    Config(String),

    /// A required key or value column is absent from a table header.
    #[error("Table {table} is missing required column '{column}'")]
    MissingColumn {
        /// Table label.
        table: String,
        /// Name of the missing column.
        column: String,
    },

    /// A cell could not be parsed as the expected type.
    #[error("Malformed value '{value}' in {table} line {line}, column '{column}'")]
    MalformedValue {
        /// Table label.
        table: String,
        /// 1-based line number in the file (header is line 1).
        line: u64,
        /// Column name.
        column: String,
        /// Raw cell content.
        value: String,
    },

    /// The same `(Region, Year)` key appears twice in one table.
    #[error("Duplicate key ({region}, {year}) in {table}")]
    DuplicateKey {
        /// Table label.
        table: String,
        /// Region of the duplicated key.
        region: String,
        /// Year of the duplicated key.
        year: i32,
    },

    /// The base table contains no rows, so there is nothing to model.
    #[error("Table {table} has no rows")]
    EmptyTable {
        /// Table label.
        table: String,
    },
}

/// The fully loaded inputs of a pipeline run.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Merged observations keyed by `(Region, Year)`.
    pub merged: MergedTable,
    /// Ground-truth tree cover for forecast years.
    pub actuals: Actuals,
}

/// Loads and merges every table described by `config`, resolving file
/// names against `data_dir`.
///
/// # Errors
///
/// Returns [`DatasetError`] if any file is missing or malformed, a
/// configured column is absent, or a table contains duplicate keys.
pub fn load(config: &DatasetConfig, data_dir: &Path) -> Result<Dataset, DatasetError> {
    let delimiter = config.delimiter()?;

    log::info!("Loading datasets from {}", data_dir.display());

    let base = table::load_table(
        &data_dir.join(&config.target.file),
        &config.target,
        delimiter,
        true,
    )?;

    let mut drivers: Vec<(Driver, RawTable)> = Vec::with_capacity(config.drivers.len());
    for driver_spec in &config.drivers {
        let raw = table::load_table(
            &data_dir.join(&driver_spec.table.file),
            &driver_spec.table,
            delimiter,
            false,
        )?;
        drivers.push((driver_spec.driver, raw));
    }

    log::info!("Merging datasets...");
    let merged = merge::merge(&base, &drivers)?;

    let actuals = actuals::load_actuals(
        &data_dir.join(&config.actuals.file),
        &config.actuals,
        delimiter,
    )?;

    log::info!(
        "Merged {} observations across {} regions ({} actuals)",
        merged.observations().len(),
        merged.regions().len(),
        actuals.len()
    );

    Ok(Dataset { merged, actuals })
}
