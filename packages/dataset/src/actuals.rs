//! Ground-truth lookup for scoring forecasts.

use std::collections::HashMap;
use std::path::Path;

use crate::DatasetError;
use crate::config::TableSpec;
use crate::table::{self, RawTable};

/// Observed target values keyed by `(Region, Year)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Actuals {
    values: HashMap<(String, i32), f64>,
}

impl Actuals {
    /// Builds the lookup from a parsed table.
    ///
    /// Rows with a null value are skipped. When a key repeats, the first
    /// row wins and the rest are logged and ignored.
    #[must_use]
    pub fn from_table(table: &RawTable) -> Self {
        let mut values = HashMap::with_capacity(table.rows.len());
        for row in &table.rows {
            let (Some(region), Some(value)) = (row.region.as_ref(), row.value) else {
                continue;
            };
            let key = (region.clone(), row.year);
            if values.contains_key(&key) {
                log::warn!(
                    "{}: ignoring repeated actual for ({region}, {})",
                    table.label,
                    row.year
                );
                continue;
            }
            values.insert(key, value);
        }
        Self { values }
    }

    /// Builds the lookup from `(region, year, value)` triples, first
    /// occurrence winning.
    #[must_use]
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, i32, f64)>) -> Self {
        let mut values = HashMap::new();
        for (region, year, value) in entries {
            values.entry((region.to_string(), year)).or_insert(value);
        }
        Self { values }
    }

    /// Returns the actual for `(region, year)`, if one was observed.
    #[must_use]
    pub fn get(&self, region: &str, year: i32) -> Option<f64> {
        self.values.get(&(region.to_string(), year)).copied()
    }

    /// Number of observed actuals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no actuals were observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Loads the ground-truth table at `path`.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file is missing or malformed.
pub fn load_actuals(path: &Path, spec: &TableSpec, delimiter: u8) -> Result<Actuals, DatasetError> {
    let raw = table::load_table(path, spec, delimiter, true)?;
    Ok(Actuals::from_table(&raw))
}
