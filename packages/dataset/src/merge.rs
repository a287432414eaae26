//! Region broadcast and left-join merge of the topic tables.
//!
//! The base (target) table is authoritative: its `(Region, Year)` pairs
//! are exactly the merged rows, in file order. Driver tables only fill in
//! columns; keys they lack become `None` and keys the base lacks are
//! dropped.

use std::collections::{BTreeMap, HashMap, HashSet};

use forestcast_models::{Driver, Observation, TARGET_COLUMN};

use crate::DatasetError;
use crate::table::{RawTable, TableRow};

/// The merged `(Region, Year)` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    regions: Vec<String>,
    observations: Vec<Observation>,
}

impl MergedTable {
    /// Builds a merged table from rows that already satisfy the one
    /// row per key invariant. Regions are taken in first-appearance order.
    #[must_use]
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        let regions = distinct_regions(observations.iter().map(|o| o.region.as_str()));
        Self {
            regions,
            observations,
        }
    }

    /// Distinct regions in order of first appearance in the base table.
    #[must_use]
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// All merged rows in base-table order.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Returns a copy of one region's rows sorted by year ascending.
    #[must_use]
    pub fn region_rows(&self, region: &str) -> Vec<Observation> {
        let mut rows: Vec<Observation> = self
            .observations
            .iter()
            .filter(|o| o.region == region)
            .cloned()
            .collect();
        rows.sort_by_key(|o| o.year);
        rows
    }
}

fn distinct_regions<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Replicates every row of a region-less table once per region.
///
/// A table with `k` rows yields `k * regions.len()` rows, every region
/// receiving the same value for a given year. Tables that already have a
/// region column are returned unchanged.
#[must_use]
pub fn broadcast(table: &RawTable, regions: &[String]) -> RawTable {
    if table.has_region {
        return table.clone();
    }

    let rows = table
        .rows
        .iter()
        .flat_map(|row| {
            regions.iter().map(move |region| TableRow {
                region: Some(region.clone()),
                year: row.year,
                value: row.value,
            })
        })
        .collect();

    RawTable {
        label: table.label.clone(),
        has_region: true,
        rows,
    }
}

/// Indexes a region-keyed table by `(Region, Year)`, rejecting duplicates.
fn index(table: &RawTable) -> Result<HashMap<(&str, i32), Option<f64>>, DatasetError> {
    let mut map = HashMap::with_capacity(table.rows.len());
    for row in &table.rows {
        let region = row.region.as_deref().unwrap_or_default();
        if map.insert((region, row.year), row.value).is_some() {
            return Err(DatasetError::DuplicateKey {
                table: table.label.clone(),
                region: region.to_string(),
                year: row.year,
            });
        }
    }
    Ok(map)
}

/// Left-joins each driver table onto `base`.
///
/// # Errors
///
/// Returns [`DatasetError::EmptyTable`] if `base` has no rows and
/// [`DatasetError::DuplicateKey`] if any table repeats a key.
pub fn merge(base: &RawTable, drivers: &[(Driver, RawTable)]) -> Result<MergedTable, DatasetError> {
    if base.rows.is_empty() {
        return Err(DatasetError::EmptyTable {
            table: base.label.clone(),
        });
    }

    let regions = distinct_regions(
        base.rows
            .iter()
            .filter_map(|row| row.region.as_deref()),
    );

    // Validates the base key set before any join.
    index(base)?;

    let mut observations: Vec<Observation> = base
        .rows
        .iter()
        .map(|row| {
            let mut obs = Observation::empty(row.region.clone().unwrap_or_default(), row.year);
            obs.tree_cover = row.value;
            obs
        })
        .collect();

    for (driver, table) in drivers {
        let aligned = broadcast(table, &regions);
        if !table.has_region {
            log::info!(
                "{} has no region column; broadcast {} rows to {} regions",
                table.label,
                table.rows.len(),
                regions.len()
            );
        }

        let lookup = index(&aligned)?;
        let mut matched = 0usize;
        for obs in &mut observations {
            let value = lookup
                .get(&(obs.region.as_str(), obs.year))
                .copied()
                .flatten();
            if value.is_some() {
                matched += 1;
            }
            if let Some(slot) = obs.driver_mut(*driver) {
                *slot = value;
            }
        }

        log::debug!(
            "Joined {} as {driver}: {matched}/{} rows matched",
            table.label,
            observations.len()
        );
    }

    let missing = count_missing(&observations);
    if !missing.is_empty() {
        log::info!("Merged table has missing values: {missing:?}");
    }

    Ok(MergedTable {
        regions,
        observations,
    })
}

fn count_missing(observations: &[Observation]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for obs in observations {
        if obs.tree_cover.is_none() {
            *counts.entry(TARGET_COLUMN.to_string()).or_insert(0) += 1;
        }
        for driver in Driver::EXOGENOUS {
            if obs.driver(driver).is_none() {
                *counts.entry(driver.to_string()).or_insert(0) += 1;
            }
        }
    }
    counts
}
