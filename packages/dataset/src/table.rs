//! Reading a single keyed table from a delimited file.

use std::io::Read;
use std::path::Path;

use crate::DatasetError;
use crate::config::TableSpec;

/// Cell contents treated as a missing value.
const NULL_MARKERS: &[&str] = &["", "na", "nan", "n/a", "null", "none"];

/// One row of a keyed input table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    /// Region key, or `None` for region-less tables.
    pub region: Option<String>,
    /// Year key.
    pub year: i32,
    /// The table's value column, or `None` if the cell was empty.
    pub value: Option<f64>,
}

/// A parsed input table reduced to its key columns and one value column.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Label used in errors and logs (usually the file name).
    pub label: String,
    /// Whether the file carried a region column.
    pub has_region: bool,
    /// Rows in file order.
    pub rows: Vec<TableRow>,
}

/// Opens and parses the table at `path`.
///
/// When `require_region` is `false` a missing region column is accepted
/// and the table is marked region-less, to be broadcast during the merge.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be opened or parsed.
pub fn load_table(
    path: &Path,
    spec: &TableSpec,
    delimiter: u8,
    require_region: bool,
) -> Result<RawTable, DatasetError> {
    let label = path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    let file = std::fs::File::open(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let table = read_table(file, spec, delimiter, &label, require_region)?;
    log::debug!(
        "Loaded {} rows from {label} (region column: {})",
        table.rows.len(),
        table.has_region
    );
    Ok(table)
}

/// Parses a table from any reader.
///
/// Only the key columns and `spec.value_column` are read; other columns
/// are ignored.
///
/// # Errors
///
/// Returns [`DatasetError::MissingColumn`] if a required column is absent,
/// [`DatasetError::MalformedValue`] for unparseable cells, and
/// [`DatasetError::Csv`] for delimiter-level problems.
pub fn read_table(
    reader: impl Read,
    spec: &TableSpec,
    delimiter: u8,
    label: &str,
    require_region: bool,
) -> Result<RawTable, DatasetError> {
    let csv_err = |e: csv::Error| DatasetError::Csv {
        table: label.to_string(),
        source: e,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_owned())
        .collect();

    let find = |column: &str| headers.iter().position(|h| h == column);
    let missing = |column: &str| DatasetError::MissingColumn {
        table: label.to_string(),
        column: column.to_string(),
    };

    let region_idx = find(&spec.region_column);
    if require_region && region_idx.is_none() {
        return Err(missing(&spec.region_column));
    }
    let year_idx = find(&spec.year_column).ok_or_else(|| missing(&spec.year_column))?;
    let value_idx = find(&spec.value_column).ok_or_else(|| missing(&spec.value_column))?;

    let mut rows = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map_or(0, csv::Position::line);
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let malformed = |column: &str, value: &str| DatasetError::MalformedValue {
            table: label.to_string(),
            line,
            column: column.to_string(),
            value: value.to_string(),
        };

        let year_cell = cell(year_idx);
        let year = parse_year(year_cell).ok_or_else(|| malformed(&spec.year_column, year_cell))?;

        let value_cell = cell(value_idx);
        let value = parse_value(value_cell).map_err(|()| malformed(&spec.value_column, value_cell))?;

        let region = match region_idx {
            Some(idx) => {
                let region = cell(idx);
                if is_null(region) {
                    return Err(malformed(&spec.region_column, region));
                }
                Some(region.to_string())
            }
            None => None,
        };

        rows.push(TableRow {
            region,
            year,
            value,
        });
    }

    Ok(RawTable {
        label: label.to_string(),
        has_region: region_idx.is_some(),
        rows,
    })
}

fn is_null(cell: &str) -> bool {
    NULL_MARKERS.iter().any(|m| cell.eq_ignore_ascii_case(m))
}

/// Parses a numeric cell. Null markers yield `Ok(None)`; anything else
/// that is not a finite number is an error.
fn parse_value(cell: &str) -> Result<Option<f64>, ()> {
    if is_null(cell) {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

/// Parses a year cell, accepting integral floats such as `2015.0`.
#[allow(clippy::cast_possible_truncation)]
fn parse_year(cell: &str) -> Option<i32> {
    if let Ok(year) = cell.parse::<i32>() {
        return Some(year);
    }
    let value = cell.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value.abs() < f64::from(i32::MAX) {
        Some(value as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn spec(value_column: &str) -> TableSpec {
        TableSpec {
            file: PathBuf::from("test.csv"),
            region_column: "Region".to_string(),
            year_column: "Year".to_string(),
            value_column: value_column.to_string(),
        }
    }

    #[test]
    fn reads_keyed_rows_and_ignores_extra_columns() {
        let csv = "Region,Year,notes,tree_cover_ha\nCAR,2015,x,100.5\nCAR,2016,y,99\n";
        let table = read_table(csv.as_bytes(), &spec("tree_cover_ha"), b',', "tree", true).unwrap();
        assert!(table.has_region);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].region.as_deref(), Some("CAR"));
        assert_eq!(table.rows[0].year, 2015);
        assert_eq!(table.rows[1].value, Some(99.0));
    }

    #[test]
    fn null_markers_become_none() {
        let csv = "Region,Year,v\nA,2015,\nA,2016,NA\nA,2017,NaN\nA,2018,1.5\n";
        let table = read_table(csv.as_bytes(), &spec("v"), b',', "t", true).unwrap();
        let values: Vec<Option<f64>> = table.rows.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![None, None, None, Some(1.5)]);
    }

    #[test]
    fn region_less_table_is_accepted_when_optional() {
        let csv = "Year,Total_km\n2015,32000\n2016,32500\n";
        let table = read_table(csv.as_bytes(), &spec("Total_km"), b',', "roads", false).unwrap();
        assert!(!table.has_region);
        assert!(table.rows.iter().all(|r| r.region.is_none()));
    }

    #[test]
    fn missing_region_column_is_an_error_when_required() {
        let csv = "Year,v\n2015,1\n";
        let err = read_table(csv.as_bytes(), &spec("v"), b',', "tree", true).unwrap_err();
        assert!(
            matches!(&err, DatasetError::MissingColumn { column, .. } if column == "Region"),
            "{err}"
        );
    }

    #[test]
    fn missing_value_column_is_an_error() {
        let csv = "Region,Year,other\nA,2015,1\n";
        let err = read_table(csv.as_bytes(), &spec("v"), b',', "t", false).unwrap_err();
        assert!(
            matches!(&err, DatasetError::MissingColumn { column, .. } if column == "v"),
            "{err}"
        );
    }

    #[test]
    fn malformed_number_reports_line() {
        let csv = "Region,Year,v\nA,2015,1\nA,2016,abc\n";
        let err = read_table(csv.as_bytes(), &spec("v"), b',', "t", true).unwrap_err();
        assert!(
            matches!(&err, DatasetError::MalformedValue { line: 3, value, .. } if value == "abc"),
            "{err}"
        );
    }

    #[test]
    fn accepts_float_years_and_custom_delimiter() {
        let csv = "Region;Year;v\nA;2015.0;1\n";
        let table = read_table(csv.as_bytes(), &spec("v"), b';', "t", true).unwrap();
        assert_eq!(table.rows[0].year, 2015);
        assert!(read_table("Region,Year,v\nA,2015.5,1\n".as_bytes(), &spec("v"), b',', "t", true).is_err());
    }
}
