//! Log output of a finished pipeline run.

use forestcast_models::{ComparisonRow, DriverEstimate, ForecastPoint, Summary};
use forestcast_pipeline::PipelineResult;

/// Rows shown per table.
const PREVIEW_ROWS: usize = 10;

fn driver_lines(rows: &[DriverEstimate]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<16} {:<14} {:>14} {:>10}",
        "Region", "Driver", "Coefficient", "P-value"
    )];
    lines.extend(rows.iter().take(PREVIEW_ROWS).map(|r| {
        format!(
            "{:<16} {:<14} {:>14.4} {:>10.4}",
            r.region,
            r.driver.to_string(),
            r.coefficient,
            r.p_value
        )
    }));
    lines
}

fn forecast_lines(rows: &[ForecastPoint]) -> Vec<String> {
    let mut lines = vec![format!("{:<16} {:>6} {:>14}", "Region", "Year", "Forecast")];
    lines.extend(
        rows.iter()
            .take(PREVIEW_ROWS)
            .map(|r| format!("{:<16} {:>6} {:>14.2}", r.region, r.year, r.forecast)),
    );
    lines
}

fn comparison_lines(rows: &[ComparisonRow]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<16} {:>6} {:>14} {:>14} {:>12} {:>8}",
        "Region", "Year", "Actual", "Forecast", "AE", "APE"
    )];
    lines.extend(rows.iter().take(PREVIEW_ROWS).map(|r| {
        format!(
            "{:<16} {:>6} {:>14.2} {:>14.2} {:>12.2} {:>7.2}%",
            r.region, r.year, r.actual, r.forecast, r.ae, r.ape
        )
    }));
    lines
}

fn metric_lines(summary: &Summary) -> Vec<String> {
    match (summary.overall_mae, summary.overall_mape) {
        (Some(mae), Some(mape)) => vec![
            format!("Overall MAE: {mae:.4}"),
            format!("Overall MAPE: {mape:.4}%"),
        ],
        _ => vec!["Overall MAE/MAPE: undefined (no forecast matched an actual)".to_string()],
    }
}

fn log_table(title: &str, total: usize, lines: &[String]) {
    if total > PREVIEW_ROWS {
        log::info!("{title} (first {PREVIEW_ROWS} of {total}):");
    } else {
        log::info!("{title} ({total}):");
    }
    for line in lines {
        log::info!("  {line}");
    }
}

/// Logs table previews, the overall metrics and every region failure.
pub fn log_report(result: &PipelineResult) {
    log_table(
        "Driver estimates",
        result.drivers.len(),
        &driver_lines(&result.drivers),
    );
    log_table(
        "Forecasts",
        result.forecasts.len(),
        &forecast_lines(&result.forecasts),
    );
    log_table(
        "Comparison",
        result.comparison.len(),
        &comparison_lines(&result.comparison),
    );

    for line in metric_lines(&result.summary) {
        log::info!("{line}");
    }

    if result.failures.is_empty() {
        log::info!(
            "All {} regions completed every stage",
            result.summary.total_regions
        );
    } else {
        log::warn!("{} region failures:", result.failures.len());
        for failure in &result.failures {
            log::warn!("  {failure}");
        }
    }
}

#[cfg(test)]
mod tests {
    use forestcast_models::Driver;

    use super::*;

    #[test]
    fn previews_are_capped() {
        let rows: Vec<ForecastPoint> = (0..25)
            .map(|i| ForecastPoint {
                region: format!("R{i}"),
                year: 2021,
                forecast: 1.0,
            })
            .collect();
        let lines = forecast_lines(&rows);
        assert_eq!(lines.len(), PREVIEW_ROWS + 1);
        assert!(lines[0].starts_with("Region"));
        assert!(lines[1].starts_with("R0 "));
    }

    #[test]
    fn driver_rows_use_column_names() {
        let lines = driver_lines(&[DriverEstimate {
            region: "CAR".to_string(),
            driver: Driver::RoadsKm,
            coefficient: -0.5,
            p_value: 0.25,
        }]);
        assert!(lines[1].contains("Roads_km"), "{}", lines[1]);
        assert!(lines[1].contains("-0.5000"));
    }

    #[test]
    fn undefined_metrics_are_reported() {
        let summary = Summary {
            overall_mae: None,
            overall_mape: None,
            total_regions: 3,
            forecast_years: vec![2021],
        };
        assert_eq!(metric_lines(&summary).len(), 1);

        let defined = Summary {
            overall_mae: Some(2.0),
            overall_mape: Some(1.5),
            ..summary
        };
        assert_eq!(
            metric_lines(&defined),
            vec!["Overall MAE: 2.0000", "Overall MAPE: 1.5000%"]
        );
    }
}
