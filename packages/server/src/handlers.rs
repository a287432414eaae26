//! HTTP handler functions for the forestcast API.

use actix_web::{HttpResponse, web};
use forestcast_server_models::ApiHealth;
use serde_json::json;

use crate::AppState;

fn empty_list() -> HttpResponse {
    HttpResponse::Ok().json(json!([]))
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/status`
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.status())
}

/// `GET /api/drivers`
///
/// Driver coefficients and p-values for every region.
pub async fn drivers(state: web::Data<AppState>) -> HttpResponse {
    state
        .result()
        .map_or_else(empty_list, |r| HttpResponse::Ok().json(&r.drivers))
}

/// `GET /api/forecasts`
pub async fn forecasts(state: web::Data<AppState>) -> HttpResponse {
    state
        .result()
        .map_or_else(empty_list, |r| HttpResponse::Ok().json(&r.forecasts))
}

/// `GET /api/comparison`
///
/// Forecast-vs-actual rows for the years that have actuals.
pub async fn comparison(state: web::Data<AppState>) -> HttpResponse {
    state
        .result()
        .map_or_else(empty_list, |r| HttpResponse::Ok().json(&r.comparison))
}

/// `GET /api/regions`
pub async fn regions(state: web::Data<AppState>) -> HttpResponse {
    state
        .result()
        .map_or_else(empty_list, |r| HttpResponse::Ok().json(&r.regions))
}

/// `GET /api/overview`
///
/// The run summary, or `{}` while no result is available.
pub async fn overview(state: web::Data<AppState>) -> HttpResponse {
    state.result().map_or_else(
        || HttpResponse::Ok().json(json!({})),
        |r| HttpResponse::Ok().json(&r.summary),
    )
}

/// `GET /api/diagnostics`
///
/// Per-region failures of the run.
pub async fn diagnostics(state: web::Data<AppState>) -> HttpResponse {
    state
        .result()
        .map_or_else(empty_list, |r| HttpResponse::Ok().json(&r.failures))
}
