//! API routes.
//!
//! Three data endpoints plus a health check. Handlers only read from the
//! datasets loaded at startup; a dataset that failed to load answers with a
//! fixed 500 payload without affecting the other endpoints. Clients always
//! receive valid JSON, either the data or a one-key error object.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use crate::data::cleaner::CleanedSeries;
use crate::data::events::EventRecord;
use crate::model::summary::ChangePointSummary;

/// Immutable datasets loaded once at process start. `None` marks a dataset
/// whose backing artifact failed to load.
#[derive(Debug, Default)]
pub struct ApiDatasets {
    pub prices: Option<CleanedSeries>,
    pub events: Option<Vec<EventRecord>>,
    pub changepoint: Option<ChangePointSummary>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    datasets: Arc<ApiDatasets>,
}

/// Create the API router
pub fn create_router(datasets: Arc<ApiDatasets>) -> Router {
    let state = AppState { datasets };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/data/prices", get(get_price_data))
        .route("/api/data/events", get(get_event_data))
        .route("/api/model/changepoint", get(get_changepoint_results))
        .with_state(state)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Cleaned price series, ordered by date
async fn get_price_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<PricePointDto>>, ApiError> {
    let series = state
        .datasets
        .prices
        .as_ref()
        .ok_or(ApiError::Unavailable("Data not available."))?;

    let body = series
        .rows()
        .iter()
        .map(|row| PricePointDto { date: row.date, price: row.price })
        .collect();
    Ok(Json(body))
}

/// Event annotations for contextual display
async fn get_event_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventRecord>>, ApiError> {
    let events = state
        .datasets
        .events
        .as_ref()
        .ok_or(ApiError::Unavailable("Event data not available."))?;
    Ok(Json(events.clone()))
}

/// Posterior summary of the volatility change point
async fn get_changepoint_results(
    State(state): State<AppState>,
) -> Result<Json<ChangePointSummary>, ApiError> {
    let summary = state
        .datasets
        .changepoint
        .as_ref()
        .ok_or(ApiError::Unavailable("Model results not available."))?;
    Ok(Json(summary.clone()))
}

// ===== Response Types =====

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct PricePointDto {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Price")]
    price: f64,
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    /// Backing dataset failed to load at startup; payload text is fixed
    /// per endpoint.
    Unavailable(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Unavailable(message) = self;
        let body = Json(json!({
            "error": message,
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
