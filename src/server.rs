use crate::error::ForecastError;
use crate::models::ForecastReport;
use crate::service::ForecastService;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Weather forecast</title></head>
<body>
  <form method="post" action="/forecast">
    <label for="city">City</label>
    <input id="city" name="city" type="text" required>
    <button type="submit">Forecast</button>
  </form>
</body>
</html>
"#;

#[derive(Clone)]
pub struct AppState {
    service: Arc<ForecastService>,
}

#[derive(Debug, Deserialize)]
pub struct CityInput {
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error_message: String,
}

pub fn router(service: Arc<ForecastService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/forecast", post(forecast_form))
        .route("/api/forecast", get(forecast_query))
        .with_state(AppState { service })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> &'static str {
    "ok"
}

async fn forecast_form(State(state): State<AppState>, Form(input): Form<CityInput>) -> Response {
    // Missing field deserializes to an empty city
    debug!("Form forecast request for '{}'", input.city);
    respond(state.service.forecast(&input.city).await)
}

async fn forecast_query(
    State(state): State<AppState>,
    Query(input): Query<CityInput>,
) -> Response {
    debug!("API forecast request for '{}'", input.city);
    respond(state.service.forecast(&input.city).await)
}

fn respond(result: Result<ForecastReport, ForecastError>) -> Response {
    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        // Errors carry only the user-facing message
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = ErrorBody {
                error_message: e.user_message(),
            };
            (status, Json(body)).into_response()
        }
    }
}
