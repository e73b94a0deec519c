//! HTTP surface of the service.
//!
//! One route, `GET /data`, taking the query as `car_marca`/`car_model`
//! parameters and returning the aggregated listings keyed by source
//! id. This layer is glue: it parses parameters, invokes the engine
//! once and maps its error surface onto status codes. Internal faults
//! are reported as a generic error body, never a raw error chain.

use axum::extract::{Query as HttpQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::engine::{AggregateError, Aggregator, Query};

/// Shared application state.
pub struct AppState {
    pub aggregator: Aggregator,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/data", get(get_data))
        .with_state(state)
}

/// Query parameters of `GET /data`, named after the observed surface.
#[derive(Debug, Deserialize)]
struct ListingParams {
    #[serde(default)]
    car_marca: Option<String>,
    #[serde(default)]
    car_model: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    empty_sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rounds: Option<u32>,
}

impl ErrorBody {
    fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            empty_sources: None,
            rounds: None,
        }
    }
}

async fn get_data(
    State(state): State<Arc<AppState>>,
    HttpQuery(params): HttpQuery<ListingParams>,
) -> Response {
    let Some(model) = params
        .car_model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::message("car_model is required")),
        )
            .into_response();
    };

    let mut query = Query::new(model);
    if let Some(brand) = params.car_marca {
        if !brand.trim().is_empty() {
            query = query.with_brand(brand.trim());
        }
    }

    match state.aggregator.run(&query, &CancellationToken::new()).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(AggregateError::InvalidQuery(reason)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::message(reason)),
        )
            .into_response(),
        Err(AggregateError::Incomplete {
            rounds,
            empty_sources,
        }) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(ErrorBody {
                error: "incomplete aggregation".to_string(),
                empty_sources: Some(empty_sources),
                rounds: Some(rounds),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "aggregation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::message("internal error")),
            )
                .into_response()
        }
    }
}
