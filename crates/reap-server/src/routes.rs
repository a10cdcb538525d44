use std::sync::Arc;

use axum::extract::State;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};

use reap_core::{Runner, invoke};

use crate::auth::require_api_key;
use crate::dto::{HealthResponse, RunResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router<R: Runner + 'static>(state: Arc<AppState<R>>) -> Router {
    let api = Router::new()
        .route("/v1/runs", post(trigger_run::<R>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key::<R>,
        ));

    let public = Router::new().route("/health", get(health));

    public.merge(api).with_state(state)
}

/// Run one crawl and report whether it succeeded. Failures are a
/// `{"success": false}` body, not an error status.
pub async fn trigger_run<R: Runner + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<Json<RunResponse>, ApiError> {
    let Some(_slot) = state.try_begin_run() else {
        tracing::warn!("Rejected run request: a run is already in progress");
        return Err(ApiError::RunInProgress);
    };

    let outcome = invoke(&state.runner).await;
    Ok(Json(outcome.into()))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}
