use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;

use reap_core::testutil::MockRunner;
use reap_server::routes;
use reap_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

/// Router with bearer auth enabled.
pub fn setup_test_app(runner: MockRunner) -> Router {
    routes::router(Arc::new(AppState::new(
        runner,
        Some(TEST_API_KEY.to_string()),
    )))
}

/// Router without an API key configured.
pub fn setup_test_app_no_auth(runner: MockRunner) -> Router {
    routes::router(Arc::new(AppState::new(runner, None)))
}

pub fn post_runs(token: Option<&str>) -> Request<Body> {
    let mut request = Request::post("/v1/runs");
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {token}"));
    }
    request.body(Body::empty()).unwrap()
}
