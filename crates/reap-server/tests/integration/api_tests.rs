use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use reap_core::AppError;
use reap_core::testutil::MockRunner;

use crate::integration::common::{TEST_API_KEY, post_runs, setup_test_app, setup_test_app_no_auth};

async fn json_body(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app(MockRunner::succeeding());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn successful_run_reports_success() {
    let runner = MockRunner::succeeding();
    let app = setup_test_app(runner.clone());

    let response = app.oneshot(post_runs(Some(TEST_API_KEY))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"success": true}));
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn failed_run_reports_failure_with_200() {
    let runner = MockRunner::failing(AppError::NavigationError("listing unreachable".into()));
    let app = setup_test_app(runner.clone());

    let response = app.oneshot(post_runs(Some(TEST_API_KEY))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"success": false}));
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let runner = MockRunner::succeeding();
    let app = setup_test_app(runner.clone());

    let response = app.oneshot(post_runs(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let runner = MockRunner::succeeding();
    let app = setup_test_app(runner.clone());

    let response = app.oneshot(post_runs(Some("wrong-key"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn health_does_not_require_auth() {
    let app = setup_test_app(MockRunner::succeeding());

    let response = app
        .oneshot(
            Request::get("/health")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn no_api_key_configured_allows_runs() {
    let runner = MockRunner::succeeding();
    let app = setup_test_app_no_auth(runner.clone());

    let response = app.oneshot(post_runs(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn concurrent_run_returns_409() {
    let runner = MockRunner::gated();
    let app = setup_test_app_no_auth(runner.clone());

    let first = tokio::spawn(app.clone().oneshot(post_runs(None)));
    runner.wait_started().await;

    let second = app.clone().oneshot(post_runs(None)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(second).await["error"], "run_in_progress");

    runner.release();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(runner.calls(), 1);

    // The slot is free again once the first run finished.
    runner.release();
    let third = app.oneshot(post_runs(None)).await.unwrap();
    assert_eq!(third.status(), StatusCode::OK);
    assert_eq!(runner.calls(), 2);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = setup_test_app_no_auth(MockRunner::succeeding());

    let response = app
        .oneshot(Request::get("/v1/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
