use anyhow::Result;
use axum::body::Body;
use axum::http::{self, Request};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use ec2gw::{config::Config, router, AppState};
use http_body_util::BodyExt as _;
use wiremock::MockServer;

pub const TEST_ACCOUNT: &str = "acc-test";

#[allow(dead_code)]
pub fn test_config(backend_url: &str, api_key: Option<&str>) -> Config {
    Config {
        log_level: "info".to_string(),
        address: "127.0.0.1:0".to_string(),
        api_key: api_key.map(str::to_string),
        backend_url: backend_url.to_string(),
        backend_token: None,
        account_acronym: "csi".to_string(),
        poll_interval_secs: 0,
        task_timeout_secs: 2,
        provision_timeout_secs: 2,
    }
}

#[allow(dead_code)]
pub async fn setup_app() -> Result<(MockServer, AppState, Router)> {
    let backend = MockServer::start().await;
    let state = AppState::new(test_config(&backend.uri(), None))?;
    let app = router::create_router(state.clone());
    Ok((backend, state, app))
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .header("x-account-id", TEST_ACCOUNT)
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

#[allow(dead_code)]
pub async fn read_body(response: Response) -> Result<Bytes> {
    let collected = response.into_body().collect().await?;
    Ok(collected.to_bytes())
}

#[allow(dead_code)]
pub async fn read_json(response: Response) -> Result<serde_json::Value> {
    let body = read_body(response).await?;
    Ok(serde_json::from_slice(&body)?)
}
