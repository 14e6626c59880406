use std::sync::Arc;

use alloy::primitives::{Address, U256};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use contract_client::mock::{application_record, job_record, submission_record, MockChain};
use gateway::api::{self, OwnerResponse, SettingsResponse};
use gateway::config::GatewayConfig;
use gateway::AppState;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

fn poster() -> Address {
    Address::repeat_byte(0x11)
}

fn freelancer() -> Address {
    Address::repeat_byte(0x22)
}

fn app(chain: &Arc<MockChain>) -> Router {
    let state = Arc::new(AppState::new(chain.clone(), GatewayConfig::default()));
    api::router(state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn marketplace() -> Arc<MockChain> {
    let chain = Arc::new(MockChain::new().with_head(2_000));
    chain.add_job(1, job_record(poster(), "Logo", U256::from(ONE_ETHER)), 100);
    chain.add_application(application_record(5, 1, freelancer(), "I design logos"), 200);
    chain.add_submission(9, submission_record(1, freelancer(), "logo.svg"), 300);
    chain
}

#[tokio::test]
async fn health_check() {
    let chain = Arc::new(MockChain::new());
    let (status, body) = get(app(&chain), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn job_lookup_renders_reward() {
    let chain = marketplace();
    let (status, job) = get_json(app(&chain), "/jobs/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["title"], "Logo");
    assert_eq!(job["reward_eth"], "1.0000");
    assert_eq!(job["status_label"], "Open");
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let chain = marketplace();
    let (status, _) = get(app(&chain), "/jobs/42").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_id_is_bad_request() {
    let chain = marketplace();
    let (status, _) = get(app(&chain), "/jobs/abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_reports_scan_status() {
    let chain = marketplace();
    let (status, listing) = get_json(app(&chain), "/jobs").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["status"], "Idle");
    assert_eq!(listing["jobs"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn applications_and_submission_for_job() {
    let chain = marketplace();

    let (status, applications) = get_json(app(&chain), "/jobs/1/applications").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applications[0]["job_title"], "Logo");
    assert_eq!(applications[0]["proposal"], "I design logos");

    let (status, submission) = get_json(app(&chain), "/jobs/1/submission").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(submission["id"], 9);
    assert_eq!(submission["verification"], "Pending");
}

#[tokio::test]
async fn user_routes_filter_by_address() {
    let chain = marketplace();
    let user = freelancer().to_string();

    let (status, applications) =
        get_json(app(&chain), &format!("/users/{user}/applications")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(applications.as_array().unwrap().len(), 1);

    let (_, submissions) = get_json(app(&chain), &format!("/users/{user}/submissions")).await;
    assert_eq!(submissions.as_array().unwrap().len(), 1);

    let (_, verified) =
        get_json(app(&chain), &format!("/users/{user}/submissions?verified=true")).await;
    assert!(verified.as_array().unwrap().is_empty());

    let (_, posted) = get_json(app(&chain), &format!("/users/{user}/jobs")).await;
    assert!(posted.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_address_is_bad_request() {
    let chain = marketplace();
    let (status, _) = get(app(&chain), "/users/not-an-address/jobs").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chain_outage_maps_to_bad_gateway() {
    let chain = marketplace();
    chain.fail_head();
    let user = poster().to_string();

    let (status, body) = get(app(&chain), &format!("/users/{user}/jobs")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(String::from_utf8(body).unwrap().contains("connection refused"));
}

#[tokio::test]
async fn settings_use_fallbacks() {
    let chain = marketplace();
    chain.set_ai_release_bps(8_000);

    let (status, body) = get(app(&chain), "/settings").await;
    let settings: SettingsResponse = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings.platform_fee, 2.5);
    assert_eq!(settings.ai_release_percentage, 80.0);
}

#[tokio::test]
async fn owner_check_ignores_case() {
    let chain = marketplace();
    let owner = Address::repeat_byte(0xab);
    chain.set_owner(owner);

    let upper = format!("0x{}", "AB".repeat(20));
    let (status, body) = get(app(&chain), &format!("/owner/{upper}")).await;
    let response: OwnerResponse = serde_json::from_slice(&body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(response.is_owner);
    assert_eq!(response.address, owner);
}
