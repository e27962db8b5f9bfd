//! Integration tests for HttpPolicyClient.
//!
//! Uses wiremock as the OPA Data API. Tests cover the request envelope,
//! headers, accepted response shapes, status mapping (429/5xx), timeouts and
//! retry behavior.

use std::time::Duration;

use agora_authz::{
    AuthzConfig, AuthzError, HttpPolicyClient, PolicyEngine, PolicyInput, RequestContext,
    Subject, POLICY_USER_AGENT,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DECISION_PATH: &str = "/v1/data/agora/authz/decision";

fn test_config(mock_server: &MockServer) -> AuthzConfig {
    AuthzConfig::default()
        .with_policy_url(format!("{}{}", mock_server.uri(), DECISION_PATH))
        .with_max_retries(0)
}

fn create_test_client(config: AuthzConfig) -> HttpPolicyClient {
    HttpPolicyClient::new(&config).expect("failed to create client")
}

fn sample_input() -> PolicyInput {
    PolicyInput::new(
        &Subject::new("u1"),
        "read_post",
        &json!({"type": "post", "id": "42"}),
        &RequestContext::with_ip("203.0.113.9"),
    )
}

#[tokio::test]
async fn test_evaluate_allow_with_result_wrapper() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"allow": true, "reason": "member", "obligations": ["log"]}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server));
    let result = client
        .evaluate(&sample_input())
        .await
        .expect("evaluate failed");

    assert!(result.allow);
    assert_eq!(result.reason.as_deref(), Some("member"));
    assert_eq!(result.payload["obligations"][0], "log");
}

#[tokio::test]
async fn test_evaluate_bare_boolean_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": false})))
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server));
    let result = client
        .evaluate(&sample_input())
        .await
        .expect("evaluate failed");

    assert!(!result.allow);
    assert_eq!(result.reason, None);
}

#[tokio::test]
async fn test_request_envelope_and_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .and(header("user-agent", POLICY_USER_AGENT))
        .and(header("authorization", "Bearer opa-token"))
        .and(body_partial_json(json!({
            "input": {
                "subjectId": "u1",
                "action": "read_post",
                "resource": {"type": "post", "id": "42"},
                "env": {"ip": "203.0.113.9"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"allow": true}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(&mock_server);
    config.policy_token = Some("opa-token".to_string());
    let client = create_test_client(config);

    let result = client
        .evaluate(&sample_input())
        .await
        .expect("evaluate failed");
    assert!(result.allow);
}

#[tokio::test]
async fn test_undefined_decision_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server));
    let result = client.evaluate(&sample_input()).await;

    assert!(matches!(result, Err(AuthzError::InvalidResponse { .. })));
}

#[tokio::test]
async fn test_malformed_body_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server));
    let result = client.evaluate(&sample_input()).await;

    assert!(matches!(result, Err(AuthzError::InvalidResponse { .. })));
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("policy compile error"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server));
    let result = client.evaluate(&sample_input()).await;

    match result {
        Err(AuthzError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("policy compile error"));
        }
        other => panic!("expected Status, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server).with_max_retries(3));
    let result = client.evaluate(&sample_input()).await;

    assert!(matches!(result, Err(AuthzError::Status { status: 400, .. })));
}

#[tokio::test]
async fn test_rate_limited_with_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server));
    let result = client.evaluate(&sample_input()).await;

    match result {
        Err(AuthzError::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(Duration::from_secs(7)));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": {"allow": true}}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server).with_timeout(Duration::from_millis(200));
    let client = create_test_client(config);
    let result = client.evaluate(&sample_input()).await;

    match result {
        Err(AuthzError::Timeout { timeout }) => {
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_bounds_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": {"allow": true}}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let config = AuthzConfig::default()
        .with_policy_url(format!("{}{}", mock_server.uri(), DECISION_PATH))
        .with_timeout(Duration::from_millis(500));
    let client = create_test_client(config);

    let started = std::time::Instant::now();
    let result = client.evaluate(&sample_input()).await;
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(AuthzError::Timeout { timeout }) if timeout == Duration::from_millis(500))
    );
    assert!(elapsed < Duration::from_millis(800), "took {elapsed:?}");
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_retry_on_503_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"allow": true}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server).with_max_retries(1));
    let result = client
        .evaluate(&sample_input())
        .await
        .expect("retry should succeed");

    assert!(result.allow);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(DECISION_PATH))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_test_client(test_config(&mock_server).with_max_retries(2));
    let result = client.evaluate(&sample_input()).await;

    assert!(matches!(result, Err(AuthzError::Status { status: 502, .. })));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let config = AuthzConfig::default()
        .with_policy_url("http://127.0.0.1:1/v1/data/agora/authz/decision")
        .with_max_retries(0);
    let client = create_test_client(config);

    let result = client.evaluate(&sample_input()).await;
    assert!(matches!(result, Err(AuthzError::Network { .. })));
}

#[test]
fn test_invalid_policy_url_rejected() {
    let config = AuthzConfig::default().with_policy_url("ftp://opa.internal/decision");
    let result = HttpPolicyClient::new(&config);
    assert!(matches!(result, Err(AuthzError::Config { .. })));
}
