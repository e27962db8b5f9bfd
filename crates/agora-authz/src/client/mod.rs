//! Policy engine client.
//!
//! Public API: no status code knowledge. All HTTP/status mapping in http.rs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::config::AuthzConfig;
use crate::error::{AuthzError, AuthzResult};
use crate::types::{PolicyInput, PolicyResult};

mod helpers;
mod http;

use helpers::parse_decision_body;
use http::HttpBackend;

/// User agent sent with every policy request.
pub const POLICY_USER_AGENT: &str = concat!("agora-authz/", env!("CARGO_PKG_VERSION"));

/// Evaluates one policy input.
///
/// Errors are returned as-is; turning them into denies is the
/// authorizer's job.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    async fn evaluate(&self, input: &PolicyInput) -> AuthzResult<PolicyResult>;
}

/// Client for an OPA-compatible decision endpoint.
///
/// Sends `POST {policy_url}` with `{"input": <PolicyInput>}`.
#[derive(Debug, Clone)]
pub struct HttpPolicyClient {
    http: HttpBackend,
}

impl HttpPolicyClient {
    pub fn new(config: &AuthzConfig) -> AuthzResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(POLICY_USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthzError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend {
                client,
                url: config.policy_url.clone(),
                token: config.policy_token.clone(),
                timeout: config.timeout(),
                max_retries: config.max_retries,
            },
        })
    }

    pub fn from_env() -> AuthzResult<Self> {
        Self::new(&AuthzConfig::from_env()?)
    }

    pub fn policy_url(&self) -> &str {
        &self.http.url
    }
}

#[async_trait]
impl PolicyEngine for HttpPolicyClient {
    async fn evaluate(&self, input: &PolicyInput) -> AuthzResult<PolicyResult> {
        debug!(
            url = %self.http.url,
            subject = %input.subject_id,
            action = %input.action,
            "querying policy endpoint"
        );

        let body = serde_json::json!({ "input": input });
        let text = self.http.post_json(&body).await?;
        parse_decision_body(&text)
    }
}
