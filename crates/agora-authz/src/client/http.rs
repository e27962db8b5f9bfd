//! HTTP layer: status mapping and retry.
//!
//! This is the ONLY place for status code handling. client/mod.rs never
//! interprets status codes.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde_json::Value;
use tracing::warn;

use crate::error::{AuthzError, AuthzResult};

use super::helpers::error_excerpt;

/// Upper bound on a single retry backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(2);

/// HTTP backend for the policy endpoint (holds reqwest client, auth, limits).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
    pub(crate) token: Option<String>,
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u32,
}

impl HttpBackend {
    /// POST a JSON body and return the success response text, retrying
    /// transient failures.
    ///
    /// `timeout` bounds the whole call, retries and backoff included.
    pub(crate) async fn post_json(&self, body: &Value) -> AuthzResult<String> {
        match tokio::time::timeout(self.timeout, self.post_with_retries(body)).await {
            Ok(result) => result,
            Err(_) => Err(AuthzError::Timeout {
                timeout: self.timeout,
            }),
        }
    }

    async fn post_with_retries(&self, body: &Value) -> AuthzResult<String> {
        use rand::Rng;

        let mut retries = 0;

        loop {
            match self.post_once(body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;

                    let backoff = match &e {
                        AuthzError::RateLimited {
                            retry_after: Some(retry_after),
                        } => {
                            let base_ms = (*retry_after).min(MAX_BACKOFF).as_millis() as u64;
                            let jitter_factor: f64 =
                                rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
                            Duration::from_millis(((base_ms as f64) * jitter_factor).round() as u64)
                        }
                        _ => {
                            let base_backoff = Duration::from_millis(100 << retries.min(5));
                            let base_backoff = base_backoff.min(MAX_BACKOFF);
                            let jittered_ms =
                                rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
                            Duration::from_millis(jittered_ms.max(10))
                        }
                    };

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying policy request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, body: &Value) -> AuthzResult<String> {
        let mut request = self.client.post(&self.url).json(body);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        match status.as_u16() {
            200..=299 => response.text().await.map_err(|e| self.transport_error(e)),

            429 => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);

                Err(AuthzError::RateLimited { retry_after })
            }

            code => {
                let message = response
                    .text()
                    .await
                    .map(|body| error_excerpt(&body))
                    .unwrap_or_else(|_| status.to_string());
                Err(AuthzError::Status {
                    status: code,
                    message,
                })
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> AuthzError {
        match AuthzError::from(err) {
            AuthzError::Timeout { .. } => AuthzError::Timeout {
                timeout: self.timeout,
            },
            other => other,
        }
    }
}
