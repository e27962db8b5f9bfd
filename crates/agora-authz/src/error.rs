//! Error types for the authorization layer.
//!
//! These never cross the public `Authorizer` entry points: every variant is
//! folded into a deny [`Decision`](crate::types::Decision) before it reaches a
//! route handler. They are surfaced directly only by the policy client, the
//! subject verifier and configuration loading.

use std::time::Duration;

/// Authorization errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Could not reach the policy endpoint.
    #[error("network error: {message}")]
    Network { message: String },

    /// Policy endpoint did not answer within the configured timeout.
    #[error("policy request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Policy endpoint answered with a non-success status.
    #[error("policy endpoint returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Policy endpoint is shedding load.
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Response body could not be turned into a decision.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Subject token failed verification.
    #[error("invalid token: {message}")]
    InvalidToken { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl AuthzError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::InvalidToken { .. } => 4,
            Self::Network { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => 5,
            Self::Status { .. } | Self::InvalidResponse { .. } => 6,
        }
    }

    /// Whether the error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AuthzError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured value; the client rewrites it.
            return Self::Timeout {
                timeout: Duration::ZERO,
            };
        }
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;
