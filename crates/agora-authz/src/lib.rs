//! Authorization decision cache and batcher for the Agora forum backend.
//!
//! Route handlers ask whether a caller may perform an action on a resource.
//! This crate answers through an external policy engine (OPA), providing:
//!
//! - Subject token verification (JWT, HS256 or RS256)
//! - A time-bounded in-process decision cache keyed by (subject, action, resource)
//! - Concurrent batch evaluation with per-item fault isolation
//! - Fail-closed semantics: every error resolves to a deny
//!
//! # Quick Start
//!
//! ```no_run
//! use agora_authz::{AuthzConfig, Authorizer, RequestContext};
//! use serde_json::json;
//!
//! # async fn example(token: Option<&str>) -> anyhow::Result<()> {
//! let authz = Authorizer::from_config(&AuthzConfig::from_env()?)?;
//!
//! let outcome = authz
//!     .authorize(
//!         token,
//!         "read_post",
//!         &json!({"type": "post", "id": "42"}),
//!         &RequestContext::with_ip("203.0.113.9"),
//!     )
//!     .await;
//! if !outcome.allow {
//!     // map to 403
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `AGORA_POLICY_URL` | Policy decision URL (default: `http://127.0.0.1:8181/v1/data/agora/authz/decision`) |
//! | `AGORA_POLICY_TOKEN` | Bearer token for the policy endpoint |
//! | `AGORA_POLICY_TIMEOUT_MS` | Request timeout in milliseconds (default: 2000) |
//! | `AGORA_POLICY_MAX_RETRIES` | Retries for transient failures (default: 1) |
//! | `AGORA_AUTHZ_CACHE_TTL_SECS` | Decision TTL in seconds (default: 30) |
//! | `AGORA_AUTHZ_CACHE_CAPACITY` | Maximum cached decisions (default: 10000) |
//! | `AGORA_AUTHZ_MAX_CONCURRENCY` | In-flight policy requests per batch (default: 16) |
//! | `AGORA_JWT_SECRET` | HS256 secret for subject tokens |
//! | `AGORA_JWT_PUBLIC_KEY_FILE` | RS256 public key (PEM file) for subject tokens |
//! | `AGORA_JWT_ISSUER` | Expected token issuer |
//! | `AGORA_JWT_AUDIENCE` | Accepted audiences, comma separated |
//!
//! # Caching trade-off
//!
//! Request context (client IP, time) is sent to the policy engine but is not
//! part of the cache key. A policy that depends on context can therefore
//! return a stale decision for up to one TTL.

pub mod authorizer;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod key;
pub mod types;

// Re-export main types
pub use authorizer::{Authorizer, DEFAULT_MAX_CONCURRENCY};
pub use cache::{CacheStats, DecisionCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use client::{HttpPolicyClient, PolicyEngine, POLICY_USER_AGENT};
pub use config::{AuthzConfig, IdentityConfig, TokenAlgorithm};
pub use error::{AuthzError, AuthzResult};
pub use identity::{JwtVerifier, SubjectVerifier};
pub use key::cache_key;
pub use types::{
    all_allowed, any_allowed, AuthzOutcome, BatchDecision, BatchItem, CheckKey, Decision,
    PolicyEnv, PolicyInput, PolicyResult, RequestContext, Subject, EVALUATION_ERROR_PREFIX,
    INVALID_TOKEN_PREFIX, REASON_NO_TOKEN,
};
