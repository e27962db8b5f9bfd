//! Authorizer configuration.
//!
//! Loaded from YAML, from the environment, or both (file first, then
//! environment overrides).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuthzError, AuthzResult};

/// Signature algorithm accepted for subject tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenAlgorithm {
    /// Shared secret.
    #[default]
    Hs256,
    /// RSA public key (PEM).
    Rs256,
}

/// Subject token verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub algorithm: TokenAlgorithm,

    /// HS256 shared secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// RS256 public key in PEM form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,

    /// Expected `iss` claim.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Accepted `aud` values; empty disables the audience check.
    #[serde(default)]
    pub audience: Vec<String>,

    /// Clock skew tolerated on `exp`/`nbf`, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            algorithm: TokenAlgorithm::default(),
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: Vec::new(),
            leeway_secs: default_leeway(),
        }
    }
}

/// Authorizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// Policy decision endpoint (OPA Data API document URL).
    #[serde(default = "default_policy_url")]
    pub policy_url: String,

    /// Bearer token sent to the policy endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_token: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries for transient policy endpoint failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Time-to-live of cached decisions in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached decisions.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,

    /// Maximum in-flight policy requests per batch.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_policy_url() -> String {
    "http://127.0.0.1:8181/v1/data/agora/authz/decision".to_string()
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_max_retries() -> u32 {
    1
}

fn default_cache_ttl() -> u64 {
    30
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_max_concurrency() -> usize {
    16
}

fn default_leeway() -> u64 {
    30
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            policy_url: default_policy_url(),
            policy_token: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            max_concurrency: default_max_concurrency(),
            identity: IdentityConfig::default(),
        }
    }
}

impl AuthzConfig {
    /// Load from a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> AuthzResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AuthzError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut config = Self::from_yaml(&text)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Parse from YAML text without consulting the environment.
    pub fn from_yaml(text: &str) -> AuthzResult<Self> {
        serde_yaml::from_str(text).map_err(|e| AuthzError::Config {
            message: format!("invalid config: {}", e),
        })
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> AuthzResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `AGORA_POLICY_URL` | `policy_url` |
    /// | `AGORA_POLICY_TOKEN` | `policy_token` |
    /// | `AGORA_POLICY_TIMEOUT_MS` | `timeout_ms` |
    /// | `AGORA_POLICY_MAX_RETRIES` | `max_retries` |
    /// | `AGORA_AUTHZ_CACHE_TTL_SECS` | `cache_ttl_secs` |
    /// | `AGORA_AUTHZ_CACHE_CAPACITY` | `cache_capacity` |
    /// | `AGORA_AUTHZ_MAX_CONCURRENCY` | `max_concurrency` |
    /// | `AGORA_JWT_SECRET` | `identity.secret` (selects HS256) |
    /// | `AGORA_JWT_PUBLIC_KEY_FILE` | `identity.public_key_pem` (selects RS256) |
    /// | `AGORA_JWT_ISSUER` | `identity.issuer` |
    /// | `AGORA_JWT_AUDIENCE` | `identity.audience` (comma separated) |
    pub fn apply_env(&mut self) -> AuthzResult<()> {
        if let Some(v) = env_string("AGORA_POLICY_URL") {
            self.policy_url = v;
        }
        if let Some(v) = env_string("AGORA_POLICY_TOKEN") {
            self.policy_token = Some(v);
        }
        if let Some(v) = env_parse("AGORA_POLICY_TIMEOUT_MS")? {
            self.timeout_ms = v;
        }
        if let Some(v) = env_parse("AGORA_POLICY_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = env_parse("AGORA_AUTHZ_CACHE_TTL_SECS")? {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("AGORA_AUTHZ_CACHE_CAPACITY")? {
            self.cache_capacity = v;
        }
        if let Some(v) = env_parse("AGORA_AUTHZ_MAX_CONCURRENCY")? {
            self.max_concurrency = v;
        }
        if let Some(v) = env_string("AGORA_JWT_SECRET") {
            self.identity.algorithm = TokenAlgorithm::Hs256;
            self.identity.secret = Some(v);
        }
        if let Some(path) = env_string("AGORA_JWT_PUBLIC_KEY_FILE") {
            let pem = std::fs::read_to_string(&path).map_err(|e| AuthzError::Config {
                message: format!("failed to read AGORA_JWT_PUBLIC_KEY_FILE {}: {}", path, e),
            })?;
            self.identity.algorithm = TokenAlgorithm::Rs256;
            self.identity.public_key_pem = Some(pem);
        }
        if let Some(v) = env_string("AGORA_JWT_ISSUER") {
            self.identity.issuer = Some(v);
        }
        if let Some(v) = env_string("AGORA_JWT_AUDIENCE") {
            self.identity.audience = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(())
    }

    /// Reject settings the authorizer cannot run with.
    pub fn validate(&self) -> AuthzResult<()> {
        let url = url::Url::parse(&self.policy_url).map_err(|e| AuthzError::Config {
            message: format!("invalid policy_url '{}': {}", self.policy_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AuthzError::Config {
                message: format!("policy_url must be http(s), got '{}'", url.scheme()),
            });
        }
        if self.timeout_ms == 0 {
            return Err(AuthzError::Config {
                message: "timeout_ms must be greater than zero".into(),
            });
        }
        if self.max_concurrency == 0 {
            return Err(AuthzError::Config {
                message: "max_concurrency must be greater than zero".into(),
            });
        }
        if self.cache_capacity == 0 {
            return Err(AuthzError::Config {
                message: "cache_capacity must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Copy with secrets replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.policy_token.is_some() {
            copy.policy_token = Some("<redacted>".into());
        }
        if copy.identity.secret.is_some() {
            copy.identity.secret = Some("<redacted>".into());
        }
        copy
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Set the policy endpoint.
    pub fn with_policy_url(mut self, url: impl Into<String>) -> Self {
        self.policy_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the decision TTL.
    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = secs;
        self
    }

    /// Set the HS256 secret used to verify subject tokens.
    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.identity.algorithm = TokenAlgorithm::Hs256;
        self.identity.secret = Some(secret.into());
        self
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> AuthzResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(v) => v.parse().map(Some).map_err(|e| AuthzError::Config {
            message: format!("{}='{}': {}", name, v, e),
        }),
        None => Ok(None),
    }
}
