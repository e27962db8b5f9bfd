use std::path::Path;

use agora_authz::{AuthzConfig, Authorizer, RequestContext};
use anyhow::Context;

use super::args::TokenArgs;

pub mod batch;
pub mod check;
pub mod config;
mod dispatch;

pub use dispatch::dispatch;

/// File config (when given) with environment overrides, or environment only.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<AuthzConfig> {
    let config = match path {
        Some(path) => AuthzConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AuthzConfig::from_env().context("failed to read config from environment")?,
    };
    config.validate()?;
    Ok(config)
}

pub(crate) fn build_authorizer(config: &AuthzConfig) -> anyhow::Result<Authorizer> {
    Authorizer::from_config(config).context("failed to initialize authorizer")
}

/// Subject token from `--token` or the variable named by `--token-env`.
///
/// A named but unset variable yields no token, which the authorizer denies.
pub(crate) fn resolve_token(args: &TokenArgs) -> Option<String> {
    if let Some(token) = &args.token {
        return Some(token.clone());
    }
    let var = args.token_env.as_deref()?;
    match std::env::var(var) {
        Ok(token) => Some(token),
        Err(_) => {
            tracing::warn!(var, "token variable not set");
            None
        }
    }
}

pub(crate) fn request_context(ip: Option<&str>) -> RequestContext {
    ip.map(RequestContext::with_ip).unwrap_or_default()
}
