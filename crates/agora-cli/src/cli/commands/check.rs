use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use super::{build_authorizer, load_config, request_context, resolve_token};
use crate::cli::args::CheckArgs;
use crate::exit_codes;

pub async fn run(args: CheckArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let resource: Value = serde_json::from_str(&args.resource)
        .with_context(|| format!("--resource is not valid JSON: {}", args.resource))?;

    let config = load_config(config_path)?;
    let authz = build_authorizer(&config)?;
    let token = resolve_token(&args.token);
    let ctx = request_context(args.ip.as_deref());

    let outcome = authz
        .authorize(token.as_deref(), &args.action, &resource, &ctx)
        .await;

    tracing::info!(
        action = %args.action,
        allow = outcome.allow,
        reason = outcome.decision.reason.as_deref().unwrap_or(""),
        "check finished"
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(exit_codes::for_verdict(outcome.allow))
}
