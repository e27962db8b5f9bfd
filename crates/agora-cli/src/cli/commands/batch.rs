use std::io::Read;
use std::path::Path;

use agora_authz::{all_allowed, any_allowed, BatchDecision, BatchItem, CacheStats};
use anyhow::Context;
use serde::Serialize;

use super::{build_authorizer, load_config, request_context, resolve_token};
use crate::cli::args::{BatchArgs, BatchMode};
use crate::exit_codes;

#[derive(Serialize)]
struct BatchReport<'a> {
    mode: &'static str,
    allow: bool,
    decisions: &'a [BatchDecision],
}

pub async fn run(args: BatchArgs, config_path: Option<&Path>) -> anyhow::Result<i32> {
    let items = read_items(&args.file)?;

    let config = load_config(config_path)?;
    let authz = build_authorizer(&config)?;
    let token = resolve_token(&args.token);
    let ctx = request_context(args.ip.as_deref());

    let decisions = authz.authorize_batch(token.as_deref(), &items, &ctx).await;
    let allow = reduce(args.mode, &decisions);

    let summary = BatchSummary::new(&decisions, &authz.cache_stats());
    tracing::info!(
        items = summary.items,
        allowed = summary.allowed,
        cache_misses = summary.cache_misses,
        allow,
        "batch finished"
    );

    match args.mode {
        BatchMode::List => println!("{}", serde_json::to_string_pretty(&decisions)?),
        BatchMode::All | BatchMode::Any => {
            let report = BatchReport {
                mode: if args.mode == BatchMode::All { "all" } else { "any" },
                allow,
                decisions: &decisions,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(exit_codes::for_verdict(allow))
}

/// Counters logged when a batch finishes.
#[derive(Debug, PartialEq, Eq)]
struct BatchSummary {
    items: usize,
    allowed: usize,
    /// Lookups that missed the cache. Retries and failed calls are not counted.
    cache_misses: u64,
}

impl BatchSummary {
    fn new(decisions: &[BatchDecision], stats: &CacheStats) -> Self {
        Self {
            items: decisions.len(),
            allowed: decisions.iter().filter(|d| d.allow).count(),
            cache_misses: stats.misses,
        }
    }
}

/// Verdict for the selected mode. `list` succeeds only when every item is allowed.
fn reduce(mode: BatchMode, decisions: &[BatchDecision]) -> bool {
    match mode {
        BatchMode::List | BatchMode::All => all_allowed(decisions),
        BatchMode::Any => any_allowed(decisions),
    }
}

fn read_items(path: &Path) -> anyhow::Result<Vec<BatchItem>> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read batch items from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };
    parse_items(&text)
}

fn parse_items(text: &str) -> anyhow::Result<Vec<BatchItem>> {
    serde_json::from_str(text)
        .context("batch file must be a JSON array of {\"action\", \"resource\"} objects")
}
