use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{dispatch, Authorizer};
use crate::key::cache_key;
use crate::types::{BatchDecision, BatchItem, CheckKey, Decision, PolicyInput, RequestContext, Subject};

/// Scatter cache misses over a JoinSet and gather answers into
/// index-addressed slots.
pub(crate) async fn check_batch_impl(
    authorizer: &Authorizer,
    subject: &Subject,
    items: &[BatchItem],
    ctx: &RequestContext,
) -> Vec<BatchDecision> {
    let mut slots: Vec<Option<Decision>> = vec![None; items.len()];
    let mut misses = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let key = cache_key(&subject.id, &item.action, &item.resource);
        match authorizer.cache.get(&key) {
            Some(decision) => slots[index] = Some(decision),
            None => misses.push((index, key, item.clone())),
        }
    }

    debug!(
        subject = %subject.id,
        total = items.len(),
        cached = items.len() - misses.len(),
        dispatched = misses.len(),
        "authorization batch"
    );

    if !misses.is_empty() {
        let sem = Arc::new(Semaphore::new(authorizer.max_concurrency));
        let subject = Arc::new(subject.clone());
        let ctx = Arc::new(ctx.clone());
        let mut join_set = JoinSet::new();

        for (index, key, item) in misses {
            let engine = Arc::clone(&authorizer.engine);
            let cache = authorizer.cache.clone();
            let sem = Arc::clone(&sem);
            let subject = Arc::clone(&subject);
            let ctx = Arc::clone(&ctx);
            join_set.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let _permit = sem.acquire_owned().await.ok();
                // Built once the permit is held so env.now is the dispatch time.
                let input = PolicyInput::new(&subject, &item.action, &item.resource, &ctx);
                let decision = dispatch::resolve_miss(engine.as_ref(), &cache, key, input).await;
                (index, decision)
            });
        }

        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((index, decision)) => slots[index] = Some(decision),
                // Its slot stays empty and is filled with a deny below.
                Err(e) => warn!(event = "policy_task_failed", error = %e, "batch item lost"),
            }
        }
    }

    slots
        .into_iter()
        .zip(items)
        .enumerate()
        .map(|(index, (slot, item))| {
            let decision = slot.unwrap_or_else(|| {
                let check = CheckKey {
                    subject_id: subject.id.clone(),
                    action: item.action.clone(),
                    resource: item.resource.clone(),
                };
                Decision::evaluation_error(check, "policy task aborted")
            });
            BatchDecision {
                index,
                allow: decision.allow,
                decision,
            }
        })
        .collect()
}
