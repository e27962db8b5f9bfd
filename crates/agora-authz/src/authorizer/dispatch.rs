use tracing::warn;

use crate::cache::DecisionCache;
use crate::client::PolicyEngine;
use crate::types::{Decision, PolicyInput};

/// Query the engine for a cache miss and store a successful answer.
///
/// Failures are logged and turned into an evaluation-error deny, which is
/// not cached.
pub(crate) async fn resolve_miss(
    engine: &dyn PolicyEngine,
    cache: &DecisionCache,
    key: String,
    input: PolicyInput,
) -> Decision {
    let check = input.check_key();
    match engine.evaluate(&input).await {
        Ok(result) => {
            let decision = Decision::from_policy(check, result);
            cache.insert(key, decision.clone());
            decision
        }
        Err(e) => {
            warn!(
                event = "policy_evaluation_failed",
                error = %e,
                subject = %input.subject_id,
                action = %input.action,
                "denying request"
            );
            Decision::evaluation_error(check, e)
        }
    }
}
