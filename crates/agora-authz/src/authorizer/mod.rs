//! Authorization facade used by route handlers.
//!
//! Flow for one check:
//! 1. Resolve the subject token (absent ⇒ `no-token`, invalid ⇒ `invalid-token: …`)
//! 2. Derive the cache key from (subject, action, resource)
//! 3. Serve a live cached decision, or query the policy engine
//! 4. Cache successful evaluations; failed ones become an uncached deny
//!
//! No entry point returns an error: every failure resolves to `allow = false`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheStats, DecisionCache};
use crate::client::{HttpPolicyClient, PolicyEngine};
use crate::config::AuthzConfig;
use crate::error::AuthzResult;
use crate::identity::{JwtVerifier, SubjectVerifier};
use crate::key::cache_key;
use crate::types::{
    all_allowed, any_allowed, AuthzOutcome, BatchDecision, BatchItem, CheckKey, Decision,
    PolicyInput, RequestContext, Subject, INVALID_TOKEN_PREFIX, REASON_NO_TOKEN,
};

mod batch;
mod dispatch;


/// Default bound on concurrent policy requests within one batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Caching, batching front for the policy engine.
pub struct Authorizer {
    engine: Arc<dyn PolicyEngine>,
    verifier: Arc<dyn SubjectVerifier>,
    cache: DecisionCache,
    max_concurrency: usize,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("cache", &self.cache)
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    pub fn new(
        engine: Arc<dyn PolicyEngine>,
        verifier: Arc<dyn SubjectVerifier>,
        cache: DecisionCache,
    ) -> Self {
        Self {
            engine,
            verifier,
            cache,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Wire up the HTTP policy client, JWT verifier and cache from configuration.
    pub fn from_config(config: &AuthzConfig) -> AuthzResult<Self> {
        let engine = HttpPolicyClient::new(config)?;
        let verifier = JwtVerifier::from_config(&config.identity)?;
        let cache = DecisionCache::new(config.cache_capacity, config.cache_ttl());
        Ok(Self::new(Arc::new(engine), Arc::new(verifier), cache)
            .with_max_concurrency(config.max_concurrency))
    }

    /// Bound the number of in-flight policy requests per batch (minimum 1).
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Authorize one action for the holder of `subject_token`.
    pub async fn authorize(
        &self,
        subject_token: Option<&str>,
        action: &str,
        resource: &Value,
        ctx: &RequestContext,
    ) -> AuthzOutcome {
        match self.resolve_subject(subject_token).await {
            Ok(subject) => {
                let decision = self.check(&subject, action, resource, ctx).await;
                AuthzOutcome {
                    allow: decision.allow,
                    decision,
                    subject_id: Some(subject.id),
                    claims: Some(subject.claims),
                }
            }
            Err(reason) => {
                let decision = Decision::deny(anonymous_check(action, resource), reason);
                AuthzOutcome {
                    allow: false,
                    decision,
                    subject_id: None,
                    claims: None,
                }
            }
        }
    }

    /// Evaluate one action for an already verified subject.
    pub async fn check(
        &self,
        subject: &Subject,
        action: &str,
        resource: &Value,
        ctx: &RequestContext,
    ) -> Decision {
        let key = cache_key(&subject.id, action, resource);
        if let Some(decision) = self.cache.get(&key) {
            debug!(subject = %subject.id, action, cached = true, "authorization decision");
            return decision;
        }

        let input = PolicyInput::new(subject, action, resource, ctx);
        let decision = dispatch::resolve_miss(self.engine.as_ref(), &self.cache, key, input).await;
        debug!(
            subject = %subject.id,
            action,
            cached = false,
            allow = decision.allow,
            "authorization decision"
        );
        decision
    }

    /// Authorize several (action, resource) pairs for one subject.
    ///
    /// The result has one entry per item, in input order.
    pub async fn authorize_batch(
        &self,
        subject_token: Option<&str>,
        items: &[BatchItem],
        ctx: &RequestContext,
    ) -> Vec<BatchDecision> {
        if items.is_empty() {
            return Vec::new();
        }
        match self.resolve_subject(subject_token).await {
            Ok(subject) => self.check_batch(&subject, items, ctx).await,
            Err(reason) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let decision =
                        Decision::deny(anonymous_check(&item.action, &item.resource), &reason);
                    BatchDecision {
                        index,
                        allow: false,
                        decision,
                    }
                })
                .collect(),
        }
    }

    /// Batch evaluation for an already verified subject.
    pub async fn check_batch(
        &self,
        subject: &Subject,
        items: &[BatchItem],
        ctx: &RequestContext,
    ) -> Vec<BatchDecision> {
        batch::check_batch_impl(self, subject, items, ctx).await
    }

    /// True iff every item is allowed.
    pub async fn authorize_all(
        &self,
        subject_token: Option<&str>,
        items: &[BatchItem],
        ctx: &RequestContext,
    ) -> bool {
        all_allowed(&self.authorize_batch(subject_token, items, ctx).await)
    }

    /// True iff at least one item is allowed.
    pub async fn authorize_any(
        &self,
        subject_token: Option<&str>,
        items: &[BatchItem],
        ctx: &RequestContext,
    ) -> bool {
        any_allowed(&self.authorize_batch(subject_token, items, ctx).await)
    }

    /// Verified subject, or the deny reason.
    async fn resolve_subject(&self, subject_token: Option<&str>) -> Result<Subject, String> {
        let token = match subject_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => return Err(REASON_NO_TOKEN.to_string()),
        };

        self.verifier.verify(token).await.map_err(|e| {
            warn!(event = "subject_verification_failed", error = %e, "denying request");
            format!("{INVALID_TOKEN_PREFIX}: {e}")
        })
    }
}

fn anonymous_check(action: &str, resource: &Value) -> CheckKey {
    CheckKey {
        subject_id: String::new(),
        action: action.to_string(),
        resource: resource.clone(),
    }
}
