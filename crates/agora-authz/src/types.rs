//! Decision, subject and wire envelope types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reason attached to a deny when the caller supplied no subject token.
pub const REASON_NO_TOKEN: &str = "no-token";

/// Prefix of reasons produced by a failed token verification.
pub const INVALID_TOKEN_PREFIX: &str = "invalid-token";

/// Prefix of reasons produced when the policy endpoint could not be evaluated.
pub const EVALUATION_ERROR_PREFIX: &str = "evaluation-error";

/// The (subject, action, resource) tuple a decision was computed for.
///
/// Request context is deliberately absent: it never takes part in caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckKey {
    pub subject_id: String,
    pub action: String,
    pub resource: Value,
}

/// Result of evaluating one authorization tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the action is permitted.
    pub allow: bool,

    /// Human-readable reason, if the policy (or the failure path) gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Decision document as returned by the policy engine.
    pub payload: Value,

    /// Tuple that produced this decision.
    pub check: CheckKey,
}

impl Decision {
    /// Decision taken from a successful policy evaluation.
    pub fn from_policy(check: CheckKey, result: PolicyResult) -> Self {
        Self {
            allow: result.allow,
            reason: result.reason,
            payload: result.payload,
            check,
        }
    }

    /// Synthesized deny with the given reason.
    pub fn deny(check: CheckKey, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            allow: false,
            payload: serde_json::json!({ "allow": false, "reason": reason }),
            reason: Some(reason),
            check,
        }
    }

    /// Deny produced because the policy endpoint could not be evaluated.
    pub fn evaluation_error(check: CheckKey, error: impl std::fmt::Display) -> Self {
        Self::deny(check, format!("{EVALUATION_ERROR_PREFIX}: {error}"))
    }

    /// True when this deny comes from an infrastructure failure rather than
    /// from the policy itself.
    pub fn is_evaluation_error(&self) -> bool {
        !self.allow
            && self
                .reason
                .as_deref()
                .is_some_and(|r| r.starts_with(EVALUATION_ERROR_PREFIX))
    }
}

/// Parsed answer of the policy engine for one input.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyResult {
    pub allow: bool,
    pub reason: Option<String>,
    pub payload: Value,
}

/// Verified identity of the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl Subject {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            claims: Map::new(),
        }
    }

    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims = claims;
        self
    }
}

/// Per-request context. Sent to the policy engine, never part of the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub ip: Option<String>,
}

impl RequestContext {
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
        }
    }
}

/// One entry of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub action: String,
    pub resource: Value,
}

impl BatchItem {
    pub fn new(action: impl Into<String>, resource: Value) -> Self {
        Self {
            action: action.into(),
            resource,
        }
    }
}

/// One entry of a batch result, tagged with the position of its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDecision {
    pub index: usize,
    pub allow: bool,
    pub decision: Decision,
}

/// Result of a single `authorize` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthzOutcome {
    pub allow: bool,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Map<String, Value>>,
}

/// Environment block of the policy input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEnv {
    pub now: DateTime<Utc>,
    pub ip: Option<String>,
}

/// Input document evaluated by the policy engine.
///
/// Serialized as `{subjectId, claims, action, resource, env: {now, ip}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyInput {
    pub subject_id: String,
    pub claims: Map<String, Value>,
    pub action: String,
    pub resource: Value,
    pub env: PolicyEnv,
}

impl PolicyInput {
    /// Build the input for one check, stamping `env.now` with the current time.
    pub fn new(subject: &Subject, action: &str, resource: &Value, ctx: &RequestContext) -> Self {
        Self {
            subject_id: subject.id.clone(),
            claims: subject.claims.clone(),
            action: action.to_string(),
            resource: resource.clone(),
            env: PolicyEnv {
                now: Utc::now(),
                ip: ctx.ip.clone(),
            },
        }
    }

    /// Tuple this input is cached under.
    pub fn check_key(&self) -> CheckKey {
        CheckKey {
            subject_id: self.subject_id.clone(),
            action: self.action.clone(),
            resource: self.resource.clone(),
        }
    }
}

/// True iff every decision allows. Vacuously true for an empty batch.
pub fn all_allowed(decisions: &[BatchDecision]) -> bool {
    decisions.iter().all(|d| d.allow)
}

/// True iff at least one decision allows.
pub fn any_allowed(decisions: &[BatchDecision]) -> bool {
    decisions.iter().any(|d| d.allow)
}
