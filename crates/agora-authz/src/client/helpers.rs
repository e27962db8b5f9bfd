//! Pure helpers: decision body parsing (no HTTP, no status logic).

use serde_json::Value;

use crate::error::{AuthzError, AuthzResult};
use crate::types::PolicyResult;

/// Longest slice of an error body carried into an error message.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 200;

/// Parse a policy endpoint response body into a [`PolicyResult`].
///
/// Accepted shapes:
/// - `{"result": {"allow": bool, "reason"?: string, ...}}` (OPA Data API)
/// - `{"result": bool}` (boolean rule)
/// - `{"allow": bool, "reason"?: string, ...}` (bare decision document)
///
/// Anything without a boolean allow flag is an error, which callers turn
/// into a deny. OPA answers `{}` for an undefined document.
pub(crate) fn parse_decision_body(body: &str) -> AuthzResult<PolicyResult> {
    let value: Value = serde_json::from_str(body).map_err(|e| AuthzError::InvalidResponse {
        message: format!("malformed decision body: {}", e),
    })?;

    let document = match value {
        Value::Object(mut map) => match map.remove("result") {
            Some(result) => result,
            None if map.is_empty() => {
                return Err(AuthzError::InvalidResponse {
                    message: "policy decision is undefined".into(),
                })
            }
            None => Value::Object(map),
        },
        other => other,
    };

    match document {
        Value::Bool(allow) => Ok(PolicyResult {
            allow,
            reason: None,
            payload: serde_json::json!({ "allow": allow }),
        }),
        Value::Object(map) => {
            let allow = map
                .get("allow")
                .and_then(Value::as_bool)
                .ok_or_else(|| AuthzError::InvalidResponse {
                    message: "decision has no boolean 'allow'".into(),
                })?;
            let reason = map.get("reason").and_then(Value::as_str).map(String::from);
            Ok(PolicyResult {
                allow,
                reason,
                payload: Value::Object(map),
            })
        }
        other => Err(AuthzError::InvalidResponse {
            message: format!("unexpected decision document: {}", json_kind(&other)),
        }),
    }
}

/// Truncated error body for messages.
pub(crate) fn error_excerpt(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_opa_result_object() {
        let body = r#"{"decision_id":"d1","result":{"allow":true,"reason":"ok","rule":"members_read"}}"#;
        let result = parse_decision_body(body).unwrap();
        assert!(result.allow);
        assert_eq!(result.reason.as_deref(), Some("ok"));
        assert_eq!(result.payload["rule"], "members_read");
        assert!(result.payload.get("decision_id").is_none());
    }

    #[test]
    fn test_opa_boolean_rule() {
        let result = parse_decision_body(r#"{"result":false}"#).unwrap();
        assert!(!result.allow);
        assert_eq!(result.payload, json!({"allow": false}));
    }

    #[test]
    fn test_bare_document() {
        let result = parse_decision_body(r#"{"allow":false,"reason":"banned"}"#).unwrap();
        assert!(!result.allow);
        assert_eq!(result.reason.as_deref(), Some("banned"));
    }

    #[test]
    fn test_undefined_decision_is_error() {
        let err = parse_decision_body("{}").unwrap_err();
        assert!(err.to_string().contains("undefined"));
    }

    #[test]
    fn test_non_boolean_allow_is_error() {
        assert!(parse_decision_body(r#"{"result":{"allow":"yes"}}"#).is_err());
        assert!(parse_decision_body(r#"{"result":{"reason":"ok"}}"#).is_err());
        assert!(parse_decision_body(r#"{"result":1}"#).is_err());
        assert!(parse_decision_body(r#"[true]"#).is_err());
    }

    #[test]
    fn test_malformed_json_is_error() {
        let err = parse_decision_body("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, AuthzError::InvalidResponse { .. }));
    }

    #[test]
    fn test_error_excerpt_truncates() {
        let long = "x".repeat(1_000);
        assert_eq!(error_excerpt(&long).len(), MAX_ERROR_BODY_CHARS);
        assert_eq!(error_excerpt("short"), "short");
    }
}
