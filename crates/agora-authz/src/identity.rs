//! Subject token verification.
//!
//! The authorizer only needs a subject id and its claims; how a token is
//! turned into those is behind [`SubjectVerifier`]. [`JwtVerifier`] covers
//! the forum's signed JWTs.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::config::{IdentityConfig, TokenAlgorithm};
use crate::error::{AuthzError, AuthzResult};
use crate::types::Subject;

/// Turns a caller-supplied token into a verified [`Subject`].
#[async_trait]
pub trait SubjectVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> AuthzResult<Subject>;
}

/// Verifies JWTs signed with a single pinned algorithm and key.
pub struct JwtVerifier {
    algorithm: Algorithm,
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.validation.iss)
            .field("audience", &self.validation.aud)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    pub fn from_config(config: &IdentityConfig) -> AuthzResult<Self> {
        let (algorithm, key) = match config.algorithm {
            TokenAlgorithm::Hs256 => {
                let secret = config.secret.as_deref().ok_or_else(|| AuthzError::Config {
                    message: "identity.secret is required for hs256".into(),
                })?;
                (Algorithm::HS256, DecodingKey::from_secret(secret.as_bytes()))
            }
            TokenAlgorithm::Rs256 => {
                let pem = config
                    .public_key_pem
                    .as_deref()
                    .ok_or_else(|| AuthzError::Config {
                        message: "identity.public_key_pem is required for rs256".into(),
                    })?;
                let key =
                    DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| AuthzError::Config {
                        message: format!("invalid RSA public key: {}", e),
                    })?;
                (Algorithm::RS256, key)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        if let Some(iss) = &config.issuer {
            validation.set_issuer(&[iss]);
        }
        if config.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&config.audience);
        }

        Ok(Self {
            algorithm,
            key,
            validation,
        })
    }

    /// HS256 verifier with default validation, no issuer/audience checks.
    pub fn hs256(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = IdentityConfig::default().leeway_secs;
        validation.validate_aud = false;
        Self {
            algorithm: Algorithm::HS256,
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    fn verify_sync(&self, token: &str) -> AuthzResult<Subject> {
        let header = decode_header(token).map_err(|e| invalid(format!("malformed token: {}", e)))?;

        // Pin the algorithm before touching the signature.
        if header.alg != self.algorithm {
            return Err(invalid(format!(
                "algorithm {:?} not accepted (expected {:?})",
                header.alg, self.algorithm
            )));
        }

        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|e| invalid(e.to_string()))?;

        let claims = data.claims;
        let id = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("missing 'sub' claim".to_string()))?
            .to_string();

        Ok(Subject { id, claims })
    }
}

#[async_trait]
impl SubjectVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> AuthzResult<Subject> {
        self.verify_sync(token)
    }
}

fn invalid(message: String) -> AuthzError {
    AuthzError::InvalidToken { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "agora_test_secret_for_unit_testing_only";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn token_with(alg: Algorithm, claims: Value) -> String {
        encode(
            &Header::new(alg),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims() -> Value {
        json!({
            "sub": "u1",
            "iss": "https://auth.agora.example",
            "aud": "agora-api",
            "exp": now() + 3600,
            "role": "moderator",
            "communities": ["rust", "cooking"]
        })
    }

    #[tokio::test]
    async fn test_valid_token_yields_subject_and_claims() {
        let verifier = JwtVerifier::hs256(SECRET);
        let subject = verifier
            .verify(&token_with(Algorithm::HS256, valid_claims()))
            .await
            .unwrap();

        assert_eq!(subject.id, "u1");
        assert_eq!(subject.claims["role"], "moderator");
        assert_eq!(subject.claims["communities"][1], "cooking");
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let config = IdentityConfig {
            secret: Some(SECRET.into()),
            leeway_secs: 0,
            ..Default::default()
        };
        let verifier = JwtVerifier::from_config(&config).unwrap();
        let mut claims = valid_claims();
        claims["exp"] = json!(now() - 120);

        let err = verifier
            .verify(&token_with(Algorithm::HS256, claims))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_algorithm_is_pinned() {
        let verifier = JwtVerifier::hs256(SECRET);
        let err = verifier
            .verify(&token_with(Algorithm::HS384, valid_claims()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not accepted"));
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let verifier = JwtVerifier::hs256("some-other-secret");
        let result = verifier
            .verify(&token_with(Algorithm::HS256, valid_claims()))
            .await;
        assert!(matches!(result, Err(AuthzError::InvalidToken { .. })));
    }

    #[tokio::test]
    async fn test_issuer_and_audience_checked_when_configured() {
        let config = IdentityConfig {
            secret: Some(SECRET.into()),
            issuer: Some("https://auth.agora.example".into()),
            audience: vec!["agora-api".into()],
            ..Default::default()
        };
        let verifier = JwtVerifier::from_config(&config).unwrap();
        assert!(verifier
            .verify(&token_with(Algorithm::HS256, valid_claims()))
            .await
            .is_ok());

        let mut wrong_iss = valid_claims();
        wrong_iss["iss"] = json!("https://evil.example");
        assert!(verifier
            .verify(&token_with(Algorithm::HS256, wrong_iss))
            .await
            .is_err());

        let mut wrong_aud = valid_claims();
        wrong_aud["aud"] = json!("another-service");
        assert!(verifier
            .verify(&token_with(Algorithm::HS256, wrong_aud))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_sub_rejected() {
        let verifier = JwtVerifier::hs256(SECRET);
        let claims = json!({ "exp": now() + 3600 });
        let err = verifier
            .verify(&token_with(Algorithm::HS256, claims))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("sub"));
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let verifier = JwtVerifier::hs256(SECRET);
        let err = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidToken { .. }));
    }

    #[test]
    fn test_config_requires_key_material() {
        let hs = IdentityConfig::default();
        assert!(matches!(
            JwtVerifier::from_config(&hs),
            Err(AuthzError::Config { .. })
        ));

        let rs = IdentityConfig {
            algorithm: TokenAlgorithm::Rs256,
            public_key_pem: Some("not a pem".into()),
            ..Default::default()
        };
        assert!(matches!(
            JwtVerifier::from_config(&rs),
            Err(AuthzError::Config { .. })
        ));
    }
}
