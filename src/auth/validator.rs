// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Signature first, then `exp`/`nbf`/`iss`/`aud` via `jsonwebtoken`, then an
//! explicit `iat` check, since the library does not look at `iat` at all.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};

use super::claims::{ClaimPaths, Claims};
use super::error::AuthError;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// What a token must satisfy besides a valid signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSettings {
    /// Trusted issuer (`iss`), compared verbatim
    pub issuer: String,
    /// Expected audience; `None` disables the audience check
    pub audience: Option<String>,
    pub clock_skew: Duration,
    pub claim_paths: ClaimPaths,
}

impl ValidatorSettings {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: None,
            clock_skew: DEFAULT_CLOCK_SKEW,
            claim_paths: ClaimPaths::default(),
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// Verifies compact JWS tokens against the issuer's key set.
#[derive(Clone)]
pub struct TokenValidator {
    keys: JwksManager,
    settings: Arc<ValidatorSettings>,
}

impl TokenValidator {
    pub fn new(keys: JwksManager, settings: ValidatorSettings) -> Self {
        Self {
            keys,
            settings: Arc::new(settings),
        }
    }

    pub fn keys(&self) -> &JwksManager {
        &self.keys
    }

    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Verify `raw_token` and return its claims.
    pub async fn validate(&self, raw_token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(raw_token).map_err(|_| AuthError::MalformedToken)?;
        let (decoding_key, algorithm) = self.keys.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = self.settings.clock_skew.as_secs();
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.set_issuer(&[&self.settings.issuer]);
        match &self.settings.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let token_data = decode::<serde_json::Value>(raw_token, &decoding_key, &validation)
            .map_err(|e| map_jwt_error(e.kind()))?;

        let claims = Claims::from_payload(&token_data.claims, &self.settings.claim_paths)?;
        self.check_issued_at(&claims)?;
        Ok(claims)
    }

    fn check_issued_at(&self, claims: &Claims) -> Result<(), AuthError> {
        let skew = chrono::Duration::from_std(self.settings.clock_skew)
            .map_err(|_| AuthError::NotYetValid)?;
        if claims.issued_at() > Utc::now() + skew {
            return Err(AuthError::NotYetValid);
        }
        Ok(())
    }
}

fn map_jwt_error(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::ImmatureSignature => AuthError::NotYetValid,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        _ => AuthError::MalformedToken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{
        jwks_json, spawn_key_server, test_validator, TokenBuilder, SIGNING_KID, TEST_AUDIENCE,
    };
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    #[tokio::test]
    async fn valid_token_round_trips_claims() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);
        let now = Utc::now().timestamp();

        let token = TokenBuilder::new(&server.issuer())
            .claim("sub", json!("8d2f"))
            .claim("preferred_username", json!("jdoe"))
            .claim("email", json!("jdoe@example.com"))
            .claim("name", json!("Jane Doe"))
            .claim("groups", json!(["app-admins"]))
            .claim("realm_access", json!({ "roles": ["nexus-user"] }))
            .claim("iat", json!(now))
            .claim("exp", json!(now + 600))
            .sign();

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.subject(), "8d2f");
        assert_eq!(claims.username(), Some("jdoe"));
        assert_eq!(claims.email(), Some("jdoe@example.com"));
        assert_eq!(claims.display_name(), Some("Jane Doe"));
        assert!(claims.groups().contains("app-admins"));
        assert!(claims.roles().contains("nexus-user"));
        assert_eq!(claims.issuer(), server.issuer());
        assert_eq!(claims.issued_at().timestamp(), now);
        assert_eq!(claims.expires_at().timestamp(), now + 600);
    }

    #[tokio::test]
    async fn extra_claims_are_ignored() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new(&server.issuer())
            .claim("session_state", json!("abc"))
            .claim("resource_access", json!({ "account": { "roles": ["manage-account"] } }))
            .sign();

        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn expired_beyond_skew_is_rejected() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);
        let now = Utc::now().timestamp();

        let token = TokenBuilder::new(&server.issuer())
            .claim("iat", json!(now - 3600))
            .claim("exp", json!(now - 61))
            .sign();

        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::Expired);
    }

    #[tokio::test]
    async fn expired_within_skew_is_accepted() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);
        let now = Utc::now().timestamp();

        let token = TokenBuilder::new(&server.issuer())
            .claim("iat", json!(now - 3600))
            .claim("exp", json!(now - 30))
            .sign();

        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn future_issue_time_is_not_yet_valid() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);
        let future = Utc::now() + ChronoDuration::minutes(10);

        let token = TokenBuilder::new(&server.issuer())
            .claim("iat", json!(future.timestamp()))
            .claim("exp", json!(future.timestamp() + 600))
            .sign();

        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::NotYetValid);
    }

    #[tokio::test]
    async fn future_not_before_is_not_yet_valid() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);
        let now = Utc::now().timestamp();

        let token = TokenBuilder::new(&server.issuer())
            .claim("nbf", json!(now + 600))
            .sign();

        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::NotYetValid);
    }

    #[tokio::test]
    async fn foreign_issuer_is_rejected() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new("https://evil.example.com/realms/nexus").sign();
        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::IssuerMismatch);
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new(&server.issuer())
            .claim("aud", json!("another-api"))
            .sign();
        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::AudienceMismatch);

        let token = TokenBuilder::new(&server.issuer())
            .claim("aud", json!(["account", TEST_AUDIENCE]))
            .sign();
        assert!(validator.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn untrusted_key_id_is_invalid_signature() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new(&server.issuer()).rogue().sign();
        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::InvalidSignature);
        assert_eq!(server.hits(), 2, "unknown kid must trigger exactly one refresh");
    }

    #[tokio::test]
    async fn known_kid_with_foreign_key_is_invalid_signature() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new(&server.issuer())
            .rogue()
            .kid(SIGNING_KID)
            .sign();
        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::InvalidSignature);
    }

    #[tokio::test]
    async fn wrong_algorithm_is_invalid_signature() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new(&server.issuer()).sign_hs256(b"shared-secret");
        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::InvalidSignature);
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        for raw in ["", "not-a-jwt", "a.b", "a.b.c"] {
            assert_eq!(validator.validate(raw).await.unwrap_err(), AuthError::MalformedToken);
        }
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn missing_subject_is_malformed() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new(&server.issuer()).without("sub").sign();
        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::MalformedToken);
    }

    #[tokio::test]
    async fn tampered_payload_is_invalid_signature() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);

        let token = TokenBuilder::new(&server.issuer())
            .claim("groups", json!(["users"]))
            .sign();
        let parts: Vec<&str> = token.split('.').collect();
        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["groups"] = json!(["platform-admins"]);
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap()),
            parts[2]
        );

        assert_eq!(validator.validate(&forged).await.unwrap_err(), AuthError::InvalidSignature);
    }

    #[tokio::test]
    async fn unreachable_key_endpoint_is_key_fetch_failure() {
        let server = spawn_key_server(jwks_json(&[SIGNING_KID])).await;
        let validator = test_validator(&server);
        server.fail_requests(true);

        let token = TokenBuilder::new(&server.issuer()).sign();
        assert!(matches!(
            validator.validate(&token).await.unwrap_err(),
            AuthError::KeyFetchFailed(_)
        ));
    }
}
