// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and authorization errors.
//!
//! The precise variant is only ever written to the log. Clients see one of
//! three generic answers: authentication required (401), access denied (403)
//! or authentication temporarily unavailable (503).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Error produced by token validation or access enforcement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No usable credentials on a protected resource
    #[error("no valid bearer token presented")]
    Unauthenticated,
    /// Token could not be parsed as a signed JWT with the expected claims
    #[error("token is malformed")]
    MalformedToken,
    /// Signature did not verify, key id unknown, or algorithm not allowed
    #[error("token signature is invalid")]
    InvalidSignature,
    /// Token expiry lies in the past beyond the clock skew
    #[error("token has expired")]
    Expired,
    /// Token was issued (or becomes valid) in the future beyond the clock skew
    #[error("token is not yet valid")]
    NotYetValid,
    /// Token was not issued by the trusted issuer
    #[error("token issuer is not trusted")]
    IssuerMismatch,
    /// Token is not addressed to this service
    #[error("token audience is not accepted")]
    AudienceMismatch,
    /// Authenticated, but the permission set does not satisfy the requirement
    #[error("insufficient permissions")]
    Forbidden,
    /// The issuer's key set could not be retrieved
    #[error("failed to fetch signing keys: {0}")]
    KeyFetchFailed(String),
}

impl AuthError {
    /// Precise error code, for logs only.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "token_expired",
            AuthError::NotYetValid => "token_not_yet_valid",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::Forbidden => "forbidden",
            AuthError::KeyFetchFailed(_) => "key_fetch_failed",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::NotYetValid
            | AuthError::IssuerMismatch
            | AuthError::AudienceMismatch => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::KeyFetchFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Code returned to clients. Collapses the authentication class.
    pub fn public_code(&self) -> &'static str {
        match self {
            AuthError::Forbidden => "forbidden",
            AuthError::KeyFetchFailed(_) => "authentication_unavailable",
            _ => "unauthenticated",
        }
    }

    /// Message returned to clients. Never names a tier or a claim.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Forbidden => "Access denied",
            AuthError::KeyFetchFailed(_) => "Authentication is temporarily unavailable",
            _ => "Authentication required",
        }
    }

    /// Whether this is an infrastructure failure rather than a client error.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AuthError::KeyFetchFailed(_))
    }

    /// Record the failure at the transport boundary.
    pub(crate) fn log(&self) {
        if self.is_infrastructure() {
            tracing::error!(
                error_code = self.error_code(),
                error = %self,
                "authentication infrastructure failure"
            );
        } else {
            tracing::warn!(
                error_code = self.error_code(),
                error = %self,
                "request rejected by access control"
            );
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
