// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access enforcement middleware for Axum.
//!
//! Runs before every handler: resolves the route rule for the request path,
//! validates the bearer token when the rule is not public, maps the token to
//! tiers and places the resulting [`PrincipalContext`] in the request
//! extensions. Denials never reach a handler.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/api/user/me", get(me))
//!     .layer(axum::middleware::from_fn_with_state(auth_state, enforce_access));
//! ```

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::AuthError;
use super::principal::PrincipalContext;
use crate::state::AuthState;

/// Authentication and coarse authorization for one request.
pub async fn enforce_access(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let resource = request.uri().path().to_owned();
    match authorize_request(&auth, &resource, request.headers()).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(method = %request.method(), path = %resource, "access denied");
            err.into_response()
        }
    }
}

/// Decide whether a request for `resource` may proceed, and as whom.
pub async fn authorize_request(
    auth: &AuthState,
    resource: &str,
    headers: &HeaderMap,
) -> Result<PrincipalContext, AuthError> {
    // Public resources skip validation, even when a header is present.
    if auth.policy.is_public(resource) {
        return Ok(PrincipalContext::anonymous());
    }

    let ctx = match bearer_token(headers)? {
        None => PrincipalContext::anonymous(),
        Some(token) => {
            let validator = auth
                .validator
                .as_ref()
                .ok_or_else(|| AuthError::KeyFetchFailed("no token validator configured".into()))?;
            let claims = validator.validate(token).await?;
            let permissions = auth.mapper.map_to_permissions(&claims);
            tracing::debug!(
                subject = claims.subject(),
                tiers = ?permissions.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                "bearer token accepted"
            );
            PrincipalContext::authenticated(claims, permissions)
        }
    };

    auth.policy.check(resource, &ctx)?;
    Ok(ctx)
}

/// Extract the bearer token from the `Authorization` header.
///
/// A missing header is `Ok(None)`; a header that is present but unusable is
/// an error.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::Unauthenticated)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::Unauthenticated)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Unauthenticated);
    }
    match token.trim() {
        "" => Err(AuthError::Unauthenticated),
        token => Ok(Some(token)),
    }
}
