// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-request principal.
//!
//! Use the `PrincipalContext` extractor in handlers; the access middleware
//! has already validated the token and placed the context in the request
//! extensions:
//!
//! ```rust,ignore
//! async fn my_handler(ctx: PrincipalContext) -> impl IntoResponse {
//!     // ctx.current_actor(), ctx.require(Tier::AppAdmin)?
//! }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::audit;
use super::claims::Claims;
use super::error::AuthError;
use super::policy::permits;
use super::roles::{PermissionSet, Tier};

/// Validated identity and derived tiers of the current request.
///
/// Anonymous requests get an empty context rather than no context, so every
/// consumer handles a single shape.
#[derive(Debug, Clone, Default)]
pub struct PrincipalContext {
    claims: Option<Arc<Claims>>,
    permissions: PermissionSet,
}

impl PrincipalContext {
    /// Context for a request without credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(claims: Claims, permissions: PermissionSet) -> Self {
        Self {
            claims: Some(Arc::new(claims)),
            permissions,
        }
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_deref()
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims().map(Claims::subject)
    }

    pub fn username(&self) -> Option<&str> {
        self.claims().and_then(Claims::username)
    }

    /// Guard for business operations: fail unless `tier` is satisfied.
    pub fn require(&self, tier: Tier) -> Result<(), AuthError> {
        if !self.is_authenticated() {
            return Err(AuthError::Unauthenticated);
        }
        if !permits(tier, &self.permissions) {
            return Err(AuthError::Forbidden);
        }
        Ok(())
    }

    /// Identity to stamp on records written in this request.
    pub fn current_actor(&self) -> String {
        audit::current_actor(self)
    }
}

impl<S> FromRequestParts<S> for PrincipalContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<PrincipalContext>()
            .cloned()
            .unwrap_or_default())
    }
}
