// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication against an external OpenID Connect issuer
//! (Keycloak in practice) and tiered role authorization for the Nexus API.
//!
//! ## Auth Flow
//!
//! 1. The client authenticates with the identity provider
//! 2. The client sends `Authorization: Bearer <JWT>`
//! 3. The server:
//!    - Resolves the route rule for the request path; public rules stop here
//!    - Fetches the issuer's JWKS (cached, refreshed on unknown `kid`)
//!    - Verifies signature, `exp`, `nbf`, `iat`, issuer and audience
//!    - Maps `groups` and realm roles to tiers, closed under the hierarchy
//!    - Checks the route rule, then exposes a [`PrincipalContext`]
//! 4. Business services check their own operation rule before doing work
//!
//! ## Security
//!
//! - Unknown labels grant nothing; an empty permission set is valid
//! - Clients only ever see generic 401/403/503 answers
//! - Clock skew tolerance defaults to 60 seconds

pub mod audit;
pub mod claims;
pub mod error;
pub mod jwks;
pub mod middleware;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit::{current_actor, AuditStamp, SYSTEM_ACTOR};
pub use claims::{ClaimPaths, Claims};
pub use error::AuthError;
pub use jwks::{JwksManager, JwksSettings, KeySource};
pub use middleware::enforce_access;
pub use policy::{permits, Access, AccessPolicy, AccessRule, Operation, SecurityProfile};
pub use principal::PrincipalContext;
pub use roles::{AuthorityMapper, ChannelPrecedence, PermissionSet, Tier, TierHierarchy};
pub use validator::{TokenValidator, ValidatorSettings};
