// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity and per-tier ping endpoints.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{AuthError, PrincipalContext, Tier};
use crate::error::ApiError;

/// Placeholder for identity fields the token did not carry.
const UNKNOWN: &str = "unknown";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub message: String,
    /// Identity that would be recorded on writes from this request
    pub actor: String,
}

/// Identity of the caller, as seen by the server.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub subject: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub tiers: Vec<Tier>,
}

/// Verified token contents.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfoResponse {
    pub subject: String,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
    pub tiers: Vec<Tier>,
}

fn ping(ctx: &PrincipalContext, message: &str) -> Json<PingResponse> {
    Json(PingResponse {
        message: message.to_string(),
        actor: ctx.current_actor(),
    })
}

#[utoipa::path(
    get,
    path = "/api/public/ping",
    tag = "Identity",
    responses((status = 200, description = "Reachable without a token", body = PingResponse))
)]
pub async fn public_ping(ctx: PrincipalContext) -> Json<PingResponse> {
    ping(&ctx, "public endpoint")
}

#[utoipa::path(
    get,
    path = "/api/manager/ping",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller holds app-admin", body = PingResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn manager_ping(ctx: PrincipalContext) -> Json<PingResponse> {
    ping(&ctx, "app-admin endpoint")
}

#[utoipa::path(
    get,
    path = "/api/admin/ping",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller holds platform-admin", body = PingResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn admin_ping(ctx: PrincipalContext) -> Json<PingResponse> {
    ping(&ctx, "platform-admin endpoint")
}

#[utoipa::path(
    get,
    path = "/api/user/me",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn me(ctx: PrincipalContext) -> Json<MeResponse> {
    let claims = ctx.claims();
    let field = |value: Option<&str>| value.unwrap_or(UNKNOWN).to_string();

    Json(MeResponse {
        subject: field(ctx.subject()),
        username: field(ctx.username()),
        email: field(claims.and_then(|c| c.email())),
        display_name: field(claims.and_then(|c| c.display_name())),
        tiers: ctx.permissions().iter().collect(),
    })
}

#[utoipa::path(
    get,
    path = "/api/user/token-info",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Verified token contents", body = TokenInfoResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn token_info(ctx: PrincipalContext) -> Result<Json<TokenInfoResponse>, ApiError> {
    let claims = ctx.claims().ok_or(AuthError::Unauthenticated)?;

    Ok(Json(TokenInfoResponse {
        subject: claims.subject().to_string(),
        issuer: claims.issuer().to_string(),
        issued_at: claims.issued_at(),
        expires_at: claims.expires_at(),
        groups: claims.groups().iter().cloned().collect(),
        roles: claims.roles().iter().cloned().collect(),
        tiers: ctx.permissions().iter().collect(),
    }))
}
