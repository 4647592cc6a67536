// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::SecurityProfile;
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Signing key set status ("ok" or "unavailable").
    /// Absent when no issuer is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
    /// Active security profile.
    pub profile: String,
}

/// Check whether the issuer's key set is available.
async fn check_jwks(state: &AppState) -> Option<String> {
    let keys = state.auth.keys()?;
    if keys.is_cached().await {
        return Some("ok".to_string());
    }
    match keys.refresh().await {
        Ok(()) => Some("ok".to_string()),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not load signing keys");
            Some("unavailable".to_string())
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/actuator/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Signing keys are unavailable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let jwks = check_jwks(&state).await;
    let all_ok = jwks.as_deref().is_none_or(|s| s == "ok");

    let profile = match state.auth.profile() {
        SecurityProfile::Enforced => "enforced",
        SecurityProfile::DevNoAuth => "dev-no-auth",
    };

    let response = HealthResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            jwks,
            profile: profile.to_string(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
