// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Company REST endpoints.
//!
//! The route table only asks for a recognised member here; each handler's
//! service call enforces the operation's own tier.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::auth::PrincipalContext;
use crate::error::ApiError;
use crate::models::{
    BulkImportRequest, BulkImportResult, Company, CompanyId, CompanyInput, CompanySearch,
    CompanyUpdate,
};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/companies",
    tag = "Companies",
    security(("bearer" = [])),
    params(CompanySearch),
    responses(
        (status = 200, description = "Matching companies", body = [Company]),
        (status = 403, description = "Access denied")
    )
)]
pub async fn list_companies(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Query(criteria): Query<CompanySearch>,
) -> Result<Json<Vec<Company>>, ApiError> {
    Ok(Json(state.companies.search(&ctx, &criteria).await?))
}

#[utoipa::path(
    get,
    path = "/api/companies/{company_id}",
    tag = "Companies",
    security(("bearer" = [])),
    params(("company_id" = u64, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company", body = Company),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Company not found")
    )
)]
pub async fn get_company(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Path(company_id): Path<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.get(&ctx, company_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/companies",
    tag = "Companies",
    security(("bearer" = [])),
    request_body = CompanyInput,
    responses(
        (status = 201, description = "Company created", body = Company),
        (status = 400, description = "Missing required field"),
        (status = 403, description = "Access denied"),
        (status = 409, description = "Registration number already exists")
    )
)]
pub async fn create_company(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Json(input): Json<CompanyInput>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    let company = state.companies.create(&ctx, &input).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

#[utoipa::path(
    put,
    path = "/api/companies/{company_id}",
    tag = "Companies",
    security(("bearer" = [])),
    params(("company_id" = u64, Path, description = "Company id")),
    request_body = CompanyUpdate,
    responses(
        (status = 200, description = "Company updated", body = Company),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Company not found"),
        (status = 409, description = "Registration number already exists")
    )
)]
pub async fn update_company(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Path(company_id): Path<CompanyId>,
    Json(update): Json<CompanyUpdate>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.update(&ctx, company_id, &update).await?))
}

#[utoipa::path(
    delete,
    path = "/api/companies/{company_id}",
    tag = "Companies",
    security(("bearer" = [])),
    params(("company_id" = u64, Path, description = "Company id")),
    responses(
        (status = 204, description = "Company deleted"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Company not found")
    )
)]
pub async fn delete_company(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Path(company_id): Path<CompanyId>,
) -> Result<StatusCode, ApiError> {
    state.companies.delete(&ctx, company_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/companies/{company_id}/disable",
    tag = "Companies",
    security(("bearer" = [])),
    params(("company_id" = u64, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company disabled", body = Company),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Company not found")
    )
)]
pub async fn disable_company(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Path(company_id): Path<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.disable(&ctx, company_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/companies/{company_id}/reactivate",
    tag = "Companies",
    security(("bearer" = [])),
    params(("company_id" = u64, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company reactivated", body = Company),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Company not found")
    )
)]
pub async fn reactivate_company(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Path(company_id): Path<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.reactivate(&ctx, company_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/companies/import",
    tag = "Companies",
    security(("bearer" = [])),
    request_body = BulkImportRequest,
    responses(
        (status = 200, description = "Per-row import outcome", body = BulkImportResult),
        (status = 400, description = "Empty batch"),
        (status = 403, description = "Access denied")
    )
)]
pub async fn bulk_import_companies(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Json(request): Json<BulkImportRequest>,
) -> Result<Json<BulkImportResult>, ApiError> {
    Ok(Json(state.companies.bulk_import(&ctx, &request.companies).await?))
}
