// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{enforce_access, AuditStamp, Tier},
    models::{
        BulkImportRequest, BulkImportResult, Company, CompanyInput, CompanySearch, CompanyUpdate,
        ImportFailure,
    },
    state::AppState,
};

pub mod companies;
pub mod graphql;
pub mod health;
pub mod identity;

/// Build the application router.
///
/// Every route sits behind the access middleware; the route table decides
/// which of them need a token. CORS answers preflight requests before the
/// middleware runs.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let auth = state.auth.clone();

    Router::new()
        .route("/actuator/health", get(health::health))
        .route("/api/public/ping", get(identity::public_ping))
        .route("/api/user/me", get(identity::me))
        .route("/api/user/token-info", get(identity::token_info))
        .route("/api/manager/ping", get(identity::manager_ping))
        .route("/api/admin/ping", get(identity::admin_ping))
        .route(
            "/api/companies",
            get(companies::list_companies).post(companies::create_company),
        )
        .route("/api/companies/import", post(companies::bulk_import_companies))
        .route(
            "/api/companies/{company_id}",
            get(companies::get_company)
                .put(companies::update_company)
                .delete(companies::delete_company),
        )
        .route(
            "/api/companies/{company_id}/disable",
            post(companies::disable_company),
        )
        .route(
            "/api/companies/{company_id}/reactivate",
            post(companies::reactivate_company),
        )
        .route("/graphql", post(graphql::execute))
        .merge(SwaggerUi::new("/swagger-ui").url("/v3/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(auth, enforce_access))
        .with_state(state)
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        identity::public_ping,
        identity::me,
        identity::token_info,
        identity::manager_ping,
        identity::admin_ping,
        companies::list_companies,
        companies::get_company,
        companies::create_company,
        companies::update_company,
        companies::delete_company,
        companies::disable_company,
        companies::reactivate_company,
        companies::bulk_import_companies,
        graphql::execute
    ),
    components(
        schemas(
            Company,
            CompanyInput,
            CompanyUpdate,
            CompanySearch,
            BulkImportRequest,
            BulkImportResult,
            ImportFailure,
            AuditStamp,
            Tier,
            health::HealthResponse,
            health::HealthChecks,
            identity::PingResponse,
            identity::MeResponse,
            identity::TokenInfoResponse,
            graphql::OperationRequest,
            graphql::OperationResponse,
            graphql::OperationError
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "Health", description = "Service and key set health"),
        (name = "Identity", description = "Caller identity and per-tier pings"),
        (name = "Companies", description = "Company management"),
        (name = "Operations", description = "Named operation endpoint")
    )
)]
struct ApiDoc;
