// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operation endpoint.
//!
//! `POST /graphql` with `{"operationName": ..., "variables": {...}}`. Any
//! authenticated caller reaches the endpoint; each operation is then guarded
//! by its own entry in the operation table, exactly as on the REST routes.
//! Failures are reported in an `errors` array with a 200 status, following
//! GraphQL-over-HTTP conventions.

use axum::{extract::State, Json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use utoipa::ToSchema;

use crate::auth::{AuthError, Operation, PrincipalContext};
use crate::models::{BulkImportRequest, CompanyId, CompanyInput, CompanySearch, CompanyUpdate};
use crate::service::ServiceError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// One of `companies`, `company`, `createCompany`, `updateCompany`,
    /// `deleteCompany`, `disableCompany`, `reactivateCompany`,
    /// `bulkImportCompanies`
    pub operation_name: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub variables: Map<String, Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OperationError {
    pub message: String,
    #[schema(value_type = Object)]
    pub extensions: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OperationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationError>,
}

/// Failure while resolving one operation.
#[derive(Debug)]
enum ResolveError {
    BadRequest(String),
    Service(ServiceError),
}

impl From<ServiceError> for ResolveError {
    fn from(err: ServiceError) -> Self {
        ResolveError::Service(err)
    }
}

impl ResolveError {
    fn into_operation_error(self) -> OperationError {
        let (message, classification) = match self {
            ResolveError::BadRequest(message) => (message, "BAD_REQUEST"),
            ResolveError::Service(ServiceError::Auth(err)) => {
                err.log();
                let classification = match err {
                    AuthError::Forbidden => "FORBIDDEN",
                    AuthError::KeyFetchFailed(_) => "INTERNAL_ERROR",
                    _ => "UNAUTHORIZED",
                };
                (err.public_message().to_string(), classification)
            }
            ResolveError::Service(ServiceError::NotFound(message)) => (message, "NOT_FOUND"),
            ResolveError::Service(ServiceError::Validation(message)) => (message, "BAD_REQUEST"),
            ResolveError::Service(ServiceError::Conflict(message)) => (message, "CONFLICT"),
        };
        OperationError {
            message,
            extensions: json!({ "classification": classification }),
        }
    }
}

/// Company ids arrive as GraphQL `ID`s, so accept strings as well as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdArg {
    Number(CompanyId),
    Text(String),
}

impl IdArg {
    fn parse(self) -> Result<CompanyId, ResolveError> {
        match self {
            IdArg::Number(id) => Ok(id),
            IdArg::Text(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ResolveError::BadRequest(format!("invalid company id '{raw}'"))),
        }
    }
}

fn argument<T: DeserializeOwned>(
    variables: &Map<String, Value>,
    name: &str,
) -> Result<T, ResolveError> {
    let value = variables.get(name).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| ResolveError::BadRequest(format!("invalid argument '{name}': {e}")))
}

fn id_argument(variables: &Map<String, Value>) -> Result<CompanyId, ResolveError> {
    argument::<IdArg>(variables, "id")?.parse()
}

fn to_data<T: Serialize>(value: T) -> Result<Value, ResolveError> {
    serde_json::to_value(value).map_err(|e| ResolveError::BadRequest(e.to_string()))
}

async fn resolve(
    state: &AppState,
    ctx: &PrincipalContext,
    operation: Operation,
    variables: &Map<String, Value>,
) -> Result<Value, ResolveError> {
    let companies = &state.companies;
    companies.guard(ctx, operation)?;
    match operation {
        Operation::QueryCompanies => {
            let criteria: Option<CompanySearch> = argument(variables, "search")?;
            to_data(companies.search(ctx, &criteria.unwrap_or_default()).await?)
        }
        Operation::GetCompany => to_data(companies.get(ctx, id_argument(variables)?).await?),
        Operation::CreateCompany => {
            let input: CompanyInput = argument(variables, "input")?;
            to_data(companies.create(ctx, &input).await?)
        }
        Operation::UpdateCompany => {
            let id = id_argument(variables)?;
            let update: CompanyUpdate = argument(variables, "input")?;
            to_data(companies.update(ctx, id, &update).await?)
        }
        Operation::DeleteCompany => {
            companies.delete(ctx, id_argument(variables)?).await?;
            Ok(Value::Bool(true))
        }
        Operation::DisableCompany => {
            to_data(companies.disable(ctx, id_argument(variables)?).await?)
        }
        Operation::ReactivateCompany => {
            to_data(companies.reactivate(ctx, id_argument(variables)?).await?)
        }
        Operation::BulkImportCompanies => {
            let request: BulkImportRequest = argument(variables, "input")?;
            to_data(companies.bulk_import(ctx, &request.companies).await?)
        }
    }
}

#[utoipa::path(
    post,
    path = "/graphql",
    tag = "Operations",
    security(("bearer" = [])),
    request_body = OperationRequest,
    responses(
        (status = 200, description = "Operation result or errors", body = OperationResponse),
        (status = 401, description = "Authentication required")
    )
)]
pub async fn execute(
    State(state): State<AppState>,
    ctx: PrincipalContext,
    Json(request): Json<OperationRequest>,
) -> Json<OperationResponse> {
    let name = request.operation_name;
    let outcome = match name.parse::<Operation>() {
        Ok(operation) => resolve(&state, &ctx, operation, &request.variables).await,
        Err(message) => Err(ResolveError::BadRequest(message)),
    };

    Json(match outcome {
        Ok(value) => OperationResponse {
            data: Some(json!({ name: value })),
            errors: Vec::new(),
        },
        Err(err) => OperationResponse {
            data: Some(json!({ name: Value::Null })),
            errors: vec![err.into_operation_error()],
        },
    })
}
