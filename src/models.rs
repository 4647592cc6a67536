// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for company management. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation. Field names are camelCase on the wire.
//!
//! Every stored record carries an [`AuditStamp`], flattened into the JSON
//! object as `createdBy`, `createdAt`, `modifiedBy` and `modifiedAt`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuditStamp;

pub type CompanyId = u64;

/// A registered company.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: CompanyId,
    pub company_name: String,
    /// Unique across all companies
    pub registration_number: String,
    pub active: bool,
    #[serde(flatten)]
    pub audit: AuditStamp,
}

/// Fields for a new company, also used for bulk import rows.
///
/// Fields are optional on the wire so that one bad row can be reported
/// instead of rejecting a whole batch at deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInput {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    /// Defaults to `true`
    #[serde(default)]
    pub active: Option<bool>,
}

/// Partial update; absent or blank fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyUpdate {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
}

/// Search criteria. All given criteria must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CompanySearch {
    /// Case-insensitive substring of name or registration number
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportRequest {
    pub companies: Vec<CompanyInput>,
}

/// A rejected bulk import row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportFailure {
    /// 1-based position in the request
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<ImportFailure>,
    pub imported: Vec<Company>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn company_serializes_audit_fields_inline() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let company = Company {
            id: 7,
            company_name: "Acme Ltd".into(),
            registration_number: "U12345".into(),
            active: true,
            audit: AuditStamp {
                created_by: "jdoe".into(),
                created_at: at,
                modified_by: "jdoe".into(),
                modified_at: at,
            },
        };

        let value = serde_json::to_value(&company).unwrap();
        assert_eq!(value["companyName"], "Acme Ltd");
        assert_eq!(value["createdBy"], "jdoe");
        assert_eq!(value["modifiedBy"], "jdoe");
        assert!(value.get("audit").is_none());
    }

    #[test]
    fn company_input_tolerates_missing_fields() {
        let input: CompanyInput = serde_json::from_value(json!({ "companyName": "Acme" })).unwrap();
        assert_eq!(input.company_name.as_deref(), Some("Acme"));
        assert_eq!(input.registration_number, None);
        assert_eq!(input.active, None);
    }
}
