// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Company management.
//!
//! Every operation checks its own tier against the operation table before
//! touching the store, whichever route reached it, and every write is
//! stamped with the acting principal.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::{AccessPolicy, AuditStamp, AuthError, Operation, PrincipalContext};
use crate::models::{
    BulkImportResult, Company, CompanyId, CompanyInput, CompanySearch, CompanyUpdate,
    ImportFailure,
};
use crate::store::InMemoryStore;

/// Business-layer failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
}

fn not_found(id: CompanyId) -> ServiceError {
    ServiceError::NotFound(format!("Company {id} not found"))
}

fn duplicate(registration_number: &str) -> String {
    format!("Registration number '{registration_number}' already exists")
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trimmed value of a required text field.
fn required(value: Option<&str>, message: &str) -> Result<String, String> {
    non_blank(value).ok_or_else(|| message.to_string())
}

/// Validated fields of a new company.
struct NewCompany {
    company_name: String,
    registration_number: String,
    active: bool,
}

impl TryFrom<&CompanyInput> for NewCompany {
    type Error = String;

    fn try_from(input: &CompanyInput) -> Result<Self, Self::Error> {
        Ok(Self {
            company_name: required(input.company_name.as_deref(), "Company name is required")?,
            registration_number: required(
                input.registration_number.as_deref(),
                "Registration number is required",
            )?,
            active: input.active.unwrap_or(true),
        })
    }
}

#[derive(Clone)]
pub struct CompanyService {
    store: Arc<RwLock<InMemoryStore>>,
    policy: Arc<AccessPolicy>,
}

impl CompanyService {
    pub fn new(store: Arc<RwLock<InMemoryStore>>, policy: Arc<AccessPolicy>) -> Self {
        Self { store, policy }
    }

    /// Check `operation` against the operation table.
    pub fn guard(&self, ctx: &PrincipalContext, operation: Operation) -> Result<(), ServiceError> {
        Ok(self.policy.require_operation(ctx, operation)?)
    }

    pub async fn search(
        &self,
        ctx: &PrincipalContext,
        criteria: &CompanySearch,
    ) -> Result<Vec<Company>, ServiceError> {
        self.guard(ctx, Operation::QueryCompanies)?;
        Ok(self.store.read().await.search(criteria))
    }

    pub async fn get(
        &self,
        ctx: &PrincipalContext,
        id: CompanyId,
    ) -> Result<Company, ServiceError> {
        self.guard(ctx, Operation::GetCompany)?;
        self.store
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(
        &self,
        ctx: &PrincipalContext,
        input: &CompanyInput,
    ) -> Result<Company, ServiceError> {
        self.guard(ctx, Operation::CreateCompany)?;
        let new = NewCompany::try_from(input).map_err(ServiceError::Validation)?;

        let mut store = self.store.write().await;
        if store.registration_taken(&new.registration_number, None) {
            return Err(ServiceError::Conflict(duplicate(&new.registration_number)));
        }
        let company = store.insert(
            new.company_name,
            new.registration_number,
            new.active,
            AuditStamp::created(ctx),
        );
        tracing::info!(
            company_id = company.id,
            actor = %company.audit.created_by,
            "company created"
        );
        Ok(company)
    }

    pub async fn update(
        &self,
        ctx: &PrincipalContext,
        id: CompanyId,
        update: &CompanyUpdate,
    ) -> Result<Company, ServiceError> {
        self.guard(ctx, Operation::UpdateCompany)?;
        let company_name = non_blank(update.company_name.as_deref());
        let registration_number = non_blank(update.registration_number.as_deref());

        let mut store = self.store.write().await;
        if let Some(registration_number) = &registration_number {
            if store.registration_taken(registration_number, Some(id)) {
                return Err(ServiceError::Conflict(duplicate(registration_number)));
            }
        }
        let company = store.get_mut(id).ok_or_else(|| not_found(id))?;
        if let Some(company_name) = company_name {
            company.company_name = company_name;
        }
        if let Some(registration_number) = registration_number {
            company.registration_number = registration_number;
        }
        company.audit.touch(ctx);
        tracing::info!(company_id = id, actor = %company.audit.modified_by, "company updated");
        Ok(company.clone())
    }

    pub async fn delete(
        &self,
        ctx: &PrincipalContext,
        id: CompanyId,
    ) -> Result<Company, ServiceError> {
        self.guard(ctx, Operation::DeleteCompany)?;
        let company = self.store.write().await.remove(id).ok_or_else(|| not_found(id))?;
        tracing::info!(company_id = id, actor = %ctx.current_actor(), "company deleted");
        Ok(company)
    }

    pub async fn disable(
        &self,
        ctx: &PrincipalContext,
        id: CompanyId,
    ) -> Result<Company, ServiceError> {
        self.guard(ctx, Operation::DisableCompany)?;
        self.set_active(ctx, id, false).await
    }

    pub async fn reactivate(
        &self,
        ctx: &PrincipalContext,
        id: CompanyId,
    ) -> Result<Company, ServiceError> {
        self.guard(ctx, Operation::ReactivateCompany)?;
        self.set_active(ctx, id, true).await
    }

    async fn set_active(
        &self,
        ctx: &PrincipalContext,
        id: CompanyId,
        active: bool,
    ) -> Result<Company, ServiceError> {
        let mut store = self.store.write().await;
        let company = store.get_mut(id).ok_or_else(|| not_found(id))?;
        company.active = active;
        company.audit.touch(ctx);
        tracing::info!(
            company_id = id,
            active,
            actor = %company.audit.modified_by,
            "company status changed"
        );
        Ok(company.clone())
    }

    /// Import rows one by one. Bad rows are reported and skipped; the rest
    /// are stored.
    pub async fn bulk_import(
        &self,
        ctx: &PrincipalContext,
        rows: &[CompanyInput],
    ) -> Result<BulkImportResult, ServiceError> {
        self.guard(ctx, Operation::BulkImportCompanies)?;
        if rows.is_empty() {
            return Err(ServiceError::Validation(
                "Company data list cannot be empty".to_string(),
            ));
        }

        let mut store = self.store.write().await;
        let mut seen = HashSet::new();
        let mut imported = Vec::new();
        let mut failures = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let row_number = index + 1;
            let new = match NewCompany::try_from(row) {
                Ok(new) => new,
                Err(message) => {
                    failures.push(ImportFailure { row: row_number, message });
                    continue;
                }
            };

            let message = if !seen.insert(new.registration_number.clone()) {
                Some(format!(
                    "Duplicate registration number '{}' in batch",
                    new.registration_number
                ))
            } else if store.registration_taken(&new.registration_number, None) {
                Some(duplicate(&new.registration_number))
            } else {
                None
            };
            if let Some(message) = message {
                failures.push(ImportFailure { row: row_number, message });
                continue;
            }

            imported.push(store.insert(
                new.company_name,
                new.registration_number,
                new.active,
                AuditStamp::created(ctx),
            ));
        }

        tracing::info!(
            imported = imported.len(),
            failed = failures.len(),
            actor = %ctx.current_actor(),
            "bulk company import finished"
        );

        Ok(BulkImportResult {
            success_count: imported.len(),
            failure_count: failures.len(),
            failures,
            imported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::fixtures::context;
    use crate::auth::{SecurityProfile, Tier, SYSTEM_ACTOR};
    use std::collections::BTreeMap;

    fn service() -> CompanyService {
        service_with(AccessPolicy::default())
    }

    fn service_with(policy: AccessPolicy) -> CompanyService {
        CompanyService::new(Arc::new(RwLock::new(InMemoryStore::new())), Arc::new(policy))
    }

    fn input(name: &str, registration: &str) -> CompanyInput {
        CompanyInput {
            company_name: Some(name.to_string()),
            registration_number: Some(registration.to_string()),
            active: None,
        }
    }

    #[tokio::test]
    async fn scenario_e_writes_are_stamped_with_username() {
        let svc = service();
        let alice = context(Some("alice.ops"), &[Tier::AppAdmin]);

        let created = svc.create(&alice, &input("Acme Ltd", "U100")).await.unwrap();
        assert_eq!(created.audit.created_by, "alice.ops");
        assert_eq!(created.audit.modified_by, "alice.ops");
        assert!(created.active);

        let bob = context(Some("bob"), &[Tier::PlatformAdmin]);
        let disabled = svc.disable(&bob, created.id).await.unwrap();
        assert!(!disabled.active);
        assert_eq!(disabled.audit.created_by, "alice.ops");
        assert_eq!(disabled.audit.modified_by, "bob");
    }

    #[tokio::test]
    async fn operations_are_guarded_independently_of_routes() {
        let svc = service();
        let user = context(Some("jdoe"), &[Tier::User]);
        assert_eq!(
            svc.create(&user, &input("Acme", "U1")).await,
            Err(ServiceError::Auth(AuthError::Forbidden))
        );
        assert_eq!(
            svc.search(&PrincipalContext::anonymous(), &CompanySearch::default()).await,
            Err(ServiceError::Auth(AuthError::Unauthenticated))
        );
    }

    #[tokio::test]
    async fn operation_tier_override_applies() {
        let svc = service_with(AccessPolicy::new(
            AccessPolicy::default_rules(),
            BTreeMap::from([(Operation::DeleteCompany, Tier::PlatformAdmin)]),
            SecurityProfile::Enforced,
        ));
        let app_admin = context(Some("ops"), &[Tier::AppAdmin]);
        let created = svc.create(&app_admin, &input("Acme", "U1")).await.unwrap();

        assert_eq!(
            svc.delete(&app_admin, created.id).await,
            Err(ServiceError::Auth(AuthError::Forbidden))
        );
        let root = context(Some("root"), &[Tier::PlatformAdmin]);
        assert_eq!(svc.delete(&root, created.id).await.unwrap().id, created.id);
        assert!(matches!(svc.get(&root, created.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_validates_and_rejects_duplicates() {
        let svc = service();
        let ops = context(Some("ops"), &[Tier::AppAdmin]);

        let blank = CompanyInput {
            company_name: Some("   ".into()),
            ..input("", "U1")
        };
        assert_eq!(
            svc.create(&ops, &blank).await,
            Err(ServiceError::Validation("Company name is required".into()))
        );

        svc.create(&ops, &input("Acme", " U1 ")).await.unwrap();
        assert!(matches!(
            svc.create(&ops, &input("Other", "U1")).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let svc = service();
        let ops = context(Some("ops"), &[Tier::AppAdmin]);
        let acme = svc.create(&ops, &input("Acme", "U1")).await.unwrap();
        svc.create(&ops, &input("Globex", "U2")).await.unwrap();

        let renamed = svc
            .update(
                &ops,
                acme.id,
                &CompanyUpdate {
                    company_name: Some("Acme Holdings".into()),
                    registration_number: Some("  ".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.company_name, "Acme Holdings");
        assert_eq!(renamed.registration_number, "U1");

        let clash = svc
            .update(
                &ops,
                acme.id,
                &CompanyUpdate {
                    company_name: None,
                    registration_number: Some("U2".into()),
                },
            )
            .await;
        assert!(matches!(clash, Err(ServiceError::Conflict(_))));

        let same = svc
            .update(
                &ops,
                acme.id,
                &CompanyUpdate {
                    company_name: None,
                    registration_number: Some("U1".into()),
                },
            )
            .await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn bulk_import_reports_bad_rows_and_keeps_good_ones() {
        let svc = service();
        let ops = context(Some("ops"), &[Tier::AppAdmin]);
        svc.create(&ops, &input("Existing", "E1")).await.unwrap();

        let rows = vec![
            input("Acme", "U1"),
            CompanyInput {
                company_name: None,
                ..input("", "U2")
            },
            input("Acme Copy", "U1"),
            input("Clash", "E1"),
            CompanyInput {
                active: Some(false),
                ..input("Dormant", "U3")
            },
        ];

        let result = svc.bulk_import(&ops, &rows).await.unwrap();
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 3);
        assert_eq!(
            result.failures.iter().map(|f| f.row).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert!(result.failures[1].message.contains("in batch"));
        assert!(result.failures[2].message.contains("already exists"));
        assert!(!result.imported[1].active);
        assert!(result.imported.iter().all(|c| c.audit.created_by == "ops"));

        assert!(matches!(
            svc.bulk_import(&ops, &[]).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn dev_profile_stamps_system_actor() {
        let svc = service_with(AccessPolicy::new(
            AccessPolicy::default_rules(),
            BTreeMap::new(),
            SecurityProfile::DevNoAuth,
        ));
        let created = svc
            .create(&PrincipalContext::anonymous(), &input("Acme", "U1"))
            .await
            .unwrap();
        assert_eq!(created.audit.created_by, SYSTEM_ACTOR);
    }
}
