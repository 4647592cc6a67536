// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory company store.
//!
//! Plain storage with no access checks or validation; [`CompanyService`]
//! owns both and is the only writer.
//!
//! [`CompanyService`]: crate::service::CompanyService

use std::collections::BTreeMap;

use crate::auth::AuditStamp;
use crate::models::{Company, CompanyId, CompanySearch};

#[derive(Default)]
pub struct InMemoryStore {
    companies: BTreeMap<CompanyId, Company>,
    last_id: CompanyId,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CompanyId) -> Option<&Company> {
        self.companies.get(&id)
    }

    pub fn get_mut(&mut self, id: CompanyId) -> Option<&mut Company> {
        self.companies.get_mut(&id)
    }

    /// Whether another company (not `except`) already uses `registration_number`.
    pub fn registration_taken(&self, registration_number: &str, except: Option<CompanyId>) -> bool {
        self.companies
            .values()
            .any(|c| c.registration_number == registration_number && Some(c.id) != except)
    }

    pub fn insert(
        &mut self,
        company_name: String,
        registration_number: String,
        active: bool,
        audit: AuditStamp,
    ) -> Company {
        self.last_id += 1;
        let company = Company {
            id: self.last_id,
            company_name,
            registration_number,
            active,
            audit,
        };
        self.companies.insert(company.id, company.clone());
        company
    }

    pub fn remove(&mut self, id: CompanyId) -> Option<Company> {
        self.companies.remove(&id)
    }

    pub fn search(&self, criteria: &CompanySearch) -> Vec<Company> {
        let needle = criteria
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        self.companies
            .values()
            .filter(|c| criteria.active.is_none_or(|active| c.active == active))
            .filter(|c| {
                needle.as_deref().is_none_or(|needle| {
                    c.company_name.to_lowercase().contains(needle)
                        || c.registration_number.to_lowercase().contains(needle)
                })
            })
            .cloned()
            .collect()
    }
}
