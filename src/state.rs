// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;
use tokio::sync::RwLock;

use crate::auth::jwks::JwksManager;
use crate::auth::policy::{AccessPolicy, SecurityProfile};
use crate::auth::roles::AuthorityMapper;
use crate::auth::validator::TokenValidator;
use crate::config::{AppConfig, ConfigError};
use crate::service::CompanyService;
use crate::store::InMemoryStore;

/// Everything the access middleware needs. Immutable after startup.
#[derive(Clone)]
pub struct AuthState {
    /// Absent only under `dev-no-auth` without an issuer.
    pub validator: Option<TokenValidator>,
    pub mapper: Arc<AuthorityMapper>,
    pub policy: Arc<AccessPolicy>,
}

impl AuthState {
    pub fn new(
        validator: Option<TokenValidator>,
        mapper: AuthorityMapper,
        policy: AccessPolicy,
    ) -> Self {
        Self {
            validator,
            mapper: Arc::new(mapper),
            policy: Arc::new(policy),
        }
    }

    pub fn profile(&self) -> SecurityProfile {
        self.policy.profile()
    }

    pub fn keys(&self) -> Option<&JwksManager> {
        self.validator.as_ref().map(TokenValidator::keys)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
    pub companies: CompanyService,
}

impl AppState {
    pub fn new(auth: AuthState, store: InMemoryStore) -> Self {
        let companies = CompanyService::new(Arc::new(RwLock::new(store)), auth.policy.clone());
        Self { auth, companies }
    }

    /// Build the state described by `config`. No network I/O happens here.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let validator = match &config.auth {
            Some(auth) => {
                let keys = JwksManager::new(auth.key_source.clone(), auth.jwks)?;
                Some(TokenValidator::new(
                    keys,
                    auth.validator_settings(&config.policy.claim_paths),
                ))
            }
            None => None,
        };

        let auth = AuthState::new(
            validator,
            config.policy.mapper()?,
            config.policy.access_policy(config.profile),
        );
        Ok(Self::new(auth, InMemoryStore::new()))
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
