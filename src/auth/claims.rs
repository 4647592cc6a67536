// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified token claims.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AuthError;

/// Where the identity provider places each claim in the token payload.
///
/// Paths are dot-separated, so `realm_access.roles` reads the `roles` member
/// of the `realm_access` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimPaths {
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub groups: String,
    pub roles: String,
}

impl Default for ClaimPaths {
    fn default() -> Self {
        Self {
            username: "preferred_username".to_string(),
            email: "email".to_string(),
            display_name: "name".to_string(),
            groups: "groups".to_string(),
            roles: "realm_access.roles".to_string(),
        }
    }
}

/// Claims of a token whose signature and temporal claims have been verified.
///
/// Only [`TokenValidator`](super::TokenValidator) builds this type. Optional
/// fields stay `None` when the provider omits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    subject: String,
    username: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    roles: BTreeSet<String>,
    groups: BTreeSet<String>,
    issuer: String,
    expires_at: DateTime<Utc>,
    issued_at: DateTime<Utc>,
}

impl Claims {
    /// Build claims from a payload that has already passed verification.
    pub(crate) fn from_payload(payload: &Value, paths: &ClaimPaths) -> Result<Self, AuthError> {
        let subject = non_empty_string(payload.get("sub")).ok_or(AuthError::MalformedToken)?;
        let issuer = non_empty_string(payload.get("iss")).ok_or(AuthError::MalformedToken)?;
        let expires_at = timestamp(payload.get("exp")).ok_or(AuthError::MalformedToken)?;
        let issued_at = timestamp(payload.get("iat")).ok_or(AuthError::MalformedToken)?;

        Ok(Self {
            subject,
            username: non_empty_string(lookup(payload, &paths.username)),
            email: non_empty_string(lookup(payload, &paths.email)),
            display_name: non_empty_string(lookup(payload, &paths.display_name)),
            roles: string_set(lookup(payload, &paths.roles)),
            groups: string_set(lookup(payload, &paths.groups)),
            issuer,
            expires_at,
            issued_at,
        })
    }

    /// Stable provider-assigned identifier (`sub`).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Raw labels from the legacy role channel.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Raw labels from the group channel.
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Resolve a dot-separated claim path.
fn lookup<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.')
        .try_fold(payload, |value, segment| value.get(segment))
}

/// Verbatim string value, unless blank.
fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn label(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Accepts either a list of strings or a single string. Anything else is empty.
fn string_set(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(label).collect(),
        Some(single @ Value::String(_)) => label(single).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}
