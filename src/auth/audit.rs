// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit attribution for records written on behalf of a principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::principal::PrincipalContext;

/// Actor recorded when no authenticated identity is present.
pub const SYSTEM_ACTOR: &str = "system";

/// Username if present, else subject, else [`SYSTEM_ACTOR`].
pub fn current_actor(ctx: &PrincipalContext) -> String {
    ctx.username()
        .filter(|name| !name.trim().is_empty())
        .or_else(|| ctx.subject().filter(|sub| !sub.is_empty()))
        .unwrap_or(SYSTEM_ACTOR)
        .to_string()
}

/// Who created and last modified a record, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditStamp {
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub modified_by: String,
    pub modified_at: DateTime<Utc>,
}

impl AuditStamp {
    /// Stamp for a record created in this request.
    pub fn created(ctx: &PrincipalContext) -> Self {
        let actor = current_actor(ctx);
        let now = Utc::now();
        Self {
            created_by: actor.clone(),
            created_at: now,
            modified_by: actor,
            modified_at: now,
        }
    }

    /// Record a modification. Creation fields are left alone.
    pub fn touch(&mut self, ctx: &PrincipalContext) {
        self.modified_by = current_actor(ctx);
        self.modified_at = Utc::now();
    }
}
