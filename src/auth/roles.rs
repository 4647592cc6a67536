// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission tiers and the mapping from provider labels to tiers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::claims::Claims;

/// Internal permission tiers.
///
/// ## Tier Hierarchy
///
/// - `PlatformAdmin` - Operates the whole platform
/// - `AppAdmin` - Administers application data (companies, imports)
/// - `User` - Any recognised member
///
/// Which tier implies which is decided by [`TierHierarchy`], not by the
/// declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Any recognised member
    User,
    /// Application administrator
    AppAdmin,
    /// Platform administrator
    PlatformAdmin,
}

impl Tier {
    /// Every tier, lowest first.
    pub const ALL: [Tier; 3] = [Tier::User, Tier::AppAdmin, Tier::PlatformAdmin];

    /// Tier required by resources that only ask for "a recognised member".
    pub fn lowest() -> Tier {
        Tier::User
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::User => "user",
            Tier::AppAdmin => "app-admin",
            Tier::PlatformAdmin => "platform-admin",
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tier '{s}'"))
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tiers held by a principal, already closed under the hierarchy.
///
/// Built by [`TierHierarchy::closure_of`], so membership alone answers
/// "does this principal satisfy tier X".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet(BTreeSet<Tier>);

impl PermissionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, tier: Tier) -> bool {
        self.0.contains(&tier)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tier> + '_ {
        self.0.iter().copied()
    }
}

/// Static table of which tier implies which lower tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierHierarchy {
    /// Transitive closure, including the tier itself.
    closure: BTreeMap<Tier, BTreeSet<Tier>>,
}

impl TierHierarchy {
    /// Build from direct implications, e.g. `PlatformAdmin -> [AppAdmin]`.
    pub fn new(direct: &BTreeMap<Tier, Vec<Tier>>) -> Self {
        let closure = Tier::ALL
            .into_iter()
            .map(|tier| {
                let mut reached = BTreeSet::from([tier]);
                let mut pending = vec![tier];
                while let Some(current) = pending.pop() {
                    for &implied in direct.get(&current).into_iter().flatten() {
                        if reached.insert(implied) {
                            pending.push(implied);
                        }
                    }
                }
                (tier, reached)
            })
            .collect();
        Self { closure }
    }

    /// The default ladder: platform-admin ⊇ app-admin ⊇ user.
    pub fn default_direct() -> BTreeMap<Tier, Vec<Tier>> {
        BTreeMap::from([
            (Tier::PlatformAdmin, vec![Tier::AppAdmin]),
            (Tier::AppAdmin, vec![Tier::User]),
        ])
    }

    /// Expand granted tiers into everything they imply.
    pub fn closure_of(&self, granted: impl IntoIterator<Item = Tier>) -> PermissionSet {
        let mut tiers = BTreeSet::new();
        for tier in granted {
            match self.closure.get(&tier) {
                Some(implied) => tiers.extend(implied.iter().copied()),
                None => {
                    tiers.insert(tier);
                }
            }
        }
        PermissionSet(tiers)
    }
}

impl Default for TierHierarchy {
    fn default() -> Self {
        Self::new(&Self::default_direct())
    }
}

/// Which claim channel wins when both carry recognised labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelPrecedence {
    /// Union of recognised labels from both channels
    #[default]
    Union,
    /// Groups only; roles are consulted when groups yield nothing recognised
    GroupsFirst,
    /// Roles only; groups are consulted when roles yield nothing recognised
    RolesFirst,
}

/// Translates provider role/group labels into a [`PermissionSet`].
#[derive(Debug, Clone)]
pub struct AuthorityMapper {
    labels: HashMap<String, Tier>,
    hierarchy: TierHierarchy,
    precedence: ChannelPrecedence,
}

impl AuthorityMapper {
    pub fn new(
        labels: impl IntoIterator<Item = (String, Tier)>,
        hierarchy: TierHierarchy,
        precedence: ChannelPrecedence,
    ) -> Self {
        Self {
            labels: labels.into_iter().collect(),
            hierarchy,
            precedence,
        }
    }

    /// Provider labels used by the Nexus realm: groups plus legacy realm roles.
    pub fn default_labels() -> BTreeMap<String, Tier> {
        [
            ("platform-admins", Tier::PlatformAdmin),
            ("app-admins", Tier::AppAdmin),
            ("users", Tier::User),
            ("nexus-admin", Tier::PlatformAdmin),
            ("nexus-manager", Tier::AppAdmin),
            ("nexus-user", Tier::User),
        ]
        .into_iter()
        .map(|(label, tier)| (label.to_string(), tier))
        .collect()
    }

    /// Map a verified token's labels to tiers. Unknown labels are dropped.
    pub fn map_to_permissions(&self, claims: &Claims) -> PermissionSet {
        let from_groups = self.recognise(claims.groups());
        let from_roles = self.recognise(claims.roles());

        let granted = match self.precedence {
            ChannelPrecedence::Union => from_groups.union(&from_roles).copied().collect(),
            ChannelPrecedence::GroupsFirst if !from_groups.is_empty() => from_groups,
            ChannelPrecedence::GroupsFirst => from_roles,
            ChannelPrecedence::RolesFirst if !from_roles.is_empty() => from_roles,
            ChannelPrecedence::RolesFirst => from_groups,
        };

        self.hierarchy.closure_of(granted)
    }

    fn recognise(&self, labels: &BTreeSet<String>) -> BTreeSet<Tier> {
        labels
            .iter()
            .filter_map(|label| {
                // Keycloak emits full group paths ("/app-admins") when configured to.
                let normalised = label.strip_prefix('/').unwrap_or(label);
                let tier = self.labels.get(normalised).copied();
                if tier.is_none() {
                    tracing::trace!(label = %label, "ignoring unrecognised entitlement label");
                }
                tier
            })
            .collect()
    }
}

impl Default for AuthorityMapper {
    fn default() -> Self {
        Self::new(
            Self::default_labels(),
            TierHierarchy::default(),
            ChannelPrecedence::default(),
        )
    }
}
