// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access policy: the route table and the operation table.
//!
//! Both guard points evaluate through [`permits`]. The route table is checked
//! by the access middleware before any handler runs; the operation table is
//! checked by business services at the top of each operation, so an operation
//! reachable from REST and from `/graphql` is governed by one entry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::principal::PrincipalContext;
use super::roles::{PermissionSet, Tier};

/// Whether `actual` satisfies `required`.
///
/// `actual` is closed under the tier hierarchy, so membership is enough.
pub fn permits(required: Tier, actual: &PermissionSet) -> bool {
    actual.contains(required)
}

/// What a resource demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Access {
    /// No token needed; validation is skipped entirely
    Public,
    /// Any valid token, whatever its tiers
    Authenticated,
    /// A valid token holding this tier
    Tier(Tier),
}

impl FromStr for Access {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Access::Public),
            "authenticated" => Ok(Access::Authenticated),
            other => other.parse().map(Access::Tier),
        }
    }
}

impl TryFrom<String> for Access {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Access> for String {
    fn from(access: Access) -> Self {
        access.to_string()
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => f.write_str("public"),
            Access::Authenticated => f.write_str("authenticated"),
            Access::Tier(tier) => tier.fmt(f),
        }
    }
}

/// Path pattern in the usual `/api/admin/**` style.
///
/// `*` matches one segment, `**` matches any number of segments (including
/// none), anything else matches literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePattern {
    raw: String,
    segments: Vec<String>,
}

impl ResourcePattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = split_segments(&raw).map(str::to_string).collect();
        Self { raw, segments }
    }

    pub fn matches(&self, resource: &str) -> bool {
        let target: Vec<&str> = split_segments(resource).collect();
        match_segments(&self.segments, &target)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[String], target: &[&str]) -> bool {
    match pattern.split_first() {
        None => target.is_empty(),
        Some((head, rest)) if head == "**" => {
            (0..=target.len()).any(|skip| match_segments(rest, &target[skip..]))
        }
        Some((head, rest)) => match target.split_first() {
            Some((segment, remaining)) if head == "*" || head == segment => {
                match_segments(rest, remaining)
            }
            _ => false,
        },
    }
}

/// One row of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub struct AccessRule {
    pub pattern: ResourcePattern,
    pub access: Access,
}

impl AccessRule {
    pub fn new(pattern: &str, access: Access) -> Self {
        Self {
            pattern: ResourcePattern::new(pattern),
            access,
        }
    }
}

/// Serialized shape of an [`AccessRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRule {
    pattern: String,
    access: Access,
}

impl TryFrom<RawRule> for AccessRule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        if !raw.pattern.starts_with('/') {
            return Err(format!("rule pattern '{}' must start with '/'", raw.pattern));
        }
        Ok(AccessRule::new(&raw.pattern, raw.access))
    }
}

impl From<AccessRule> for RawRule {
    fn from(rule: AccessRule) -> Self {
        Self {
            pattern: rule.pattern.raw,
            access: rule.access,
        }
    }
}

/// Business operations guarded independently of the route that reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operation {
    QueryCompanies,
    GetCompany,
    CreateCompany,
    UpdateCompany,
    DeleteCompany,
    DisableCompany,
    ReactivateCompany,
    BulkImportCompanies,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::QueryCompanies,
        Operation::GetCompany,
        Operation::CreateCompany,
        Operation::UpdateCompany,
        Operation::DeleteCompany,
        Operation::DisableCompany,
        Operation::ReactivateCompany,
        Operation::BulkImportCompanies,
    ];

    /// Operation name as used by `/graphql` clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::QueryCompanies => "companies",
            Operation::GetCompany => "company",
            Operation::CreateCompany => "createCompany",
            Operation::UpdateCompany => "updateCompany",
            Operation::DeleteCompany => "deleteCompany",
            Operation::DisableCompany => "disableCompany",
            Operation::ReactivateCompany => "reactivateCompany",
            Operation::BulkImportCompanies => "bulkImportCompanies",
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

impl TryFrom<String> for Operation {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the guards are applied at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityProfile {
    #[default]
    Enforced,
    /// Every request and operation is permitted. Development builds only.
    DevNoAuth,
}

/// Immutable route and operation tables, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
    operations: BTreeMap<Operation, Tier>,
    profile: SecurityProfile,
}

impl AccessPolicy {
    /// Build a policy. Operations missing from `operations` fall back to the
    /// default operation table.
    pub fn new(
        rules: Vec<AccessRule>,
        operations: BTreeMap<Operation, Tier>,
        profile: SecurityProfile,
    ) -> Self {
        let mut table = Self::default_operations();
        table.extend(operations);
        Self {
            rules,
            operations: table,
            profile,
        }
    }

    pub fn default_rules() -> Vec<AccessRule> {
        vec![
            AccessRule::new("/api/public/**", Access::Public),
            AccessRule::new("/actuator/health", Access::Public),
            AccessRule::new("/swagger-ui/**", Access::Public),
            AccessRule::new("/v3/api-docs/**", Access::Public),
            AccessRule::new("/api/admin/**", Access::Tier(Tier::PlatformAdmin)),
            AccessRule::new("/api/manager/**", Access::Tier(Tier::AppAdmin)),
            AccessRule::new("/api/user/**", Access::Tier(Tier::User)),
            AccessRule::new("/graphql", Access::Authenticated),
        ]
    }

    pub fn default_operations() -> BTreeMap<Operation, Tier> {
        Operation::ALL
            .into_iter()
            .map(|op| (op, Tier::AppAdmin))
            .collect()
    }

    pub fn profile(&self) -> SecurityProfile {
        self.profile
    }

    pub fn is_enforced(&self) -> bool {
        self.profile == SecurityProfile::Enforced
    }

    /// First matching rule wins; unmatched resources need the lowest tier.
    pub fn resolve(&self, resource: &str) -> Access {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(resource))
            .map(|rule| rule.access)
            .unwrap_or(Access::Tier(Tier::lowest()))
    }

    pub fn is_public(&self, resource: &str) -> bool {
        !self.is_enforced() || self.resolve(resource) == Access::Public
    }

    /// Coarse guard for a transport-level resource.
    pub fn check(&self, resource: &str, ctx: &PrincipalContext) -> Result<(), AuthError> {
        if !self.is_enforced() {
            return Ok(());
        }
        evaluate(self.resolve(resource), ctx)
    }

    pub fn required_tier(&self, operation: Operation) -> Tier {
        self.operations
            .get(&operation)
            .copied()
            .unwrap_or(Tier::PlatformAdmin)
    }

    /// Fine guard for a business operation.
    pub fn require_operation(
        &self,
        ctx: &PrincipalContext,
        operation: Operation,
    ) -> Result<(), AuthError> {
        if !self.is_enforced() {
            return Ok(());
        }
        evaluate(Access::Tier(self.required_tier(operation)), ctx).inspect_err(|_| {
            tracing::debug!(operation = %operation, "operation guard denied");
        })
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(
            Self::default_rules(),
            BTreeMap::new(),
            SecurityProfile::Enforced,
        )
    }
}

fn evaluate(access: Access, ctx: &PrincipalContext) -> Result<(), AuthError> {
    match access {
        Access::Public => Ok(()),
        Access::Authenticated if ctx.is_authenticated() => Ok(()),
        Access::Authenticated => Err(AuthError::Unauthenticated),
        Access::Tier(tier) => ctx.require(tier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::fixtures::context;
    use crate::auth::roles::TierHierarchy;

    #[test]
    fn permits_is_monotonic_over_the_hierarchy() {
        let hierarchy = TierHierarchy::default();
        for (i, &held) in Tier::ALL.iter().enumerate() {
            let set = hierarchy.closure_of([held]);
            for &lower in &Tier::ALL[..=i] {
                assert!(permits(lower, &set), "{held} should satisfy {lower}");
            }
        }
    }

    #[test]
    fn double_star_matches_prefix_and_descendants() {
        let pattern = ResourcePattern::new("/api/admin/**");
        assert!(pattern.matches("/api/admin"));
        assert!(pattern.matches("/api/admin/ping"));
        assert!(pattern.matches("/api/admin/users/42/roles"));
        assert!(!pattern.matches("/api/administrator"));
        assert!(!pattern.matches("/api"));
    }

    #[test]
    fn single_star_matches_one_segment() {
        let pattern = ResourcePattern::new("/api/companies/*/disable");
        assert!(pattern.matches("/api/companies/7/disable"));
        assert!(!pattern.matches("/api/companies/disable"));
        assert!(!pattern.matches("/api/companies/7/8/disable"));
    }

    #[test]
    fn first_match_wins() {
        let policy = AccessPolicy::new(
            vec![
                AccessRule::new("/api/admin/health", Access::Public),
                AccessRule::new("/api/admin/**", Access::Tier(Tier::PlatformAdmin)),
            ],
            BTreeMap::new(),
            SecurityProfile::Enforced,
        );
        assert_eq!(policy.resolve("/api/admin/health"), Access::Public);
        assert_eq!(
            policy.resolve("/api/admin/users"),
            Access::Tier(Tier::PlatformAdmin)
        );
    }

    #[test]
    fn unmatched_resources_require_lowest_tier() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.resolve("/api/companies"), Access::Tier(Tier::User));
    }

    #[test]
    fn scenario_a_platform_admin_reaches_app_admin_resource() {
        let policy = AccessPolicy::default();
        let ctx = context(Some("root"), &[Tier::PlatformAdmin]);
        assert_eq!(policy.check("/api/manager/ping", &ctx), Ok(()));
    }

    #[test]
    fn scenario_b_user_is_forbidden_from_app_admin_resource() {
        let policy = AccessPolicy::default();
        let ctx = context(Some("jdoe"), &[Tier::User]);
        assert_eq!(
            policy.check("/api/manager/ping", &ctx),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn public_resources_never_deny() {
        let policy = AccessPolicy::default();
        for ctx in [
            PrincipalContext::anonymous(),
            context(None, &[]),
            context(Some("jdoe"), &[Tier::User]),
        ] {
            assert_eq!(policy.check("/api/public/ping", &ctx), Ok(()));
            assert_eq!(policy.check("/actuator/health", &ctx), Ok(()));
        }
    }

    #[test]
    fn authenticated_access_accepts_token_without_tiers() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.check("/graphql", &context(None, &[])), Ok(()));
        assert_eq!(
            policy.check("/graphql", &PrincipalContext::anonymous()),
            Err(AuthError::Unauthenticated)
        );
    }

    #[test]
    fn operation_tiers_default_to_app_admin_and_can_be_overridden() {
        let policy = AccessPolicy::new(
            AccessPolicy::default_rules(),
            BTreeMap::from([(Operation::DeleteCompany, Tier::PlatformAdmin)]),
            SecurityProfile::Enforced,
        );
        let app_admin = context(Some("ops"), &[Tier::AppAdmin]);
        assert_eq!(
            policy.require_operation(&app_admin, Operation::CreateCompany),
            Ok(())
        );
        assert_eq!(
            policy.require_operation(&app_admin, Operation::DeleteCompany),
            Err(AuthError::Forbidden)
        );
    }

    #[test]
    fn dev_profile_permits_everything() {
        let policy = AccessPolicy::new(
            AccessPolicy::default_rules(),
            BTreeMap::new(),
            SecurityProfile::DevNoAuth,
        );
        let anonymous = PrincipalContext::anonymous();
        assert!(policy.is_public("/api/admin/ping"));
        assert_eq!(policy.check("/api/admin/ping", &anonymous), Ok(()));
        assert_eq!(
            policy.require_operation(&anonymous, Operation::BulkImportCompanies),
            Ok(())
        );
    }

    #[test]
    fn rules_deserialize_from_config_shape() {
        let rules: Vec<AccessRule> = serde_json::from_str(
            r#"[
                {"pattern": "/api/reports/**", "access": "app-admin"},
                {"pattern": "/status", "access": "public"},
                {"pattern": "/graphql", "access": "authenticated"}
            ]"#,
        )
        .unwrap();
        assert_eq!(rules[0].access, Access::Tier(Tier::AppAdmin));
        assert_eq!(rules[1].access, Access::Public);
        assert_eq!(rules[2].access, Access::Authenticated);

        let bad: Result<Vec<AccessRule>, _> =
            serde_json::from_str(r#"[{"pattern": "/x", "access": "superuser"}]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn operation_names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>(), Ok(op));
        }
        assert!("dropDatabase".parse::<Operation>().is_err());
    }
}
