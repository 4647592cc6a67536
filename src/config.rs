// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variables are read once at startup. Everything that shapes
//! authorization (tier hierarchy, label map, claim paths, route rules,
//! operation tiers, CORS) lives in an optional JSON policy file; anything it
//! leaves out falls back to the built-in defaults.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_ISSUER` | Trusted token issuer (`iss`) | Required unless `dev-no-auth` |
//! | `AUTH_AUDIENCE` | Expected token audience (`aud`) | Not checked |
//! | `AUTH_JWKS_URL` | Key set endpoint | Discovered from the issuer |
//! | `AUTH_JWKS_TIMEOUT_SECS` | Upper bound on one key fetch | `5` |
//! | `AUTH_JWKS_CACHE_TTL_SECS` | Key set freshness | `300` |
//! | `AUTH_JWKS_MIN_REFRESH_SECS` | Minimum gap between unknown-`kid` refetches | `10` |
//! | `AUTH_CLOCK_SKEW_SECS` | Leeway for `exp`, `nbf` and `iat` | `60` |
//! | `AUTH_POLICY_FILE` | JSON policy document | Built-in policy |
//! | `AUTH_PROFILE` | `enforced` or `dev-no-auth` | `enforced` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Policy File
//!
//! ```json
//! {
//!   "hierarchy": { "platform-admin": ["app-admin"], "app-admin": ["user"] },
//!   "labels": { "platform-admins": "platform-admin", "/ops/leads": "app-admin" },
//!   "claimPaths": { "groups": "groups", "roles": "realm_access.roles" },
//!   "precedence": "union",
//!   "rules": [ { "pattern": "/api/public/**", "access": "public" } ],
//!   "operations": { "deleteCompany": "platform-admin" },
//!   "cors": { "allowedOrigins": ["https://app.example.com"] }
//! }
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use serde::Deserialize;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use url::Url;

use crate::auth::claims::ClaimPaths;
use crate::auth::jwks::{
    JwksSettings, KeySource, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MIN_REFRESH_INTERVAL,
};
use crate::auth::policy::{AccessPolicy, AccessRule, Operation, SecurityProfile};
use crate::auth::roles::{AuthorityMapper, ChannelPrecedence, Tier, TierHierarchy};
use crate::auth::validator::{ValidatorSettings, DEFAULT_CLOCK_SKEW};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_JWKS_TIMEOUT_ENV: &str = "AUTH_JWKS_TIMEOUT_SECS";
pub const AUTH_JWKS_CACHE_TTL_ENV: &str = "AUTH_JWKS_CACHE_TTL_SECS";
pub const AUTH_JWKS_MIN_REFRESH_ENV: &str = "AUTH_JWKS_MIN_REFRESH_SECS";
pub const AUTH_CLOCK_SKEW_ENV: &str = "AUTH_CLOCK_SKEW_SECS";
pub const AUTH_POLICY_FILE_ENV: &str = "AUTH_POLICY_FILE";
pub const AUTH_PROFILE_ENV: &str = "AUTH_PROFILE";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Startup configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
    #[error("failed to read policy file {}: {source}", path.display())]
    PolicyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid policy file {}: {source}", path.display())]
    PolicyParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("the dev-no-auth profile is only available in builds with the `dev` feature")]
    DevProfileUnavailable,
    #[error("failed to build key set client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

fn invalid(name: impl Into<String>, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name: name.into(),
        reason: reason.to_string(),
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Token validation settings taken from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub issuer: String,
    pub audience: Option<String>,
    pub key_source: KeySource,
    pub jwks: JwksSettings,
    pub clock_skew: Duration,
}

impl AuthSettings {
    pub fn validator_settings(&self, claim_paths: &ClaimPaths) -> ValidatorSettings {
        ValidatorSettings {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            clock_skew: self.clock_skew,
            claim_paths: claim_paths.clone(),
        }
    }
}

/// Complete startup configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub profile: SecurityProfile,
    /// `None` only under `dev-no-auth` without an issuer.
    pub auth: Option<AuthSettings>,
    pub policy: PolicyDocument,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let profile = match var(AUTH_PROFILE_ENV) {
            Some(raw) => parse_profile(&raw)?,
            None => SecurityProfile::Enforced,
        };

        let auth = match var(AUTH_ISSUER_ENV) {
            Some(issuer) => Some(auth_settings(issuer, &var)?),
            None if profile == SecurityProfile::DevNoAuth => None,
            None => return Err(ConfigError::Missing(AUTH_ISSUER_ENV)),
        };

        let policy = match var(AUTH_POLICY_FILE_ENV) {
            Some(path) => PolicyDocument::load(path)?,
            None => PolicyDocument::default(),
        };

        let port = match var(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|e| invalid(PORT_ENV, e))?,
            None => DEFAULT_PORT,
        };

        let log_format = match var(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse().map_err(|e| invalid(LOG_FORMAT_ENV, e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            host: var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            profile,
            auth,
            policy,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| invalid(HOST_ENV, e))
    }
}

fn parse_profile(raw: &str) -> Result<SecurityProfile, ConfigError> {
    match raw {
        "enforced" => Ok(SecurityProfile::Enforced),
        "dev-no-auth" if cfg!(feature = "dev") => Ok(SecurityProfile::DevNoAuth),
        "dev-no-auth" => Err(ConfigError::DevProfileUnavailable),
        other => Err(invalid(AUTH_PROFILE_ENV, format!("unknown profile '{other}'"))),
    }
}

fn auth_settings(
    issuer: String,
    var: &impl Fn(&str) -> Option<String>,
) -> Result<AuthSettings, ConfigError> {
    let key_source = match var(AUTH_JWKS_URL_ENV) {
        Some(raw) => KeySource::Jwks(Url::parse(&raw).map_err(|e| invalid(AUTH_JWKS_URL_ENV, e))?),
        None => KeySource::discover(&issuer).map_err(|e| invalid(AUTH_ISSUER_ENV, e))?,
    };

    let seconds = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
        match var(name) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| invalid(name, e)),
            None => Ok(default),
        }
    };

    Ok(AuthSettings {
        audience: var(AUTH_AUDIENCE_ENV),
        key_source,
        jwks: JwksSettings {
            cache_ttl: seconds(AUTH_JWKS_CACHE_TTL_ENV, DEFAULT_CACHE_TTL)?,
            min_refresh_interval: seconds(AUTH_JWKS_MIN_REFRESH_ENV, DEFAULT_MIN_REFRESH_INTERVAL)?,
            fetch_timeout: seconds(AUTH_JWKS_TIMEOUT_ENV, DEFAULT_FETCH_TIMEOUT)?,
        },
        clock_skew: seconds(AUTH_CLOCK_SKEW_ENV, DEFAULT_CLOCK_SKEW)?,
        issuer,
    })
}

/// Authorization tables loaded from `AUTH_POLICY_FILE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyDocument {
    /// Direct implications per tier; replaces the default ladder.
    pub hierarchy: Option<BTreeMap<String, Vec<Tier>>>,
    /// Provider label to tier; replaces the default label table.
    pub labels: Option<BTreeMap<String, Tier>>,
    pub claim_paths: ClaimPaths,
    pub precedence: ChannelPrecedence,
    /// Route table in evaluation order; replaces the default table.
    pub rules: Option<Vec<AccessRule>>,
    /// Operation tiers; merged over the defaults.
    pub operations: BTreeMap<Operation, Tier>,
    pub cors: CorsSettings,
}

impl PolicyDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::PolicyFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::PolicyParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn hierarchy(&self) -> Result<TierHierarchy, ConfigError> {
        let Some(direct) = &self.hierarchy else {
            return Ok(TierHierarchy::default());
        };
        let direct = direct
            .iter()
            .map(|(tier, implied)| {
                tier.parse::<Tier>()
                    .map(|tier| (tier, implied.clone()))
                    .map_err(|e| invalid("hierarchy", e))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(TierHierarchy::new(&direct))
    }

    pub fn mapper(&self) -> Result<AuthorityMapper, ConfigError> {
        let labels = self
            .labels
            .clone()
            .unwrap_or_else(AuthorityMapper::default_labels)
            .into_iter()
            // Group paths are matched without their leading slash.
            .map(|(label, tier)| (label.trim_start_matches('/').to_string(), tier));
        Ok(AuthorityMapper::new(labels, self.hierarchy()?, self.precedence))
    }

    pub fn access_policy(&self, profile: SecurityProfile) -> AccessPolicy {
        AccessPolicy::new(
            self.rules.clone().unwrap_or_else(AccessPolicy::default_rules),
            self.operations.clone(),
            profile,
        )
    }
}

/// Browser allow-list. A `*` entry mirrors the request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: true,
            max_age_secs: 3600,
        }
    }
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|value| value == "*")
}

impl CorsSettings {
    pub fn layer(&self) -> Result<CorsLayer, ConfigError> {
        let origins = if is_wildcard(&self.allowed_origins) {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::list(
                self.allowed_origins
                    .iter()
                    .map(|o| {
                        HeaderValue::from_str(o).map_err(|e| invalid("cors.allowedOrigins", e))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };

        let methods = if is_wildcard(&self.allowed_methods) {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::list(
                self.allowed_methods
                    .iter()
                    .map(|m| {
                        Method::from_bytes(m.as_bytes())
                            .map_err(|e| invalid("cors.allowedMethods", e))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };

        let headers = if is_wildcard(&self.allowed_headers) {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::list(
                self.allowed_headers
                    .iter()
                    .map(|h| {
                        HeaderName::from_bytes(h.as_bytes())
                            .map_err(|e| invalid("cors.allowedHeaders", e))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            )
        };

        Ok(CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(self.allow_credentials)
            .max_age(Duration::from_secs(self.max_age_secs)))
    }
}
