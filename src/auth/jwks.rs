// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Cache policy
//!
//! - Keys are cached with a configurable TTL
//! - A token carrying an unknown `kid` triggers a refetch (key rotation),
//!   at most once per `min_refresh_interval`
//! - Only one fetch runs at a time; while it runs, readers keep using the
//!   stale key set and callers waiting for the slot reuse its outcome
//! - A stale key set is served when a TTL refresh fails, and a failed fetch
//!   is not retried within `min_refresh_interval`
//! - Every fetch is bounded by `fetch_timeout`, discovery included
//!
//! The key set URL is either configured directly or discovered through the
//! issuer's `/.well-known/openid-configuration` document.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{Mutex, OnceCell, RwLock};
use url::Url;

use super::error::AuthError;

/// Default JWKS cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default minimum gap between refetches caused by unknown key ids.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Default upper bound on a single key fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the key set comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Fetch the key set from this URL.
    Jwks(Url),
    /// Resolve `jwks_uri` from the issuer's OpenID configuration first.
    Discovery(Url),
}

impl KeySource {
    /// Discovery source for an issuer base URL.
    pub fn discover(issuer: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(&format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        ))?;
        Ok(KeySource::Discovery(url))
    }
}

/// Cache tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JwksSettings {
    pub cache_ttl: Duration,
    pub min_refresh_interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for JwksSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Last successfully fetched key set.
struct CacheEntry {
    jwks: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Most recent fetch, successful or not.
struct Attempt {
    finished_at: Instant,
    outcome: Result<Arc<JwkSet>, AuthError>,
}

#[derive(Default)]
struct CacheState {
    keys: Option<CacheEntry>,
    last_attempt: Option<Attempt>,
}

impl CacheState {
    /// Outcome of the last attempt if it finished after `requested_at` or
    /// less than `window` ago.
    fn reusable(
        &self,
        requested_at: Instant,
        window: Duration,
    ) -> Option<Result<Arc<JwkSet>, AuthError>> {
        self.last_attempt
            .as_ref()
            .filter(|a| a.finished_at >= requested_at || a.finished_at.elapsed() < window)
            .map(|a| a.outcome.clone())
    }
}

#[derive(Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: Url,
}

/// JWKS manager with caching.
///
/// Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct JwksManager {
    source: KeySource,
    settings: JwksSettings,
    state: Arc<RwLock<CacheState>>,
    /// Held for the duration of a fetch
    refresh_lock: Arc<Mutex<()>>,
    /// `jwks_uri` resolved through discovery
    resolved_uri: Arc<OnceCell<Url>>,
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager.
    pub fn new(source: KeySource, settings: JwksSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()?;

        Ok(Self {
            source,
            settings,
            state: Arc::new(RwLock::new(CacheState::default())),
            refresh_lock: Arc::new(Mutex::new(())),
            resolved_uri: Arc::new(OnceCell::new()),
            client,
        })
    }

    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// Check if JWKS is currently cached and fresh.
    pub async fn is_cached(&self) -> bool {
        let state = self.state.read().await;
        state
            .keys
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.settings.cache_ttl)
    }

    /// Refresh the JWKS cache.
    ///
    /// An attempt that finished within `min_refresh_interval` is reused,
    /// including its failure.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        self.refresh_since(Instant::now(), self.settings.min_refresh_interval)
            .await
            .map(|_| ())
    }

    /// Get a decoding key for the given key ID.
    ///
    /// Tokens without a `kid` are accepted only when the key set holds
    /// exactly one signing key.
    pub async fn decoding_key(
        &self,
        kid: Option<&str>,
    ) -> Result<(DecodingKey, Algorithm), AuthError> {
        let jwks = self.current().await?;
        if let Some(jwk) = select_key(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        if !self.may_refresh_on_miss().await {
            tracing::debug!(kid = ?kid, "unknown key id, refresh suppressed");
            return Err(AuthError::InvalidSignature);
        }

        tracing::info!(kid = ?kid, "unknown key id, refreshing key set");
        let jwks = self.refresh_since(Instant::now(), Duration::ZERO).await?;
        select_key(&jwks, kid)
            .ok_or(AuthError::InvalidSignature)
            .and_then(jwk_to_decoding_key)
    }

    /// Fresh key set, revalidating when the TTL has passed.
    ///
    /// While a stale set exists, only one caller fetches; everyone else keeps
    /// using the stale set, also when that fetch fails.
    async fn current(&self) -> Result<Arc<JwkSet>, AuthError> {
        let requested_at = Instant::now();
        let window = self.settings.min_refresh_interval;
        let stale = {
            let state = self.state.read().await;
            match &state.keys {
                Some(entry) if entry.fetched_at.elapsed() < self.settings.cache_ttl => {
                    return Ok(entry.jwks.clone());
                }
                Some(entry) => Some(entry.jwks.clone()),
                None => None,
            }
        };

        let Some(stale) = stale else {
            return self.refresh_since(requested_at, window).await;
        };

        let Ok(_guard) = self.refresh_lock.try_lock() else {
            return Ok(stale);
        };
        match self.fetch_unless_recent(requested_at, window).await {
            Ok(jwks) => Ok(jwks),
            Err(err) => {
                tracing::debug!(error = %err, "serving stale keys");
                Ok(stale)
            }
        }
    }

    async fn may_refresh_on_miss(&self) -> bool {
        let state = self.state.read().await;
        state
            .last_attempt
            .as_ref()
            .is_none_or(|a| a.finished_at.elapsed() >= self.settings.min_refresh_interval)
    }

    /// Wait for the fetch slot, then fetch unless a usable attempt exists.
    async fn refresh_since(
        &self,
        requested_at: Instant,
        window: Duration,
    ) -> Result<Arc<JwkSet>, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_unless_recent(requested_at, window).await
    }

    /// Caller must hold `refresh_lock`.
    async fn fetch_unless_recent(
        &self,
        requested_at: Instant,
        window: Duration,
    ) -> Result<Arc<JwkSet>, AuthError> {
        let recent = self.state.read().await.reusable(requested_at, window);
        if let Some(outcome) = recent {
            return outcome;
        }

        let fetch = tokio::time::timeout(self.settings.fetch_timeout, self.fetch_jwks());
        let outcome = match fetch.await {
            Ok(fetched) => fetched.map(Arc::new),
            Err(_) => Err(AuthError::KeyFetchFailed(format!(
                "no response within {:?}",
                self.settings.fetch_timeout
            ))),
        };
        match &outcome {
            Ok(jwks) => tracing::info!(keys = jwks.keys.len(), "signing key set refreshed"),
            Err(err) => tracing::warn!(error = %err, "signing key set refresh failed"),
        }

        let mut state = self.state.write().await;
        let now = Instant::now();
        if let Ok(jwks) = &outcome {
            state.keys = Some(CacheEntry {
                jwks: jwks.clone(),
                fetched_at: now,
            });
        }
        state.last_attempt = Some(Attempt {
            finished_at: now,
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn jwks_url(&self) -> Result<Url, AuthError> {
        match &self.source {
            KeySource::Jwks(url) => Ok(url.clone()),
            KeySource::Discovery(config_url) => self
                .resolved_uri
                .get_or_try_init(|| async {
                    let config: OpenIdConfiguration = self.get_json(config_url).await?;
                    tracing::debug!(jwks_uri = %config.jwks_uri, "discovered key set endpoint");
                    Ok::<_, AuthError>(config.jwks_uri)
                })
                .await
                .cloned(),
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let url = self.jwks_url().await?;
        self.get_json(&url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &Url) -> Result<T, AuthError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AuthError::KeyFetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetchFailed(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetchFailed(e.to_string()))
    }
}

fn is_signing_key(jwk: &Jwk) -> bool {
    !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
}

fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks
            .keys
            .iter()
            .filter(|k| is_signing_key(k))
            .find(|k| k.common.key_id.as_deref() == Some(kid)),
        None => {
            let mut signing = jwks.keys.iter().filter(|k| is_signing_key(k));
            match (signing.next(), signing.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        }
    }
}

/// Convert a JWK to a DecodingKey. Symmetric keys are never accepted.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| AuthError::InvalidSignature)?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                Some(KeyAlgorithm::PS256) => Algorithm::PS256,
                Some(KeyAlgorithm::PS384) => Algorithm::PS384,
                Some(KeyAlgorithm::PS512) => Algorithm::PS512,
                _ => Algorithm::RS256,
            };
            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|_| AuthError::InvalidSignature)?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };
            Ok((key, alg))
        }
        AlgorithmParameters::OctetKeyPair(okp) => {
            let key = DecodingKey::from_ed_components(&okp.x)
                .map_err(|_| AuthError::InvalidSignature)?;
            Ok((key, Algorithm::EdDSA))
        }
        _ => Err(AuthError::InvalidSignature),
    }
}
