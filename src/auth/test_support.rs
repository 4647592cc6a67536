// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token minting and an in-process key-set endpoint for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};
use url::Url;

use super::jwks::{JwksManager, JwksSettings, KeySource};
use super::validator::{TokenValidator, ValidatorSettings};

pub const SIGNING_KID: &str = "nexus-signing-1";
pub const ROGUE_KID: &str = "rogue-1";
pub const TEST_AUDIENCE: &str = "nexus-api";

const SIGNING_KEY_PEM: &str = include_str!("../../testdata/rsa_signing_key.pem");
const ROGUE_KEY_PEM: &str = include_str!("../../testdata/rsa_rogue_key.pem");

/// Public modulus of `rsa_signing_key.pem`, base64url.
const SIGNING_KEY_N: &str = "1J2N54_43iyBMAPyvqOcv3-Ggv2qDt6he4V63SIp9XQNm4g1YNglwfO9yj89Ymuo_3qrroz3586g6h0d-dcCEUoFwc1ivV8f5_DX00v68E7P6W-6o6zYgRevQMn4wrnFKkJxLk1f4r3TX8ClNS-jeC6SzMdQMfBJSMD5ZGA4Iv4iMBuJd6mKVdspKQE6pmgpC6YcOOtFFH2gjul3fXSlWX_FPWtY0sA31EpzI-kVaucbX48cE8E3Pkm1N9eXdMSKyissEcTIzbk66-V3Fuz_2_SmBRpuWaQ2UsxY_d9wUcWYT3PoXiPt_1QkC5t103N2HHH6QohSbAvpnjxBCVa7PQ";

/// Key set publishing the signing key's public half under each `kid`.
pub fn jwks_json(kids: &[&str]) -> Value {
    let keys: Vec<Value> = kids
        .iter()
        .map(|kid| {
            json!({
                "kty": "RSA",
                "kid": kid,
                "use": "sig",
                "alg": "RS256",
                "n": SIGNING_KEY_N,
                "e": "AQAB"
            })
        })
        .collect();
    json!({ "keys": keys })
}

/// Builds signed tokens with sensible Keycloak-like defaults.
pub struct TokenBuilder {
    claims: Map<String, Value>,
    kid: Option<String>,
    key_pem: &'static str,
}

impl TokenBuilder {
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("sub".into(), json!("0b6c7f1e-user"));
        claims.insert("iss".into(), json!(issuer));
        claims.insert("aud".into(), json!(TEST_AUDIENCE));
        claims.insert("iat".into(), json!(now));
        claims.insert("exp".into(), json!(now + 300));
        Self {
            claims,
            kid: Some(SIGNING_KID.to_string()),
            key_pem: SIGNING_KEY_PEM,
        }
    }

    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn groups(self, groups: &[&str]) -> Self {
        self.claim("groups", json!(groups))
    }

    pub fn username(self, username: &str) -> Self {
        self.claim("preferred_username", json!(username))
    }

    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// Sign with a key the issuer never published.
    pub fn rogue(mut self) -> Self {
        self.key_pem = ROGUE_KEY_PEM;
        self.kid = Some(ROGUE_KID.to_string());
        self
    }

    pub fn sign(self) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid;
        let key = EncodingKey::from_rsa_pem(self.key_pem.as_bytes()).unwrap();
        encode(&header, &Value::Object(self.claims), &key).unwrap()
    }

    pub fn sign_hs256(self, secret: &[u8]) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = self.kid;
        encode(&header, &Value::Object(self.claims), &EncodingKey::from_secret(secret)).unwrap()
    }
}

#[derive(Default)]
struct KeyServerState {
    jwks: Mutex<Value>,
    jwks_hits: AtomicUsize,
    discovery_hits: AtomicUsize,
    failing: AtomicBool,
    hanging: AtomicBool,
    base: Mutex<String>,
}

/// Local key-set endpoint serving `/jwks` and OpenID discovery.
pub struct KeyServer {
    base: String,
    state: Arc<KeyServerState>,
}

impl KeyServer {
    /// Issuer base URL; discovery lives under it.
    pub fn issuer(&self) -> String {
        self.base.clone()
    }

    pub fn jwks_url(&self) -> Url {
        Url::parse(&format!("{}/jwks", self.base)).unwrap()
    }

    pub fn set_jwks(&self, jwks: Value) {
        *self.state.jwks.lock().unwrap() = jwks;
    }

    pub fn fail_requests(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Accept key-set requests but never answer them.
    pub fn hang_requests(&self, hanging: bool) {
        self.state.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.state.jwks_hits.load(Ordering::SeqCst)
    }

    pub fn discovery_hits(&self) -> usize {
        self.state.discovery_hits.load(Ordering::SeqCst)
    }
}

async fn serve_jwks(State(state): State<Arc<KeyServerState>>) -> Result<Json<Value>, StatusCode> {
    state.jwks_hits.fetch_add(1, Ordering::SeqCst);
    if state.hanging.load(Ordering::SeqCst) {
        std::future::pending::<()>().await;
    }
    if state.failing.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(state.jwks.lock().unwrap().clone()))
}

async fn serve_discovery(State(state): State<Arc<KeyServerState>>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    let base = state.base.lock().unwrap().clone();
    Json(json!({ "issuer": base, "jwks_uri": format!("{base}/jwks") }))
}

pub async fn spawn_key_server(jwks: Value) -> KeyServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let state = Arc::new(KeyServerState {
        jwks: Mutex::new(jwks),
        base: Mutex::new(base.clone()),
        ..Default::default()
    });

    let app = Router::new()
        .route("/jwks", get(serve_jwks))
        .route("/.well-known/openid-configuration", get(serve_discovery))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    KeyServer { base, state }
}

pub fn test_settings() -> JwksSettings {
    JwksSettings {
        cache_ttl: Duration::from_secs(300),
        min_refresh_interval: Duration::ZERO,
        fetch_timeout: Duration::from_secs(2),
    }
}

/// Validator trusting `server` as issuer, with the test audience.
pub fn test_validator(server: &KeyServer) -> TokenValidator {
    let keys = JwksManager::new(KeySource::Jwks(server.jwks_url()), test_settings()).unwrap();
    TokenValidator::new(
        keys,
        ValidatorSettings::new(server.issuer()).with_audience(TEST_AUDIENCE),
    )
}
