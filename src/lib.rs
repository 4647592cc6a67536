// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Nexus Server - JWT Authentication and Role Authorization
//!
//! Validates bearer tokens issued by an external OpenID Connect provider,
//! maps provider groups and roles onto a tier hierarchy, and enforces access
//! both per route and per business operation.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token validation, tier mapping, access policy, audit identity
//! - `config` - Environment and policy file configuration
//! - `service` - Company management guarded by the operation table

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod service;
pub mod state;
pub mod store;
