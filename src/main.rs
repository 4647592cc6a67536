// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use nexus_server::api::router;
use nexus_server::auth::SecurityProfile;
use nexus_server::config::{AppConfig, ConfigError};
use nexus_server::logging::init_tracing;
use nexus_server::state::AppState;

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server failed");
            eprintln!("nexus-server: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    if config.profile == SecurityProfile::DevNoAuth {
        tracing::warn!("AUTH_PROFILE=dev-no-auth: every request is permitted and no token is validated");
    }
    match &config.auth {
        Some(auth) => tracing::info!(
            issuer = %auth.issuer,
            audience = auth.audience.as_deref().unwrap_or("<not checked>"),
            key_source = ?auth.key_source,
            "token validation configured"
        ),
        None => tracing::warn!("no issuer configured"),
    }

    let state = AppState::from_config(&config)?;
    let cors = config.policy.cors.layer()?;
    let app = router(state, cors);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Nexus server listening (docs at /swagger-ui)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
