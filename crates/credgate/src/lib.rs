// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credgate: credential acquisition and caching for gateway routes.

pub mod config;
pub mod credential;
pub mod error;
pub mod extract;
pub mod jwt;
pub mod project;
pub mod request;
pub mod schema;
pub mod state;
pub mod template;
pub mod tls;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::credential::engine::CredentialEngine;
use crate::schema::EngineConfig;
use crate::state::AppState;
use crate::transport::build_router;

/// Run the admin server until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    // Empty route set if no file provided; routes can be loaded later via reload.
    let engine_config = match config.config {
        Some(ref path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let engine = CredentialEngine::new(engine_config, config.engine_settings())?;

    let state = Arc::new(AppState::new(engine, config.clone()));

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                shutdown.cancel();
            }
        });
    }

    let listener = TcpListener::bind(&addr).await?;
    if config.auth_token.is_some() {
        tracing::info!("credgate listening on {addr} (auth enabled)");
    } else {
        tracing::info!("credgate listening on {addr}");
    }
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
