// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::credential::engine::CredentialEngine;

/// Shared admin server state.
pub struct AppState {
    pub engine: Arc<CredentialEngine>,
    pub config: ServerConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<CredentialEngine>, config: ServerConfig) -> Self {
        Self { engine, config, started_at: Instant::now() }
    }
}
