// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the credgate admin server.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "credgate", about = "Credential acquisition and caching engine")]
pub struct ServerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "CREDGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9810, env = "CREDGATE_PORT")]
    pub port: u16,

    /// Bearer token for the admin API. If unset, auth is disabled.
    #[arg(long, env = "CREDGATE_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Path to the route and token schema configuration (JSON).
    #[arg(long, env = "CREDGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory keystore and truststore names are resolved against.
    /// Defaults to the config file's directory.
    #[arg(long, env = "CREDGATE_RESOURCE_DIR")]
    pub resource_dir: Option<PathBuf>,

    /// Connect timeout for token endpoints in milliseconds.
    #[arg(long, default_value_t = 5000, env = "CREDGATE_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: u64,

    /// Total request timeout for token endpoints in milliseconds.
    #[arg(long, default_value_t = 30000, env = "CREDGATE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Extra attempts after a transport failure reaching a token endpoint.
    #[arg(long, default_value_t = 0, env = "CREDGATE_REFRESH_RETRIES")]
    pub refresh_retries: u32,
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let resource_dir = self
            .resource_dir
            .clone()
            .or_else(|| self.config.as_ref().and_then(|p| p.parent()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        EngineSettings {
            resource_dir,
            connect_timeout: self.connect_timeout(),
            request_timeout: self.request_timeout(),
            refresh_retries: self.refresh_retries,
        }
    }
}

/// Settings the engine needs from its host.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub resource_dir: PathBuf,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub refresh_retries: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("."),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            refresh_retries: 0,
        }
    }
}
