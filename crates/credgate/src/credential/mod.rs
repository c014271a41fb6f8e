// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-route token caching.
//!
//! Each configured route owns a [`route::RouteSlot`]: the cached token and its
//! expiry (swapped together as one value), the lazily built TLS context, HTTP
//! client and request, and at most one in-flight refresh that every
//! concurrent caller for the route awaits.

pub mod engine;
pub mod refresh;
pub mod route;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::template::scope::VariableScope;

/// Freshness of a route's cached token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Freshness {
    Fresh,
    Expired,
    Refreshing,
}

/// A token obtained from a route's endpoint.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    /// Epoch milliseconds.
    pub expires_at: u64,
    /// Everything the source mapping extracted from the reply.
    pub response: Arc<VariableScope>,
}

impl CachedToken {
    /// Fresh until `grace_ms` before expiry.
    pub fn is_fresh_at(&self, now_ms: u64, grace_ms: u64) -> bool {
        now_ms < self.expires_at.saturating_sub(grace_ms)
    }
}

/// Status info for a route (returned by the admin API).
#[derive(Debug, Clone, Serialize)]
pub struct RouteStatusInfo {
    pub path_prefix: String,
    pub token_url: String,
    pub state: Freshness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
