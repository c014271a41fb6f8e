// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-route slot: cached token, runtime caches and the in-flight refresh.

use std::borrow::Cow;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;

use crate::config::EngineSettings;
use crate::credential::{epoch_ms, refresh, CachedToken, Freshness, RouteStatusInfo};
use crate::error::EngineError;
use crate::jwt::{JwtAlgorithm, SigningKey};
use crate::request::{self, PreparedRequest};
use crate::schema::{RouteConfig, TokenSchema};
use crate::template::scope::VariableScope;
use crate::tls;

type SharedRefresh = Shared<BoxFuture<'static, Result<Arc<CachedToken>, EngineError>>>;

pub struct RouteSlot {
    route: RouteConfig,
    schema: TokenSchema,
    config_scope: VariableScope,
    settings: EngineSettings,
    tls: OnceCell<rustls::ClientConfig>,
    client: OnceCell<reqwest::Client>,
    prepared: OnceCell<PreparedRequest>,
    signing_key: OnceCell<Arc<SigningKey>>,
    token: RwLock<Option<Arc<CachedToken>>>,
    inflight: Mutex<Option<SharedRefresh>>,
}

impl RouteSlot {
    pub fn new(route: RouteConfig, schema: TokenSchema, settings: EngineSettings) -> Arc<Self> {
        let config_scope = VariableScope::from_route(&route);
        Arc::new(Self {
            route,
            schema,
            config_scope,
            settings,
            tls: OnceCell::new(),
            client: OnceCell::new(),
            prepared: OnceCell::new(),
            signing_key: OnceCell::new(),
            token: RwLock::new(None),
            inflight: Mutex::new(None),
        })
    }

    pub fn route(&self) -> &RouteConfig {
        &self.route
    }

    pub fn schema(&self) -> &TokenSchema {
        &self.schema
    }

    pub fn config_scope(&self) -> &VariableScope {
        &self.config_scope
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// True when `route` and `schema` match what this slot was built from.
    pub fn same_definition(&self, route: &RouteConfig, schema: &TokenSchema) -> bool {
        self.route == *route && self.schema == *schema
    }

    /// Return a fresh token, refreshing it first when needed.
    ///
    /// Concurrent callers share one refresh. The refresh runs on its own task,
    /// so dropping this future stops waiting without cancelling it.
    pub async fn acquire(self: &Arc<Self>) -> Result<Arc<CachedToken>, EngineError> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let refresh = {
            let mut inflight = self.inflight.lock();
            // A refresh may have landed between the check above and the lock.
            if let Some(token) = self.fresh_token() {
                return Ok(token);
            }
            match inflight.as_ref() {
                Some(refresh) => refresh.clone(),
                None => {
                    let refresh = self.spawn_refresh();
                    *inflight = Some(refresh.clone());
                    refresh
                }
            }
        };
        refresh.await
    }

    pub fn freshness(&self) -> Freshness {
        if self.inflight.lock().is_some() {
            Freshness::Refreshing
        } else if self.fresh_token().is_some() {
            Freshness::Fresh
        } else {
            Freshness::Expired
        }
    }

    pub fn status(&self) -> RouteStatusInfo {
        let expires_in_secs = self
            .token
            .read()
            .as_ref()
            .map(|t| t.expires_at.saturating_sub(epoch_ms()) / 1000)
            .filter(|secs| *secs > 0);
        RouteStatusInfo {
            path_prefix: self.route.path_prefix.clone(),
            token_url: self.route.token_url.clone(),
            state: self.freshness(),
            expires_in_secs,
        }
    }

    #[cfg(test)]
    pub(crate) fn seed_for_test(&self, expires_at: u64) {
        let mut response = VariableScope::new();
        response.set(crate::template::scope::ScopeField::AccessToken, "seeded");
        *self.token.write() = Some(Arc::new(CachedToken {
            access_token: "seeded".to_owned(),
            expires_at,
            response: Arc::new(response),
        }));
    }

    fn fresh_token(&self) -> Option<Arc<CachedToken>> {
        let now = epoch_ms();
        let grace = self.route.grace_ms();
        self.token.read().as_ref().filter(|t| t.is_fresh_at(now, grace)).cloned()
    }

    /// Start the refresh task. Caller holds the `inflight` lock.
    fn spawn_refresh(self: &Arc<Self>) -> SharedRefresh {
        let slot = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _clear = ClearInflight(&slot);
            let result = refresh::refresh_with_retries(&slot).await.map(Arc::new);
            match &result {
                Ok(token) => {
                    *slot.token.write() = Some(Arc::clone(token));
                    tracing::info!(route = %slot.route.path_prefix, expires_at = token.expires_at, "token refreshed");
                }
                Err(e) => {
                    tracing::warn!(route = %slot.route.path_prefix, err = %e, "token refresh failed");
                }
            }
            result
        });
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(EngineError::token_request(format!("refresh task failed: {e}"))),
            }
        }
        .boxed()
        .shared()
    }

    /// TLS config for this route: cached when `cacheSSLContext`, otherwise
    /// rebuilt on every call.
    pub async fn tls_config(&self) -> Result<rustls::ClientConfig, EngineError> {
        let build = || async {
            tls::build_client_config(
                self.schema.request.ssl_context_schema.as_ref(),
                &self.settings.resource_dir,
                self.route.enable_http2,
            )
        };
        if self.schema.request.cache_ssl_context {
            self.tls.get_or_try_init(build).await.cloned()
        } else {
            build().await
        }
    }

    /// HTTP client for this route, cached when `cacheHttpClient`.
    pub async fn http_client(&self) -> Result<reqwest::Client, EngineError> {
        let build = || async {
            let tls = self.tls_config().await?;
            request::build_http_client(tls, &self.route, &self.settings)
        };
        if self.schema.request.cache_http_client {
            self.client.get_or_try_init(build).await.cloned()
        } else {
            build().await
        }
    }

    /// Request for the next attempt. Built once when cacheable; requests
    /// carrying a JWT assertion are always rebuilt.
    pub async fn prepared_request(&self, now_secs: u64) -> Result<Cow<'_, PreparedRequest>, EngineError> {
        let key = self.signing_key().await?;
        let build = || {
            request::build_request(&self.schema.request, &self.config_scope, key.as_deref(), now_secs)
        };
        if self.schema.request.request_cacheable() {
            let prepared = self.prepared.get_or_try_init(|| async { build() }).await?;
            Ok(Cow::Borrowed(prepared))
        } else {
            build().map(Cow::Owned)
        }
    }

    async fn signing_key(&self) -> Result<Option<Arc<SigningKey>>, EngineError> {
        let Some(jwt) = &self.schema.request.jwt_schema else {
            return Ok(None);
        };
        let key = self
            .signing_key
            .get_or_try_init(|| async {
                let algorithm: JwtAlgorithm = jwt.algorithm.parse()?;
                let path = tls::resource_path(&self.settings.resource_dir, &jwt.keystore.name);
                SigningKey::load(algorithm, &path).map(Arc::new)
            })
            .await?;
        Ok(Some(Arc::clone(key)))
    }
}

impl std::fmt::Debug for RouteSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSlot")
            .field("path_prefix", &self.route.path_prefix)
            .field("state", &self.freshness())
            .finish_non_exhaustive()
    }
}

/// Clears the slot's in-flight refresh when the refresh task ends, panics
/// included, so the next caller can start a new one.
struct ClearInflight<'a>(&'a RouteSlot);

impl Drop for ClearInflight<'_> {
    fn drop(&mut self) {
        *self.0.inflight.lock() = None;
    }
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
