// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential engine: owns the route slots and answers acquisition requests.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::EngineSettings;
use crate::credential::route::RouteSlot;
use crate::credential::{CachedToken, Freshness, RouteStatusInfo};
use crate::error::EngineError;
use crate::project::{self, Projection};
use crate::schema::{Direction, EngineConfig};
use crate::template::Scopes;

struct EngineState {
    config: Arc<EngineConfig>,
    /// Keyed by path prefix, in config order.
    slots: IndexMap<String, Arc<RouteSlot>>,
}

/// Outcome of a config reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Routes whose definition was unchanged; their cached tokens survive.
    pub kept: Vec<String>,
    pub rebuilt: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// The credential engine manages token freshness for all configured routes.
pub struct CredentialEngine {
    state: RwLock<EngineState>,
    settings: EngineSettings,
}

impl CredentialEngine {
    /// Validate `config` and create one slot per route. Nothing is fetched
    /// until the first acquisition.
    pub fn new(config: EngineConfig, settings: EngineSettings) -> Result<Arc<Self>, EngineError> {
        config.validate()?;
        let slots = build_slots(&config, &settings, |_| None)?;
        tracing::info!(routes = slots.len(), "credential engine ready");
        Ok(Arc::new(Self {
            state: RwLock::new(EngineState { config: Arc::new(config), slots }),
            settings,
        }))
    }

    /// Current (validated) configuration.
    pub fn config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.state.read().config)
    }

    fn slot(&self, route_key: &str) -> Result<Arc<RouteSlot>, EngineError> {
        self.state
            .read()
            .slots
            .get(route_key)
            .cloned()
            .ok_or_else(|| EngineError::unknown_route(route_key))
    }

    /// Return a fresh token for `route_key`, refreshing if needed.
    pub async fn acquire(&self, route_key: &str) -> Result<Arc<CachedToken>, EngineError> {
        let slot = self.slot(route_key)?;
        slot.acquire().await
    }

    /// Acquire a token for `route_key` and resolve its update schema.
    ///
    /// A direction other than the schema's yields an empty projection
    /// without touching the token endpoint. On any failure the caller gets
    /// the error and no instructions.
    pub async fn acquire_and_project(
        &self,
        route_key: &str,
        direction: Direction,
    ) -> Result<Projection, EngineError> {
        let slot = self.slot(route_key)?;
        let update = &slot.schema().update;
        if update.direction != direction {
            tracing::debug!(route = %route_key, %direction, "no update for direction");
            return Ok(Projection::empty(direction));
        }
        let token = slot.acquire().await?;
        let scopes = Scopes::new(slot.config_scope()).with_response(&token.response);
        project::project(update, &scopes).inspect_err(|e| {
            tracing::warn!(route = %route_key, err = %e, "update projection failed");
        })
    }

    /// Route key for a request path: the longest path prefix that matches on
    /// a segment boundary.
    pub fn route_for_path(&self, path: &str) -> Option<String> {
        let state = self.state.read();
        state
            .slots
            .keys()
            .filter(|prefix| prefix_matches(prefix, path))
            .max_by_key(|prefix| prefix.len())
            .cloned()
    }

    pub fn freshness(&self, route_key: &str) -> Result<Freshness, EngineError> {
        Ok(self.slot(route_key)?.freshness())
    }

    pub fn status_list(&self) -> Vec<RouteStatusInfo> {
        let slots: Vec<_> = self.state.read().slots.values().cloned().collect();
        slots.iter().map(|s| s.status()).collect()
    }

    /// Swap in a new configuration.
    ///
    /// Routes whose definition is unchanged keep their slot, with its cached
    /// token and any in-flight refresh. On a validation error nothing changes.
    pub fn reload(&self, config: EngineConfig) -> Result<ReloadSummary, EngineError> {
        config.validate()?;
        let mut state = self.state.write();

        let mut summary = ReloadSummary::default();
        let slots = build_slots(&config, &self.settings, |prefix| state.slots.get(prefix))?;
        for (prefix, slot) in &slots {
            match state.slots.get(prefix) {
                Some(old) if Arc::ptr_eq(old, slot) => summary.kept.push(prefix.clone()),
                Some(_) => summary.rebuilt.push(prefix.clone()),
                None => summary.added.push(prefix.clone()),
            }
        }
        summary.removed =
            state.slots.keys().filter(|k| !slots.contains_key(*k)).cloned().collect();

        state.slots = slots;
        state.config = Arc::new(config);
        tracing::info!(
            kept = summary.kept.len(),
            rebuilt = summary.rebuilt.len(),
            added = summary.added.len(),
            removed = summary.removed.len(),
            "config reloaded"
        );
        Ok(summary)
    }
}

/// Build slots for every route in a validated config, reusing `existing`
/// slots whose definition is unchanged.
fn build_slots<'a>(
    config: &EngineConfig,
    settings: &EngineSettings,
    existing: impl Fn(&str) -> Option<&'a Arc<RouteSlot>>,
) -> Result<IndexMap<String, Arc<RouteSlot>>, EngineError> {
    let mut slots = IndexMap::with_capacity(config.routes.len());
    for route in &config.routes {
        let schema = config.schema_for(route).ok_or_else(|| {
            EngineError::config(format!(
                "route {} references unknown token schema {}",
                route.path_prefix,
                route.schema_name()
            ))
        })?;
        let slot = match existing(&route.path_prefix) {
            Some(old) if old.same_definition(route, schema) => Arc::clone(old),
            _ => RouteSlot::new(route.clone(), schema.clone(), settings.clone()),
        };
        slots.insert(route.path_prefix.clone(), slot);
    }
    Ok(slots)
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

impl std::fmt::Debug for CredentialEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEngine")
            .field("routes", &self.state.read().slots.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
