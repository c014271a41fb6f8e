// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway-facing update instructions resolved from an [`UpdateSchema`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::schema::{Direction, UpdateSchema};
use crate::template::{self, Scopes};

/// Header/body changes for the host to apply on one side of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub direction: Direction,
    pub header_updates: IndexMap<String, String>,
    pub header_removals: Vec<String>,
    pub body_updates: IndexMap<String, Value>,
}

impl Projection {
    pub fn empty(direction: Direction) -> Self {
        Self {
            direction,
            header_updates: IndexMap::new(),
            header_removals: Vec::new(),
            body_updates: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.header_updates.is_empty()
            && self.header_removals.is_empty()
            && self.body_updates.is_empty()
    }
}

/// Resolve every update template. All-or-nothing: any failed reference
/// yields no projection at all.
pub fn project(update: &UpdateSchema, scopes: &Scopes<'_>) -> Result<Projection, EngineError> {
    let header_updates = template::resolve_map(&update.headers, scopes)?;
    let mut body_updates = IndexMap::with_capacity(update.body.len());
    for (key, value) in &update.body {
        body_updates.insert(key.clone(), template::resolve_value(value, scopes)?);
    }
    Ok(Projection {
        direction: update.direction,
        header_updates,
        header_removals: update.remove_headers.clone(),
        body_updates,
    })
}
