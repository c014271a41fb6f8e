// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative configuration: credential routes and the token schemas bound to them.
//!
//! Loaded from JSON (camelCase keys). Secrets are wrapped in [`Secret`] so a
//! serialized dump of the loaded configuration never carries them.

pub mod secret;
pub mod token;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;
pub use crate::schema::secret::Secret;
pub use crate::schema::token::{
    Direction, FieldMapping, JwtPartialSchema, JwtSchema, KeyRef, KeystoreRef, RequestSchema,
    SourceSchema, SslContextSchema, TokenSchema, TruststoreRef, UpdateSchema,
};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub token_schemas: IndexMap<String, TokenSchema>,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(contents: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| EngineError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("{}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// The schema bound to a route: its explicit `tokenSchema`, else its path prefix.
    pub fn schema_for(&self, route: &RouteConfig) -> Option<&TokenSchema> {
        self.token_schemas.get(route.schema_name())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let mut seen = HashSet::new();
        for route in &self.routes {
            if route.path_prefix.is_empty() {
                return Err(EngineError::config("route with empty pathPrefix"));
            }
            if !seen.insert(route.path_prefix.as_str()) {
                return Err(EngineError::config(format!(
                    "duplicate route pathPrefix {}",
                    route.path_prefix
                )));
            }
            if route.proxy_host.is_some() != route.proxy_port.is_some() {
                return Err(EngineError::config(format!(
                    "route {}: proxyHost and proxyPort must be set together",
                    route.path_prefix
                )));
            }
            if self.schema_for(route).is_none() {
                return Err(EngineError::config(format!(
                    "route {}: no token schema named {}",
                    route.path_prefix,
                    route.schema_name()
                )));
            }
        }
        for (name, schema) in &self.token_schemas {
            schema
                .validate()
                .map_err(|e| EngineError::config(format!("token schema {name}: {}", e.message)))?;
        }
        Ok(())
    }
}

/// One credential route, keyed by its path prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub path_prefix: String,
    pub token_url: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl: u64,
    #[serde(default)]
    pub token_ttl_unit: TtlUnit,
    /// Grace window before expiry, in `token_ttl_unit`.
    #[serde(default)]
    pub wait_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
    #[serde(default)]
    pub enable_http2: bool,
    /// Name of the token schema for this route. Defaults to the path prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_schema: Option<String>,
}

impl RouteConfig {
    pub fn schema_name(&self) -> &str {
        self.token_schema.as_deref().unwrap_or(&self.path_prefix)
    }

    pub fn ttl_ms(&self) -> u64 {
        self.token_ttl_unit.to_millis(self.token_ttl)
    }

    pub fn grace_ms(&self) -> u64 {
        self.token_ttl_unit.to_millis(self.wait_length)
    }
}

fn default_token_ttl() -> u64 {
    3600
}

/// Unit for `tokenTtl` and `waitLength`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtlUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TtlUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Milliseconds => "MILLISECONDS",
            Self::Seconds => "SECONDS",
            Self::Minutes => "MINUTES",
            Self::Hours => "HOURS",
            Self::Days => "DAYS",
        }
    }

    pub fn to_millis(&self, value: u64) -> u64 {
        let factor: u64 = match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
            Self::Days => 86_400_000,
        };
        value.saturating_mul(factor)
    }
}

impl FromStr for TtlUnit {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MILLISECONDS" | "MS" => Ok(Self::Milliseconds),
            "SECONDS" | "S" => Ok(Self::Seconds),
            "MINUTES" | "M" => Ok(Self::Minutes),
            "HOURS" | "H" => Ok(Self::Hours),
            "DAYS" | "D" => Ok(Self::Days),
            _ => Err(EngineError::config(format!("unknown ttl unit {s:?}"))),
        }
    }
}

impl fmt::Display for TtlUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TtlUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TtlUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: EngineError| serde::de::Error::custom(e.message))
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
