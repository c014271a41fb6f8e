// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token schemas: how to build a token request, what to extract from the
//! reply, and what to inject into the gateway's traffic.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::request::FORM_URLENCODED;
use crate::schema::Secret;
use crate::template::scope::ScopeName;
use crate::template::{self, parse_single_reference};

/// Declarative description bound to one integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSchema {
    pub request: RequestSchema,
    #[serde(default)]
    pub source: SourceSchema,
    pub update: UpdateSchema,
}

impl TokenSchema {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.request.validate()?;
        self.source.validate()?;
        self.update.validate()
    }
}

/// How to build the token endpoint request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSchema {
    /// Endpoint URL template. Defaults to the route's `tokenUrl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: IndexMap<String, Value>,
    /// Content type; anything but form-urlencoded is sent as JSON.
    #[serde(default = "default_content_type", rename = "type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_schema: Option<JwtSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_context_schema: Option<SslContextSchema>,
    #[serde(default = "default_true")]
    pub cache_http_client: bool,
    #[serde(default = "default_true", rename = "cacheSSLContext")]
    pub cache_ssl_context: bool,
}

impl RequestSchema {
    pub fn is_form(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(FORM_URLENCODED))
    }

    /// A built request may be reused only when caching is on and no
    /// per-call assertion goes into it.
    pub fn request_cacheable(&self) -> bool {
        self.cache_http_client && self.jwt_schema.is_none()
    }

    fn validate(&self) -> Result<(), EngineError> {
        if let Some(url) = &self.url {
            template::validate(url)?;
        }
        for value in self.headers.values() {
            template::validate(value)?;
        }
        for value in self.body.values() {
            template::validate_value(value)?;
        }
        if let Some(jwt) = &self.jwt_schema {
            jwt.header.validate()?;
            jwt.body.validate()?;
            reject_password("jwtSchema.keystore.password", jwt.keystore.password.as_ref())?;
        }
        if let Some(ssl) = &self.ssl_context_schema {
            if let Some(keystore) = &ssl.keystore {
                reject_password("sslContextSchema.keystore.password", keystore.password.as_ref())?;
                reject_password("sslContextSchema.keystore.keyPassword", keystore.key_password.as_ref())?;
            }
            if let Some(truststore) = &ssl.truststore {
                reject_password("sslContextSchema.truststore.password", truststore.password.as_ref())?;
            }
        }
        Ok(())
    }
}

/// Key material is read as unencrypted PEM.
fn reject_password(field: &str, password: Option<&Secret>) -> Result<(), EngineError> {
    match password {
        Some(_) => Err(EngineError::config(format!(
            "{field}: encrypted key material is not supported, supply an unencrypted PEM file"
        ))),
        None => Ok(()),
    }
}

fn default_content_type() -> String {
    FORM_URLENCODED.to_owned()
}

fn default_true() -> bool {
    true
}

/// Self-signed JWT assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtSchema {
    /// Seconds added to the build time for expiry fields.
    pub ttl: u64,
    /// `RS256`, `PS256`, `ES256`, `EdDSA`, ...
    pub algorithm: String,
    pub keystore: KeyRef,
    #[serde(default)]
    pub header: JwtPartialSchema,
    #[serde(default)]
    pub body: JwtPartialSchema,
}

/// Signing key reference for JWT assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRef {
    /// PEM file holding the private key, relative to the resource directory.
    pub name: String,
    /// Rejected at load time when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    /// Accepted and ignored: a PEM file holds a single key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Field recipe for one JWT segment (header or body).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtPartialSchema {
    #[serde(default, rename = "static")]
    pub static_fields: IndexMap<String, Value>,
    /// Filled with a fresh UUID on every build.
    #[serde(default)]
    pub uuid: Vec<String>,
    /// Filled with the build time in epoch seconds.
    #[serde(default)]
    pub current_time: Vec<String>,
    /// Filled with the build time plus the schema ttl.
    #[serde(default)]
    pub expiry_time: Vec<String>,
}

impl JwtPartialSchema {
    fn validate(&self) -> Result<(), EngineError> {
        self.static_fields.values().try_for_each(template::validate_value)
    }
}

/// TLS material for the token endpoint connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslContextSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore: Option<KeystoreRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truststore: Option<TruststoreRef>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Also trust the bundled Mozilla root set.
    #[serde(default)]
    pub trust_default_roots: bool,
}

fn default_protocol() -> String {
    "TLS".to_owned()
}

/// Client certificate chain and key (PEM bundle).
///
/// `password` and `keyPassword` are rejected at load time when set.
/// `algorithm` is accepted and ignored; the key type comes from the PEM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// Trusted CA certificates (PEM).
///
/// `password` is rejected at load time when set. `algorithm` is accepted
/// and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruststoreRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// Fields copied out of the token endpoint reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSchema {
    #[serde(default)]
    pub headers: Vec<FieldMapping>,
    #[serde(default)]
    pub body: Vec<FieldMapping>,
}

impl SourceSchema {
    fn validate(&self) -> Result<(), EngineError> {
        for mapping in self.headers.iter().chain(&self.body) {
            let reference = parse_single_reference(&mapping.destination)?;
            if reference.scope != ScopeName::Response {
                return Err(EngineError::config(format!(
                    "destination {} must be in the response scope",
                    mapping.destination
                )));
            }
        }
        Ok(())
    }
}

/// `source` names a reply field; `destination` a response-scope reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub destination: String,
}

/// Which side of the exchange an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to inject into the gateway's traffic once a token is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSchema {
    pub direction: Direction,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_headers: Vec<String>,
}

impl UpdateSchema {
    fn validate(&self) -> Result<(), EngineError> {
        self.headers.values().try_for_each(|v| template::validate(v))?;
        self.body.values().try_for_each(template::validate_value)
    }
}
