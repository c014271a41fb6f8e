// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the engine and its admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed route list or token schema. Fatal at load time.
    Config,
    /// A template references an unknown scope or field, or an unset value.
    Resolution,
    /// Keystore or truststore material could not be turned into a TLS context.
    TlsBuild,
    /// Bad JWT algorithm or signing key.
    Signature,
    /// The token endpoint could not be reached.
    TokenRequest,
    /// The token endpoint answered with a non-2xx status or an unusable body.
    TokenEndpoint,
    UnknownRoute,
    Unauthorized,
    BadRequest,
}

impl ErrorKind {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::UnknownRoute => 404,
            Self::TokenRequest | Self::TokenEndpoint => 502,
            Self::Config | Self::Resolution | Self::TlsBuild | Self::Signature => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "CONFIG_ERROR",
            Self::Resolution => "RESOLUTION_ERROR",
            Self::TlsBuild => "TLS_BUILD_ERROR",
            Self::Signature => "SIGNATURE_ERROR",
            Self::TokenRequest => "TOKEN_REQUEST_ERROR",
            Self::TokenEndpoint => "TOKEN_ENDPOINT_ERROR",
            Self::UnknownRoute => "UNKNOWN_ROUTE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An engine failure: a kind plus a diagnostic message for the host to log.
///
/// Cloneable so that a single failed refresh can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Resolution, message)
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TlsBuild, message)
    }

    pub fn signature(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Signature, message)
    }

    pub fn token_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenRequest, message)
    }

    pub fn token_endpoint(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TokenEndpoint, message)
    }

    pub fn unknown_route(route: &str) -> Self {
        Self::new(ErrorKind::UnknownRoute, format!("no credential route for {route}"))
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        self.kind.to_http_response(self.message.clone())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for EngineError {}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
