// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint replies into a response scope.

use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::schema::SourceSchema;
use crate::template::parse_single_reference;
use crate::template::scope::{ScopeField, VariableScope};

/// Longest response body echoed back in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Build the response scope from a token endpoint reply.
///
/// Non-2xx replies are never parsed. Body mappings read top-level fields of
/// a JSON object (strings as-is, numbers stringified); header mappings read
/// response headers. Missing sources are skipped. The reply must yield an
/// access token.
pub fn extract_response(
    source: &SourceSchema,
    status: u16,
    headers: &HeaderMap,
    body: &str,
) -> Result<VariableScope, EngineError> {
    if !(200..300).contains(&status) {
        return Err(EngineError::token_endpoint(format!(
            "token endpoint returned {status}: {}",
            truncate(body)
        )));
    }

    let mut scope = VariableScope::new();

    for mapping in &source.headers {
        let Some(value) = headers.get(mapping.source.as_str()).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        scope.set(destination(&mapping.destination)?, value);
    }

    if !source.body.is_empty() {
        let object: Map<String, Value> = serde_json::from_str(body).map_err(|e| {
            EngineError::token_endpoint(format!("unparsable token response ({e}): {}", truncate(body)))
        })?;
        for mapping in &source.body {
            let value = match object.get(&mapping.source) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => continue,
            };
            scope.set(destination(&mapping.destination)?, value);
        }
    }

    if scope.get(ScopeField::AccessToken).is_none_or(str::is_empty) {
        return Err(EngineError::token_endpoint("token response carried no access token"));
    }
    Ok(scope)
}

fn destination(reference: &str) -> Result<ScopeField, EngineError> {
    parse_single_reference(reference).map(|r| r.field)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
