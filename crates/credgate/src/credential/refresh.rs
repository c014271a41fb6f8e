// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint round trip with retries.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::credential::route::RouteSlot;
use crate::credential::{epoch_ms, CachedToken};
use crate::error::{EngineError, ErrorKind};
use crate::extract::extract_response;
use crate::request::{self, PreparedRequest};
use crate::schema::{RouteConfig, TtlUnit};
use crate::template::scope::{ScopeField, VariableScope};

/// Raw token endpoint reply.
#[derive(Debug)]
pub struct EndpointReply {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

/// Perform a single token request.
pub async fn do_refresh(
    client: &reqwest::Client,
    prepared: &PreparedRequest,
) -> Result<EndpointReply, EngineError> {
    let target = request::display_url(&prepared.url);
    let resp = request::to_reqwest(client, prepared)
        .send()
        .await
        .map_err(|e| EngineError::token_request(format!("POST {target}: {}", e.without_url())))?;
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let body = resp.text().await.map_err(|e| {
        EngineError::token_request(format!("reading reply from {target}: {}", e.without_url()))
    })?;
    Ok(EndpointReply { status, headers, body })
}

/// Refresh the slot's token, retrying transport failures with exponential
/// backoff. Endpoint rejections are not retried.
pub async fn refresh_with_retries(slot: &RouteSlot) -> Result<CachedToken, EngineError> {
    let client = slot.http_client().await?;
    let max_retries = slot.settings().refresh_retries;
    let mut backoff = Duration::from_millis(250);
    let max_backoff = Duration::from_secs(30);

    let mut attempt = 0;
    let reply = loop {
        // Rebuilt per attempt so JWT assertions carry a fresh jti and iat.
        let prepared = slot.prepared_request(epoch_ms() / 1000).await?;
        match do_refresh(&client, &prepared).await {
            Ok(reply) => break reply,
            Err(e) if e.kind == ErrorKind::TokenRequest && attempt < max_retries => {
                tracing::debug!(route = %slot.route().path_prefix, attempt, err = %e, "token request failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(max_backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    };

    let scope = extract_response(&slot.schema().source, reply.status, &reply.headers, &reply.body)?;
    token_from_scope(slot.route(), scope, epoch_ms())
}

/// Turn an extracted response scope into a cached token issued at `now_ms`.
///
/// A numeric `tokenTtl` in the response overrides the route TTL. It is read
/// in the response's `tokenTtlUnit` when that parses, else in the route's
/// unit. `expiration` is filled in (epoch seconds) unless the source mapping
/// already set it.
pub fn token_from_scope(
    route: &RouteConfig,
    mut scope: VariableScope,
    now_ms: u64,
) -> Result<CachedToken, EngineError> {
    let unit = scope
        .get(ScopeField::TokenTtlUnit)
        .and_then(|u| u.trim().parse::<TtlUnit>().ok())
        .unwrap_or(route.token_ttl_unit);
    let ttl_ms = scope
        .get(ScopeField::TokenTtl)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|ttl| unit.to_millis(ttl))
        .unwrap_or_else(|| route.ttl_ms());
    let expires_at = now_ms.saturating_add(ttl_ms);
    if scope.get(ScopeField::Expiration).is_none() {
        scope.set(ScopeField::Expiration, (expires_at / 1000).to_string());
    }
    let access_token = scope
        .get(ScopeField::AccessToken)
        .map(str::to_owned)
        .ok_or_else(|| EngineError::token_endpoint("token response carried no access token"))?;
    Ok(CachedToken { access_token, expires_at, response: Arc::new(scope) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(ttl: u64, unit: TtlUnit) -> anyhow::Result<RouteConfig> {
        let mut route: RouteConfig = serde_json::from_value(serde_json::json!({
            "pathPrefix": "/svc",
            "tokenUrl": "https://auth.example.com/token"
        }))?;
        route.token_ttl = ttl;
        route.token_ttl_unit = unit;
        Ok(route)
    }

    fn scope_with(fields: &[(ScopeField, &str)]) -> VariableScope {
        let mut scope = VariableScope::new();
        for (field, value) in fields {
            scope.set(*field, *value);
        }
        scope
    }

    #[yare::parameterized(
        route_seconds = { 1800, TtlUnit::Seconds, None, None, 1_800_000 },
        route_minutes = { 30, TtlUnit::Minutes, None, None, 1_800_000 },
        response_override = { 3600, TtlUnit::Seconds, Some("300"), None, 300_000 },
        response_override_in_route_unit = { 1, TtlUnit::Minutes, Some("5"), None, 300_000 },
        response_unit = { 1, TtlUnit::Hours, Some("1800"), Some("SECONDS"), 1_800_000 },
        response_unit_short_form = { 1, TtlUnit::Seconds, Some("2"), Some("m"), 120_000 },
        unknown_response_unit_uses_route_unit = { 1, TtlUnit::Minutes, Some("5"), Some("fortnights"), 300_000 },
        unit_without_ttl_ignored = { 60, TtlUnit::Seconds, None, Some("DAYS"), 60_000 },
        unparsable_override_ignored = { 60, TtlUnit::Seconds, Some("soon"), None, 60_000 },
    )]
    fn expiry_from_ttl(
        ttl: u64,
        unit: TtlUnit,
        response_ttl: Option<&str>,
        response_unit: Option<&str>,
        expected_ms: u64,
    ) -> anyhow::Result<()> {
        let mut scope = scope_with(&[(ScopeField::AccessToken, "abc")]);
        if let Some(v) = response_ttl {
            scope.set(ScopeField::TokenTtl, v);
        }
        if let Some(u) = response_unit {
            scope.set(ScopeField::TokenTtlUnit, u);
        }
        let now = 1_000_000;
        let token = token_from_scope(&route(ttl, unit)?, scope, now)?;
        assert_eq!(token.expires_at, now + expected_ms);
        assert_eq!(token.access_token, "abc");
        Ok(())
    }

    #[test]
    fn expiration_is_filled_in_unless_mapped() -> anyhow::Result<()> {
        let route = route(60, TtlUnit::Seconds)?;
        let token = token_from_scope(&route, scope_with(&[(ScopeField::AccessToken, "a")]), 10_000)?;
        assert_eq!(token.response.get(ScopeField::Expiration), Some("70"));

        let mapped = scope_with(&[(ScopeField::AccessToken, "a"), (ScopeField::Expiration, "2030-01-01")]);
        let token = token_from_scope(&route, mapped, 10_000)?;
        assert_eq!(token.response.get(ScopeField::Expiration), Some("2030-01-01"));
        Ok(())
    }

    #[test]
    fn missing_access_token_is_rejected() -> anyhow::Result<()> {
        let err = token_from_scope(&route(60, TtlUnit::Seconds)?, VariableScope::new(), 0).err();
        assert_eq!(err.map(|e| e.kind), Some(ErrorKind::TokenEndpoint));
        Ok(())
    }
}
