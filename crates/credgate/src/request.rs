// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token endpoint requests built from a [`RequestSchema`].

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::jwt::{self, SigningKey};
use crate::schema::{RequestSchema, RouteConfig};
use crate::template::scope::{ScopeField, VariableScope};
use crate::template::{self, Scopes};

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const JSON: &str = "application/json";

/// A fully resolved, wire-ready POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: IndexMap<String, String>,
    pub body: String,
}

/// Resolve `schema` against the route's config scope.
///
/// With a JWT schema, `signing` must carry the key; the assertion is built
/// first and stored as `constructedJwt` so url, header and body templates
/// can reference it.
pub fn build_request(
    schema: &RequestSchema,
    config: &VariableScope,
    signing: Option<&SigningKey>,
    now_secs: u64,
) -> Result<PreparedRequest, EngineError> {
    let mut scope = config.clone();
    if let Some(jwt_schema) = &schema.jwt_schema {
        let key = signing.ok_or_else(|| {
            EngineError::signature("jwt schema configured but no signing key loaded")
        })?;
        let assertion = jwt::build_assertion(jwt_schema, key, &Scopes::new(config), now_secs)?;
        scope.set(ScopeField::ConstructedJwt, assertion);
    }
    let scopes = Scopes::new(&scope);

    let url = match &schema.url {
        Some(url) => template::resolve(url, &scopes)?,
        None => scope
            .get(ScopeField::TokenUrl)
            .map(str::to_owned)
            .ok_or_else(|| EngineError::resolution("no request url and no route tokenUrl"))?,
    };
    check_url(&url)?;

    let mut headers = template::resolve_map(&schema.headers, &scopes)?;
    let mut body = IndexMap::with_capacity(schema.body.len());
    for (key, value) in &schema.body {
        body.insert(key.clone(), template::resolve_value(value, &scopes)?);
    }

    let (content_type, body) = if schema.is_form() {
        (schema.content_type.as_str(), encode_form(&body))
    } else {
        let json = serde_json::to_string(&body)
            .map_err(|e| EngineError::resolution(format!("request body encoding: {e}")))?;
        let content_type =
            if schema.content_type.is_empty() { JSON } else { schema.content_type.as_str() };
        (content_type, json)
    };
    if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
        headers.insert("Content-Type".to_owned(), content_type.to_owned());
    }
    for (name, value) in &headers {
        check_header(name, value)?;
    }

    Ok(PreparedRequest { url, headers, body })
}

// Resolved values are not echoed back: they can hold secrets.
fn check_url(url: &str) -> Result<(), EngineError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| EngineError::resolution(format!("request url does not parse: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.has_host() => Ok(()),
        "http" | "https" => Err(EngineError::resolution("request url has no host")),
        other => Err(EngineError::resolution(format!("request url scheme {other:?} is not http(s)"))),
    }
}

fn check_header(name: &str, value: &str) -> Result<(), EngineError> {
    reqwest::header::HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| EngineError::resolution(format!("invalid request header name {name:?}")))?;
    reqwest::header::HeaderValue::from_str(value)
        .map_err(|_| EngineError::resolution(format!("request header {name}: value is not sendable")))?;
    Ok(())
}

/// Scheme, host, port and path of a resolved url, for logs and error text.
///
/// Query strings, fragments and userinfo can carry template-resolved secrets
/// and are dropped.
pub fn display_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            match parsed.port() {
                Some(port) => format!("{}://{host}:{port}{}", parsed.scheme(), parsed.path()),
                None => format!("{}://{host}{}", parsed.scheme(), parsed.path()),
            }
        }
        Err(_) => "<invalid url>".to_owned(),
    }
}

/// Join resolved body entries as `key=value&...` with form URL-encoding.
pub fn encode_form(body: &IndexMap<String, Value>) -> String {
    body.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => urlencoding(s),
                Value::Null => String::new(),
                other => urlencoding(&other.to_string()),
            };
            format!("{}={value}", urlencoding(k))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Form-style encoding (spaces as `+`).
fn urlencoding(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'*' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Build the HTTP client for a route around an already built TLS config.
pub fn build_http_client(
    tls: rustls::ClientConfig,
    route: &RouteConfig,
    settings: &EngineSettings,
) -> Result<reqwest::Client, EngineError> {
    let mut builder = reqwest::Client::builder()
        .use_preconfigured_tls(tls)
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout);
    if !route.enable_http2 {
        builder = builder.http1_only();
    }
    if let (Some(host), Some(port)) = (&route.proxy_host, route.proxy_port) {
        let proxy = reqwest::Proxy::all(format!("http://{host}:{port}"))
            .map_err(|e| EngineError::config(format!("proxy {host}:{port}: {e}")))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| EngineError::tls(format!("http client for {}: {e}", route.path_prefix)))
}

/// Turn a prepared request into a sendable `reqwest` builder.
pub fn to_reqwest(client: &reqwest::Client, prepared: &PreparedRequest) -> reqwest::RequestBuilder {
    let mut request = client.post(&prepared.url);
    for (name, value) in &prepared.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request.body(prepared.body.clone())
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
