// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use indexmap::IndexMap;
use serde_json::json;

use super::*;
use crate::error::ErrorKind;

fn config_scope() -> VariableScope {
    let mut scope = VariableScope::new();
    scope.set(ScopeField::ClientId, "svc-a");
    scope.set(ScopeField::Scope, "read write");
    scope.set(ScopeField::Issuer, "!ref(config.clientId)");
    scope
}

fn response_scope() -> VariableScope {
    let mut scope = VariableScope::new();
    scope.set(ScopeField::AccessToken, "abc123");
    scope
}

#[yare::parameterized(
    plain = { "no references", "no references" },
    bang = { "id=!ref(config.clientId)", "id=svc-a" },
    dollar = { "id=${config.clientId}", "id=svc-a" },
    both = { "${config.clientId}:!ref(config.scope)", "svc-a:read write" },
    bearer = { "Bearer !ref(response.accessToken)", "Bearer abc123" },
    adjacent = { "!ref(config.clientId)!ref(config.clientId)", "svc-asvc-a" },
    unterminated_bang = { "x !ref(config.clientId", "x !ref(config.clientId" },
    unterminated_then_valid = { "${oops !ref(config.clientId)", "${oops svc-a" },
    value_not_rescanned = { "iss=!ref(config.issuer)", "iss=!ref(config.clientId)" },
)]
fn resolves(template: &str, expected: &str) {
    let config = config_scope();
    let response = response_scope();
    let scopes = Scopes::new(&config).with_response(&response);
    assert_eq!(resolve(template, &scopes).ok().as_deref(), Some(expected));
}

#[yare::parameterized(
    unknown_scope = { "!ref(route.clientId)" },
    unknown_field = { "${config.refreshToken}" },
    malformed = { "!ref(clientId)" },
    unset_field = { "!ref(config.password)" },
)]
fn rejects(template: &str) {
    let config = config_scope();
    let response = response_scope();
    let scopes = Scopes::new(&config).with_response(&response);
    let err = resolve(template, &scopes).err();
    assert_eq!(err.as_ref().map(|e| e.kind), Some(ErrorKind::Resolution));
    // The error names the offending reference.
    let inner = template.trim_start_matches("!ref(").trim_start_matches("${");
    let inner = inner.trim_end_matches(')').trim_end_matches('}');
    assert!(err.map(|e| e.message.contains(inner)).unwrap_or(false));
}

#[test]
fn response_scope_absent_is_an_error() {
    let config = config_scope();
    let scopes = Scopes::new(&config);
    let err = resolve("Bearer !ref(response.accessToken)", &scopes).err();
    assert_eq!(err.map(|e| e.kind), Some(ErrorKind::Resolution));
}

#[test]
fn resolution_is_deterministic() -> anyhow::Result<()> {
    let config = config_scope();
    let response = response_scope();
    let scopes = Scopes::new(&config).with_response(&response);
    let template = "a=${config.clientId}&b=!ref(response.accessToken)&c=${config.scope}";
    let first = resolve(template, &scopes)?;
    let second = resolve(template, &scopes)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn resolve_map_keeps_order() -> anyhow::Result<()> {
    let config = config_scope();
    let scopes = Scopes::new(&config);
    let mut map = IndexMap::new();
    map.insert("z".to_owned(), "${config.clientId}".to_owned());
    map.insert("a".to_owned(), "static".to_owned());
    let resolved = resolve_map(&map, &scopes)?;
    let keys: Vec<&str> = resolved.keys().map(String::as_str).collect();
    assert_eq!(keys, ["z", "a"]);
    assert_eq!(resolved["z"], "svc-a");
    Ok(())
}

#[test]
fn resolve_value_walks_nested_json() -> anyhow::Result<()> {
    let config = config_scope();
    let scopes = Scopes::new(&config);
    let value = json!({ "client": "${config.clientId}", "n": 3, "list": ["!ref(config.scope)", true] });
    let resolved = resolve_value(&value, &scopes)?;
    assert_eq!(resolved, json!({ "client": "svc-a", "n": 3, "list": ["read write", true] }));
    Ok(())
}

#[test]
fn single_reference_forms() -> anyhow::Result<()> {
    let expected = Reference { scope: ScopeName::Response, field: ScopeField::AccessToken };
    assert_eq!(parse_single_reference("!ref(response.accessToken)")?, expected);
    assert_eq!(parse_single_reference("${response.accessToken}")?, expected);
    assert_eq!(parse_single_reference("response.accessToken")?, expected);
    Ok(())
}

#[test]
fn validate_finds_bad_references_without_scopes() {
    assert!(validate("Bearer !ref(response.accessToken)").is_ok());
    assert!(validate("${config.nope}").is_err());
    assert!(validate_value(&json!({ "a": ["${config.nope}"] })).is_err());
}
