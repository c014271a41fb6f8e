// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template resolution against named variable scopes.
//!
//! Two reference markers are recognised anywhere in a string:
//! `!ref(scope.field)` and `${scope.field}`. Text outside markers is copied
//! unchanged; an opening marker with no closing delimiter is literal text.
//! Substituted values are never re-scanned.

pub mod scope;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::EngineError;
use crate::template::scope::{ScopeField, ScopeName, VariableScope};

const REF_OPEN: &str = "!ref(";
const REF_CLOSE: char = ')';
const VAR_OPEN: &str = "${";
const VAR_CLOSE: char = '}';

/// A parsed `scope.field` reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub scope: ScopeName,
    pub field: ScopeField,
}

/// The scope instances visible to one resolution.
#[derive(Debug, Clone, Copy)]
pub struct Scopes<'a> {
    config: &'a VariableScope,
    response: Option<&'a VariableScope>,
}

impl<'a> Scopes<'a> {
    pub fn new(config: &'a VariableScope) -> Self {
        Self { config, response: None }
    }

    pub fn with_response(mut self, response: &'a VariableScope) -> Self {
        self.response = Some(response);
        self
    }

    fn lookup(&self, reference: Reference, raw: &str) -> Result<&'a str, EngineError> {
        let scope = match reference.scope {
            ScopeName::Config => self.config,
            ScopeName::Response => self.response.ok_or_else(|| {
                EngineError::resolution(format!("{raw}: response scope is not available here"))
            })?,
        };
        scope
            .get(reference.field)
            .ok_or_else(|| EngineError::resolution(format!("{raw}: field has no value")))
    }
}

enum Segment<'t> {
    Text(&'t str),
    Ref { raw: &'t str, inner: &'t str },
}

/// Split a template into literal text and reference segments.
fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some((start, open, close)) = next_marker(rest) {
        let body_start = start + open.len();
        let Some(len) = rest[body_start..].find(close) else {
            // Unterminated: keep the opener as text and keep scanning after it.
            out.push(Segment::Text(&rest[..body_start]));
            rest = &rest[body_start..];
            continue;
        };
        if start > 0 {
            out.push(Segment::Text(&rest[..start]));
        }
        let end = body_start + len;
        out.push(Segment::Ref { raw: &rest[start..=end], inner: &rest[body_start..end] });
        rest = &rest[end + 1..];
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    out
}

fn next_marker(s: &str) -> Option<(usize, &'static str, char)> {
    let bang = s.find(REF_OPEN).map(|i| (i, REF_OPEN, REF_CLOSE));
    let dollar = s.find(VAR_OPEN).map(|i| (i, VAR_OPEN, VAR_CLOSE));
    match (bang, dollar) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Parse the inside of a marker (`scope.field`).
pub fn parse_reference(inner: &str) -> Result<Reference, EngineError> {
    let (scope, field) = inner
        .trim()
        .split_once('.')
        .ok_or_else(|| EngineError::resolution(format!("malformed reference {inner:?}")))?;
    let scope = ScopeName::from_name(scope)
        .ok_or_else(|| EngineError::resolution(format!("unknown scope {scope:?} in {inner:?}")))?;
    let field = ScopeField::from_name(field)
        .ok_or_else(|| EngineError::resolution(format!("unknown field {field:?} in {inner:?}")))?;
    Ok(Reference { scope, field })
}

/// Parse a string that must consist of exactly one reference.
///
/// Accepts either marker form, or a bare `scope.field`.
pub fn parse_single_reference(s: &str) -> Result<Reference, EngineError> {
    let s = s.trim();
    let inner = s
        .strip_prefix(REF_OPEN)
        .and_then(|r| r.strip_suffix(REF_CLOSE))
        .or_else(|| s.strip_prefix(VAR_OPEN).and_then(|r| r.strip_suffix(VAR_CLOSE)))
        .unwrap_or(s);
    parse_reference(inner)
}

/// All references in a template, in order of appearance.
pub fn references(template: &str) -> Result<Vec<Reference>, EngineError> {
    segments(template)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Ref { inner, .. } => Some(parse_reference(inner)),
            Segment::Text(_) => None,
        })
        .collect()
}

/// Check that every reference in a template names a known scope and field.
pub fn validate(template: &str) -> Result<(), EngineError> {
    references(template).map(|_| ())
}

/// Resolve every reference in `template`.
pub fn resolve(template: &str, scopes: &Scopes<'_>) -> Result<String, EngineError> {
    let mut out = String::with_capacity(template.len());
    for seg in segments(template) {
        match seg {
            Segment::Text(text) => out.push_str(text),
            Segment::Ref { raw, inner } => {
                let reference = parse_reference(inner)
                    .map_err(|e| EngineError::resolution(format!("{raw}: {}", e.message)))?;
                out.push_str(scopes.lookup(reference, raw)?);
            }
        }
    }
    Ok(out)
}

/// Resolve every value of a string map, keeping key order.
pub fn resolve_map(
    map: &IndexMap<String, String>,
    scopes: &Scopes<'_>,
) -> Result<IndexMap<String, String>, EngineError> {
    map.iter().map(|(k, v)| Ok((k.clone(), resolve(v, scopes)?))).collect()
}

/// Resolve the string leaves of a JSON value. Other leaves are copied.
pub fn resolve_value(value: &Value, scopes: &Scopes<'_>) -> Result<Value, EngineError> {
    match value {
        Value::String(s) => Ok(Value::String(resolve(s, scopes)?)),
        Value::Array(items) => {
            items.iter().map(|v| resolve_value(v, scopes)).collect::<Result<_, _>>().map(Value::Array)
        }
        Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| Ok((k.clone(), resolve_value(v, scopes)?)))
            .collect::<Result<_, EngineError>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Validate the string leaves of a JSON value.
pub fn validate_value(value: &Value) -> Result<(), EngineError> {
    match value {
        Value::String(s) => validate(s),
        Value::Array(items) => items.iter().try_for_each(validate_value),
        Value::Object(obj) => obj.values().try_for_each(validate_value),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
