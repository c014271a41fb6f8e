// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Variable scopes: flat records over a closed set of named fields.

use std::fmt;

use crate::schema::RouteConfig;

/// Every field a scope can hold. Names are matched exactly (camelCase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeField {
    GrantType,
    Issuer,
    Subject,
    Audience,
    CertFilename,
    CertPassword,
    Username,
    Password,
    ClientId,
    ClientSecret,
    Scope,
    ResponseType,
    Expiration,
    AccessToken,
    ConstructedJwt,
    TokenTtl,
    TokenTtlUnit,
    WaitLength,
    TokenUrl,
}

impl ScopeField {
    pub const ALL: [ScopeField; 19] = [
        Self::GrantType,
        Self::Issuer,
        Self::Subject,
        Self::Audience,
        Self::CertFilename,
        Self::CertPassword,
        Self::Username,
        Self::Password,
        Self::ClientId,
        Self::ClientSecret,
        Self::Scope,
        Self::ResponseType,
        Self::Expiration,
        Self::AccessToken,
        Self::ConstructedJwt,
        Self::TokenTtl,
        Self::TokenTtlUnit,
        Self::WaitLength,
        Self::TokenUrl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GrantType => "grantType",
            Self::Issuer => "issuer",
            Self::Subject => "subject",
            Self::Audience => "audience",
            Self::CertFilename => "certFilename",
            Self::CertPassword => "certPassword",
            Self::Username => "username",
            Self::Password => "password",
            Self::ClientId => "clientId",
            Self::ClientSecret => "clientSecret",
            Self::Scope => "scope",
            Self::ResponseType => "responseType",
            Self::Expiration => "expiration",
            Self::AccessToken => "accessToken",
            Self::ConstructedJwt => "constructedJwt",
            Self::TokenTtl => "tokenTtl",
            Self::TokenTtlUnit => "tokenTtlUnit",
            Self::WaitLength => "waitLength",
            Self::TokenUrl => "tokenUrl",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let field = match name {
            "grantType" => Self::GrantType,
            "issuer" => Self::Issuer,
            "subject" => Self::Subject,
            "audience" => Self::Audience,
            "certFilename" => Self::CertFilename,
            "certPassword" => Self::CertPassword,
            "username" => Self::Username,
            "password" => Self::Password,
            "clientId" => Self::ClientId,
            "clientSecret" => Self::ClientSecret,
            "scope" => Self::Scope,
            "responseType" => Self::ResponseType,
            "expiration" => Self::Expiration,
            "accessToken" => Self::AccessToken,
            "constructedJwt" => Self::ConstructedJwt,
            "tokenTtl" => Self::TokenTtl,
            "tokenTtlUnit" => Self::TokenTtlUnit,
            "waitLength" => Self::WaitLength,
            "tokenUrl" => Self::TokenUrl,
            _ => return None,
        };
        Some(field)
    }

    /// Fields whose values are masked in `Debug` output.
    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            Self::CertPassword
                | Self::Password
                | Self::ClientSecret
                | Self::AccessToken
                | Self::ConstructedJwt
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// The two scope instances a template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeName {
    /// Derived from the route configuration. Read-only during resolution.
    Config,
    /// Populated from the token endpoint's reply.
    Response,
}

impl ScopeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Response => "response",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "config" => Some(Self::Config),
            "response" => Some(Self::Response),
            _ => None,
        }
    }
}

/// A flat record of optional string values keyed by [`ScopeField`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct VariableScope {
    values: [Option<String>; ScopeField::ALL.len()],
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the config scope for a route.
    pub fn from_route(route: &RouteConfig) -> Self {
        let mut scope = Self::new();
        let mut put = |field: ScopeField, value: Option<&str>| {
            if let Some(v) = value {
                scope.set(field, v);
            }
        };
        put(ScopeField::GrantType, route.grant_type.as_deref());
        put(ScopeField::Issuer, route.issuer.as_deref());
        put(ScopeField::Subject, route.subject.as_deref());
        put(ScopeField::Audience, route.audience.as_deref());
        put(ScopeField::CertFilename, route.cert_filename.as_deref());
        put(ScopeField::CertPassword, route.cert_password.as_ref().map(|s| s.expose()));
        put(ScopeField::Username, route.username.as_deref());
        put(ScopeField::Password, route.password.as_ref().map(|s| s.expose()));
        put(ScopeField::ClientId, route.client_id.as_deref());
        put(ScopeField::ClientSecret, route.client_secret.as_ref().map(|s| s.expose()));
        put(ScopeField::Scope, route.scope.as_deref());
        put(ScopeField::ResponseType, route.response_type.as_deref());
        put(ScopeField::TokenUrl, Some(route.token_url.as_str()));
        scope.set(ScopeField::TokenTtl, route.token_ttl.to_string());
        scope.set(ScopeField::TokenTtlUnit, route.token_ttl_unit.as_str());
        scope.set(ScopeField::WaitLength, route.wait_length.to_string());
        scope
    }

    pub fn get(&self, field: ScopeField) -> Option<&str> {
        self.values[field.index()].as_deref()
    }

    pub fn set(&mut self, field: ScopeField, value: impl Into<String>) {
        self.values[field.index()] = Some(value.into());
    }

    pub fn clear(&mut self, field: ScopeField) {
        self.values[field.index()] = None;
    }

    /// Iterate over the fields that currently hold a value.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeField, &str)> {
        ScopeField::ALL.iter().filter_map(move |f| self.get(*f).map(|v| (*f, v)))
    }
}

impl fmt::Debug for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (field, value) in self.iter() {
            if field.is_sensitive() {
                map.entry(&field.name(), &"[REDACTED]");
            } else {
                map.entry(&field.name(), &value);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_the_table() {
        for field in ScopeField::ALL {
            assert_eq!(ScopeField::from_name(field.name()), Some(field));
        }
        assert_eq!(ScopeField::from_name("AccessToken"), None);
        assert_eq!(ScopeField::from_name("refreshToken"), None);
    }

    #[test]
    fn debug_masks_sensitive_fields() {
        let mut scope = VariableScope::new();
        scope.set(ScopeField::ClientId, "svc-a");
        scope.set(ScopeField::ClientSecret, "s3cr3t");
        scope.set(ScopeField::AccessToken, "tok");
        let out = format!("{scope:?}");
        assert!(out.contains("svc-a"));
        assert!(!out.contains("s3cr3t"));
        assert!(!out.contains("tok\""));
    }

    #[test]
    fn set_get_clear() {
        let mut scope = VariableScope::new();
        assert_eq!(scope.get(ScopeField::Scope), None);
        scope.set(ScopeField::Scope, "read write");
        assert_eq!(scope.get(ScopeField::Scope), Some("read write"));
        scope.clear(ScopeField::Scope);
        assert_eq!(scope.get(ScopeField::Scope), None);
    }
}
