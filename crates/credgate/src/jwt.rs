// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-signed JWT assertions built from a [`JwtSchema`].
//!
//! The compact form is `b64(header).b64(body).b64(signature)` with URL-safe,
//! unpadded base64. A new assertion (fresh uuid and time fields) is produced
//! on every call; assertions are never cached.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, Ed25519KeyPair, RsaKeyPair};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::PrivateKeyDer;
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::schema::{JwtPartialSchema, JwtSchema};
use crate::template::{self, Scopes};

/// Supported JWS signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtAlgorithm {
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
    Es256,
    Es384,
    EdDsa,
}

impl JwtAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::EdDsa => "EdDSA",
        }
    }

    fn rsa_encoding(&self) -> Option<&'static dyn signature::RsaEncoding> {
        match self {
            Self::Rs256 => Some(&signature::RSA_PKCS1_SHA256),
            Self::Rs384 => Some(&signature::RSA_PKCS1_SHA384),
            Self::Rs512 => Some(&signature::RSA_PKCS1_SHA512),
            Self::Ps256 => Some(&signature::RSA_PSS_SHA256),
            Self::Ps384 => Some(&signature::RSA_PSS_SHA384),
            Self::Ps512 => Some(&signature::RSA_PSS_SHA512),
            _ => None,
        }
    }
}

impl FromStr for JwtAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" | "SHA256withRSA" => Ok(Self::Rs256),
            "RS384" | "SHA384withRSA" => Ok(Self::Rs384),
            "RS512" | "SHA512withRSA" => Ok(Self::Rs512),
            "PS256" => Ok(Self::Ps256),
            "PS384" => Ok(Self::Ps384),
            "PS512" => Ok(Self::Ps512),
            "ES256" | "SHA256withECDSA" => Ok(Self::Es256),
            "ES384" | "SHA384withECDSA" => Ok(Self::Es384),
            "EdDSA" | "Ed25519" => Ok(Self::EdDsa),
            _ => Err(EngineError::signature(format!("unsupported signature algorithm {s:?}"))),
        }
    }
}

impl fmt::Display for JwtAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum KeyMaterial {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
    Ed25519(Ed25519KeyPair),
}

/// A private key paired with the algorithm it signs for.
pub struct SigningKey {
    algorithm: JwtAlgorithm,
    material: KeyMaterial,
    rng: SystemRandom,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").field("algorithm", &self.algorithm).finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Load a PEM private key (PKCS#8, or PKCS#1 for RSA) for `algorithm`.
    pub fn load(algorithm: JwtAlgorithm, path: &Path) -> Result<Self, EngineError> {
        let key = PrivateKeyDer::from_pem_file(path)
            .map_err(|e| EngineError::signature(format!("{}: {e}", path.display())))?;
        Self::from_der(algorithm, &key)
            .map_err(|e| EngineError::signature(format!("{}: {}", path.display(), e.message)))
    }

    pub fn from_der(algorithm: JwtAlgorithm, key: &PrivateKeyDer<'_>) -> Result<Self, EngineError> {
        let rng = SystemRandom::new();
        let rejected = |e: ring::error::KeyRejected| {
            EngineError::signature(format!("key rejected for {algorithm}: {e}"))
        };
        let material = match (algorithm, key) {
            (JwtAlgorithm::Es256, PrivateKeyDer::Pkcs8(der)) => KeyMaterial::Ecdsa(
                EcdsaKeyPair::from_pkcs8(
                    &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
                    der.secret_pkcs8_der(),
                    &rng,
                )
                .map_err(rejected)?,
            ),
            (JwtAlgorithm::Es384, PrivateKeyDer::Pkcs8(der)) => KeyMaterial::Ecdsa(
                EcdsaKeyPair::from_pkcs8(
                    &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
                    der.secret_pkcs8_der(),
                    &rng,
                )
                .map_err(rejected)?,
            ),
            (JwtAlgorithm::EdDsa, PrivateKeyDer::Pkcs8(der)) => KeyMaterial::Ed25519(
                Ed25519KeyPair::from_pkcs8_maybe_unchecked(der.secret_pkcs8_der())
                    .map_err(rejected)?,
            ),
            (alg, PrivateKeyDer::Pkcs8(der)) if alg.rsa_encoding().is_some() => {
                KeyMaterial::Rsa(RsaKeyPair::from_pkcs8(der.secret_pkcs8_der()).map_err(rejected)?)
            }
            (alg, PrivateKeyDer::Pkcs1(der)) if alg.rsa_encoding().is_some() => {
                KeyMaterial::Rsa(RsaKeyPair::from_der(der.secret_pkcs1_der()).map_err(rejected)?)
            }
            (alg, _) => {
                return Err(EngineError::signature(format!(
                    "key format does not match algorithm {alg}"
                )))
            }
        };
        Ok(Self { algorithm, material, rng })
    }

    pub fn algorithm(&self) -> JwtAlgorithm {
        self.algorithm
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, EngineError> {
        let failed = |_| EngineError::signature(format!("{} signing failed", self.algorithm));
        match &self.material {
            KeyMaterial::Rsa(pair) => {
                let encoding = self.algorithm.rsa_encoding().ok_or_else(|| {
                    EngineError::signature(format!("{} is not an RSA algorithm", self.algorithm))
                })?;
                let mut sig = vec![0u8; pair.public().modulus_len()];
                pair.sign(encoding, &self.rng, message, &mut sig).map_err(failed)?;
                Ok(sig)
            }
            KeyMaterial::Ecdsa(pair) => {
                pair.sign(&self.rng, message).map(|s| s.as_ref().to_vec()).map_err(failed)
            }
            KeyMaterial::Ed25519(pair) => Ok(pair.sign(message).as_ref().to_vec()),
        }
    }
}

/// Build and sign one assertion at `now_secs`.
pub fn build_assertion(
    schema: &JwtSchema,
    key: &SigningKey,
    scopes: &Scopes<'_>,
    now_secs: u64,
) -> Result<String, EngineError> {
    let mut header = build_partial(&schema.header, scopes, now_secs, schema.ttl)?;
    let alg = key.algorithm().as_str();
    match header.get("alg") {
        None => {
            header.insert("alg".to_owned(), Value::String(alg.to_owned()));
        }
        Some(Value::String(s)) if s == alg => {}
        Some(other) => {
            return Err(EngineError::signature(format!(
                "header alg {other} does not match signing algorithm {alg}"
            )));
        }
    }
    let body = build_partial(&schema.body, scopes, now_secs, schema.ttl)?;

    let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&body)?);
    let signature = key.sign(signing_input.as_bytes())?;
    Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

fn build_partial(
    partial: &JwtPartialSchema,
    scopes: &Scopes<'_>,
    now_secs: u64,
    ttl: u64,
) -> Result<Map<String, Value>, EngineError> {
    let mut out = Map::new();
    for (name, value) in &partial.static_fields {
        out.insert(name.clone(), template::resolve_value(value, scopes)?);
    }
    for name in &partial.uuid {
        out.insert(name.clone(), Value::String(uuid::Uuid::new_v4().to_string()));
    }
    for name in &partial.current_time {
        out.insert(name.clone(), Value::from(now_secs));
    }
    for name in &partial.expiry_time {
        out.insert(name.clone(), Value::from(now_secs.saturating_add(ttl)));
    }
    Ok(out)
}

fn encode_segment(segment: &Map<String, Value>) -> Result<String, EngineError> {
    let json = serde_json::to_vec(segment)
        .map_err(|e| EngineError::signature(format!("jwt segment encoding: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
