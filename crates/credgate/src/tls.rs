// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client TLS contexts for token endpoints.
//!
//! Keystores are PEM bundles holding a certificate chain and a private key.
//! Truststores are PEM certificate files. Every trust source becomes its own
//! webpki verifier; [`CompositeVerifier`] accepts a server certificate when
//! any of them does.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::EngineError;
use crate::schema::{KeystoreRef, SslContextSchema};

/// Resolve a keystore/truststore name against the resource directory.
pub fn resource_path(resource_dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        resource_dir.join(path)
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a client TLS config. `None` yields the default context: the bundled
/// Mozilla roots and no client certificate.
pub fn build_client_config(
    schema: Option<&SslContextSchema>,
    resource_dir: &Path,
    enable_http2: bool,
) -> Result<ClientConfig, EngineError> {
    let provider = provider();
    let mut config = match schema {
        None => ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| EngineError::tls(format!("protocol versions: {e}")))?
            .with_root_certificates(default_roots())
            .with_no_client_auth(),
        Some(schema) => {
            let versions = protocol_versions(&schema.protocol)?;
            let verifier = CompositeVerifier::from_schema(schema, resource_dir, &provider)?;
            let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
                .with_protocol_versions(versions)
                .map_err(|e| EngineError::tls(format!("protocol {}: {e}", schema.protocol)))?
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(verifier));
            match &schema.keystore {
                Some(keystore) => {
                    let (chain, key) = load_keystore(keystore, resource_dir)?;
                    builder
                        .with_client_auth_cert(chain, key)
                        .map_err(|e| EngineError::tls(format!("keystore {}: {e}", keystore.name)))?
                }
                None => builder.with_no_client_auth(),
            }
        }
    };
    config.alpn_protocols = if enable_http2 {
        vec![b"h2".to_vec(), b"http/1.1".to_vec()]
    } else {
        vec![b"http/1.1".to_vec()]
    };
    Ok(config)
}

fn protocol_versions(
    protocol: &str,
) -> Result<&'static [&'static rustls::SupportedProtocolVersion], EngineError> {
    static TLS12: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS12];
    static TLS13: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS13];
    match protocol {
        "TLSv1.2" => Ok(TLS12),
        "TLSv1.3" => Ok(TLS13),
        "TLS" | "TLSv1.2+" | "" => Ok(rustls::ALL_VERSIONS),
        other => Err(EngineError::tls(format!("unsupported TLS protocol {other:?}"))),
    }
}

fn default_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

fn load_keystore(
    keystore: &KeystoreRef,
    resource_dir: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), EngineError> {
    let path = resource_path(resource_dir, &keystore.name);
    let chain = load_certificates(&path)?;
    if chain.is_empty() {
        return Err(EngineError::tls(format!("keystore {}: no certificates", path.display())));
    }
    let key = PrivateKeyDer::from_pem_file(&path)
        .map_err(|e| EngineError::tls(format!("keystore {}: {e}", path.display())))?;
    Ok((chain, key))
}

fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, EngineError> {
    CertificateDer::pem_file_iter(path)
        .and_then(|certs| certs.collect::<Result<Vec<_>, _>>())
        .map_err(|e| EngineError::tls(format!("{}: {e}", path.display())))
}

/// Verifier over a single PEM trust file.
pub fn trust_source(
    path: &Path,
    provider: &Arc<CryptoProvider>,
) -> Result<Arc<dyn ServerCertVerifier>, EngineError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certificates(path)? {
        roots.add(cert).map_err(|e| EngineError::tls(format!("{}: {e}", path.display())))?;
    }
    if roots.is_empty() {
        return Err(EngineError::tls(format!("truststore {}: no certificates", path.display())));
    }
    verifier_for(roots, provider)
}

fn verifier_for(
    roots: RootCertStore,
    provider: &Arc<CryptoProvider>,
) -> Result<Arc<dyn ServerCertVerifier>, EngineError> {
    let verifier: Arc<dyn ServerCertVerifier> =
        WebPkiServerVerifier::builder_with_provider(Arc::new(roots), Arc::clone(provider))
            .build()
            .map_err(|e| EngineError::tls(format!("trust verifier: {e}")))?;
    Ok(verifier)
}

/// Union of trust sources: a chain is trusted when any source trusts it.
#[derive(Debug)]
pub struct CompositeVerifier {
    sources: Vec<Arc<dyn ServerCertVerifier>>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl CompositeVerifier {
    pub fn new(
        sources: Vec<Arc<dyn ServerCertVerifier>>,
        provider: &CryptoProvider,
    ) -> Result<Self, EngineError> {
        if sources.is_empty() {
            return Err(EngineError::tls("no trust sources configured"));
        }
        Ok(Self { sources, algorithms: provider.signature_verification_algorithms })
    }

    fn from_schema(
        schema: &SslContextSchema,
        resource_dir: &Path,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Self, EngineError> {
        let mut sources = Vec::new();
        if let Some(truststore) = &schema.truststore {
            sources.push(trust_source(&resource_path(resource_dir, &truststore.name), provider)?);
        }
        if schema.trust_default_roots {
            sources.push(verifier_for(default_roots(), provider)?);
        }
        Self::new(sources, provider)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl ServerCertVerifier for CompositeVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let mut last = rustls::Error::General("no trust sources".into());
        for source in &self.sources {
            match source.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
            {
                Ok(verified) => return Ok(verified),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tests;
