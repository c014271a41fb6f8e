// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ErrorKind;
use crate::schema::TruststoreRef;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn leaf() -> anyhow::Result<CertificateDer<'static>> {
    let mut certs = load_certificates(&fixtures().join("leaf_b.pem"))?;
    certs.pop().ok_or_else(|| anyhow::anyhow!("no leaf certificate"))
}

fn verify(verifier: &dyn ServerCertVerifier) -> anyhow::Result<bool> {
    let name = ServerName::try_from("localhost")?;
    Ok(verifier.verify_server_cert(&leaf()?, &[], &name, &[], UnixTime::now()).is_ok())
}

fn schema(truststore: Option<&str>, keystore: Option<&str>, protocol: &str) -> SslContextSchema {
    SslContextSchema {
        keystore: keystore.map(|name| KeystoreRef {
            name: name.to_owned(),
            password: None,
            key_password: None,
            algorithm: None,
        }),
        truststore: truststore.map(|name| TruststoreRef {
            name: name.to_owned(),
            password: None,
            algorithm: None,
        }),
        protocol: protocol.to_owned(),
        trust_default_roots: false,
    }
}

#[test]
fn composite_accepts_when_any_source_trusts() -> anyhow::Result<()> {
    let provider = provider();
    let only_a = trust_source(&fixtures().join("ca_a.pem"), &provider)?;
    let only_b = trust_source(&fixtures().join("ca_b.pem"), &provider)?;

    assert!(!verify(only_a.as_ref())?);
    assert!(verify(only_b.as_ref())?);

    let composite = CompositeVerifier::new(vec![Arc::clone(&only_a), only_b], &provider)?;
    assert_eq!(composite.source_count(), 2);
    assert!(verify(&composite)?);

    let just_a = CompositeVerifier::new(vec![only_a], &provider)?;
    assert!(!verify(&just_a)?);
    Ok(())
}

#[test]
fn composite_requires_a_source() {
    let err = CompositeVerifier::new(vec![], &provider()).err();
    assert_eq!(err.map(|e| e.kind), Some(ErrorKind::TlsBuild));
}

#[test]
fn builds_mutual_tls_context() -> anyhow::Result<()> {
    let schema = schema(Some("ca_b.pem"), Some("client_bundle.pem"), "TLSv1.3");
    let config = build_client_config(Some(&schema), &fixtures(), false)?;
    assert!(config.client_auth_cert_resolver.has_certs());
    assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    Ok(())
}

#[test]
fn default_context_offers_h2_when_enabled() -> anyhow::Result<()> {
    let config = build_client_config(None, &fixtures(), true)?;
    assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    Ok(())
}

#[test]
fn default_roots_can_join_the_composite() -> anyhow::Result<()> {
    let mut schema = schema(None, None, "TLS");
    schema.trust_default_roots = true;
    assert!(build_client_config(Some(&schema), &fixtures(), false).is_ok());
    Ok(())
}

#[yare::parameterized(
    no_trust = { None, None, "TLS" },
    missing_truststore = { Some("nope.pem"), None, "TLS" },
    key_as_truststore = { Some("jwt_rsa.pem"), None, "TLS" },
    keystore_without_key = { Some("ca_b.pem"), Some("ca_a.pem"), "TLS" },
    bad_protocol = { Some("ca_b.pem"), None, "SSLv3" },
)]
fn bad_material_is_a_tls_error(truststore: Option<&str>, keystore: Option<&str>, protocol: &str) {
    let schema = schema(truststore, keystore, protocol);
    let err = build_client_config(Some(&schema), &fixtures(), false).err();
    assert_eq!(err.map(|e| e.kind), Some(ErrorKind::TlsBuild));
}

#[test]
fn absolute_resource_names_are_kept() {
    assert_eq!(resource_path(Path::new("/etc/x"), "/abs/key.pem"), PathBuf::from("/abs/key.pem"));
    assert_eq!(resource_path(Path::new("/etc/x"), "rel.pem"), PathBuf::from("/etc/x/rel.pem"));
}
