//! TLS Termination
//!
//! Builds the acceptor used by the listener when TLS is enabled.
//! Supports certificate loading from PEM files or self-signed generation for testing.

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// TLS configuration for the listener.
#[derive(Clone)]
pub struct TlsConfig {
    pub acceptor: TlsAcceptor,
}

impl TlsConfig {
    /// Load TLS config from a PEM certificate chain and a PEM private key.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> anyhow::Result<Self> {
        let cert_file = File::open(cert_path)
            .map_err(|e| anyhow::anyhow!("cannot open certificate {}: {}", cert_path.display(), e))?;
        let key_file = File::open(key_path)
            .map_err(|e| anyhow::anyhow!("cannot open private key {}: {}", key_path.display(), e))?;

        let certs: Vec<CertificateDer<'static>> =
            rustls_pemfile::certs(&mut BufReader::new(cert_file)).collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            anyhow::bail!("no certificate found in {}", cert_path.display());
        }

        let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))?
            .ok_or_else(|| anyhow::anyhow!("no private key found in {}", key_path.display()))?;

        Self::from_certs_and_key(certs, key)
    }

    /// Create TLS config from certificates and key.
    pub fn from_certs_and_key(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> anyhow::Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Generate a self-signed certificate for testing.
    pub fn self_signed(domain: &str) -> anyhow::Result<Self> {
        let subject_alt_names = vec![
            domain.to_string(),
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ];

        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(subject_alt_names)?;
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        Self::from_certs_and_key(vec![cert.der().clone()], key_der)
    }
}
