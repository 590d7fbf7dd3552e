//! TLS support using rustls.
//!
//! Builds the acceptor used by the HTTPS listener from the PEM files named in
//! `api.certificate_file` and `api.private_key_file`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use backup_controller_core::config::ApiConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// Load certificates from PEM file
fn load_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("open certificate {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parse certificate {}", path.display()))?;
    if certs.is_empty() {
        anyhow::bail!("No certificate found in {}", path.display());
    }
    Ok(certs)
}

/// Load the first private key (PKCS#8, PKCS#1 or SEC1) from PEM file
fn load_private_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("open private key {}", path.display()))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("parse private key {}", path.display()))?
        .ok_or_else(|| anyhow::anyhow!("No valid private key found in {}", path.display()))
}

/// Create a TLS acceptor for the API listener.
///
/// The crypto provider is passed explicitly so the process never depends on a
/// globally installed default.
pub fn create_tls_acceptor(api: &ApiConfig) -> anyhow::Result<TlsAcceptor> {
    let (Some(cert_path), Some(key_path)) = (&api.certificate_file, &api.private_key_file) else {
        anyhow::bail!("TLS enabled but certificate_file/private_key_file not configured");
    };

    tracing::info!(cert = %cert_path.display(), "Loading TLS certificate");
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut server_config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .context("select TLS protocol versions")?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .context("certificate and private key do not match")?;
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    tracing::info!("TLS acceptor initialized");
    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
