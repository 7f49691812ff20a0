//! Rustls client configuration

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};

use crate::error::ConfigError;

pub use rustls::ClientConfig as TlsClientConfig;

/// Client configuration trusting the Mozilla roots shipped in `webpki-roots`,
/// using the ring crypto provider and advertising only HTTP/1.1 over ALPN.
///
/// # Errors
///
/// Returns `ConfigError::Tls` if the provider rejects the default protocol
/// versions.
pub fn default_client_config() -> Result<Arc<ClientConfig>, ConfigError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| ConfigError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(Arc::new(config))
}
