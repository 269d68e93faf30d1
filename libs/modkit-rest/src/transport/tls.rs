//! HTTPS connector construction for the default transport.

use crate::config::{TlsRootConfig, TransportSecurity};
use crate::error::RestError;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

/// OS root certificates, loaded once per process (may be empty).
static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

fn native_roots() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(|| {
        let loaded = rustls_native_certs::load_native_certs();
        for err in &loaded.errors {
            tracing::warn!(error = %err, "error loading native root certificate");
        }
        tracing::debug!(count = loaded.certs.len(), "loaded native root certificates");
        loaded.certs
    })
}

/// Globally installed rustls provider if there is one, aws-lc-rs otherwise.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn native_client_config() -> Result<rustls::ClientConfig, RestError> {
    let certs = native_roots();
    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(RestError::Tls(
            format!(
                "no usable native root CA certificates (found {}, {} unparsable)",
                certs.len(),
                ignored
            )
            .into(),
        ));
    }

    Ok(rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| RestError::Tls(Box::new(e)))?
        .with_root_certificates(store)
        .with_no_client_auth())
}

/// Build the connector; HTTP/1.1 and HTTP/2 are negotiated through ALPN.
///
/// # Errors
/// Returns [`RestError::Tls`] if the crypto provider or root store cannot be set up.
pub(crate) fn https_connector(
    roots: TlsRootConfig,
    security: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, RestError> {
    let builder = match roots {
        TlsRootConfig::WebPki => hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| RestError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => {
            hyper_rustls::HttpsConnectorBuilder::new().with_tls_config(native_client_config()?)
        }
    };

    let connector = match security {
        TransportSecurity::AllowInsecureHttp => builder.https_or_http().enable_all_versions().build(),
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}
