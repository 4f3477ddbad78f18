//! TLS support (feature `tls`).
//!
//! TLS is negotiated by sending an `SSLRequest` before the startup message;
//! when the server answers `S` the TCP stream is wrapped in a rustls client
//! stream and the handshake completes on first use.

#![cfg(feature = "tls")]

use std::net::TcpStream;
use std::sync::Arc;

use pgfoundation_core::error::{ConnectionErrorKind, Error, Result};

use crate::config::SslMode;

pub(crate) type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

fn tls_error(message: impl Into<String>) -> Error {
    Error::connection(ConnectionErrorKind::Ssl, message)
}

/// Wrap an already negotiated TCP stream.
pub(crate) fn wrap(stream: TcpStream, host: &str, ssl_mode: SslMode) -> Result<TlsStream> {
    let config = build_client_config(ssl_mode)?;
    let name: rustls::pki_types::ServerName<'static> = host
        .to_string()
        .try_into()
        .map_err(|e| tls_error(format!("invalid server name '{host}': {e}")))?;
    let conn = rustls::ClientConnection::new(Arc::new(config), name)
        .map_err(|e| tls_error(format!("TLS setup failed: {e}")))?;
    Ok(rustls::StreamOwned::new(conn, stream))
}

/// `Prefer`/`Require` encrypt without verifying; `VerifyFull` checks the
/// certificate chain against the webpki roots and the host name.
fn build_client_config(ssl_mode: SslMode) -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .map_err(|e| tls_error(format!("failed to set TLS versions: {e}")))?;

    match ssl_mode {
        SslMode::Disable => Err(tls_error("TLS requested with ssl mode Disable")),
        SslMode::Prefer | SslMode::Require => Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth()),
        SslMode::VerifyFull => {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            Ok(builder.with_root_certificates(roots).with_no_client_auth())
        }
    }
}

#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
