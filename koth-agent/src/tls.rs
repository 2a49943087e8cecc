//! TLS listener
//!
//! Builds a rustls server configuration from PEM material and serves the
//! router over it, one task per accepted connection.

use crate::{WebError, WebResult};
use axum::Router;
use hyper::{body::Incoming, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto, graceful::GracefulShutdown},
};
use koth_core::{AgentError, ErrorContext, TlsMode};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};

/// How long shutdown waits for open connections to finish
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn tls_error(message: String) -> WebError {
    WebError::Agent(AgentError::Tls {
        message,
        source: None,
        context: ErrorContext::new("tls")
            .with_operation("build_server_config")
            .with_suggestion("Check that the key matches the certificate and both are PEM encoded"),
    })
}

/// Server configuration for the given mode; `None` when TLS is disabled
pub fn load_server_config(mode: &TlsMode) -> WebResult<Option<Arc<ServerConfig>>> {
    match mode.load()? {
        Some(material) => build_server_config(&material.cert_pem, &material.key_pem).map(Some),
        None => Ok(None),
    }
}

/// Build a server configuration from a PEM certificate chain and private key
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> WebResult<Arc<ServerConfig>> {
    let certs = parse_certificates(cert_pem)?;
    if certs.is_empty() {
        return Err(tls_error("no certificates found".into()));
    }
    let key = parse_private_key(key_pem)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error(format!("protocol configuration error: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| tls_error(format!("invalid key pair: {e}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Parse PEM-encoded certificates.
fn parse_certificates(pem: &[u8]) -> WebResult<Vec<CertificateDer<'static>>> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(format!("failed to parse certificates: {e}")))
}

/// Parse PEM-encoded private key.
fn parse_private_key(pem: &[u8]) -> WebResult<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| tls_error(format!("failed to parse private key: {e}")))
}

/// Serve `app` over TLS until `shutdown` resolves.
///
/// Handshake and connection errors only affect the connection they happen on.
/// After `shutdown`, in-flight requests are allowed to finish for up to
/// `DRAIN_TIMEOUT`.
pub async fn serve_tls<F>(
    listener: TcpListener,
    app: Router,
    tls_config: Arc<ServerConfig>,
    shutdown: F,
) -> WebResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let acceptor = TlsAcceptor::from(tls_config);
    let mut make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down TLS listener");
                break;
            }
        };

        // Always ready, and infallible.
        let tower_service = match make_service.call(peer).await {
            Ok(service) => service,
            Err(never) => match never {},
        };
        let acceptor = acceptor.clone();
        let watcher = graceful.watcher();

        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };

            let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
                tower_service.clone().oneshot(request)
            });

            let builder = auto::Builder::new(TokioExecutor::new());
            let connection =
                builder.serve_connection_with_upgrades(TokioIo::new(stream), hyper_service);
            if let Err(e) = watcher.watch(connection).await {
                debug!(peer = %peer, error = %e, "Connection closed with error");
            }
        });
    }

    drop(listener);
    tokio::select! {
        _ = graceful.shutdown() => debug!("All TLS connections closed"),
        _ = tokio::time::sleep(DRAIN_TIMEOUT) => {
            warn!("Timed out waiting for TLS connections to close");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &str = include_str!("../tests/fixtures/cert.pem");
    const KEY: &str = include_str!("../tests/fixtures/key.pem");

    #[test]
    fn test_disabled_mode_has_no_config() {
        assert!(load_server_config(&TlsMode::Disabled).unwrap().is_none());
    }

    #[test]
    fn test_inline_material() {
        let mode = TlsMode::resolve("", "", KEY, CERT);
        let config = load_server_config(&mode).unwrap().unwrap();
        assert!(config.alpn_protocols.contains(&b"h2".to_vec()));
    }

    #[test]
    fn test_file_material() {
        let dir = env!("CARGO_MANIFEST_DIR");
        let mode = TlsMode::resolve(
            &format!("{dir}/tests/fixtures/key.pem"),
            &format!("{dir}/tests/fixtures/cert.pem"),
            "",
            "",
        );
        assert!(load_server_config(&mode).unwrap().is_some());
    }

    #[test]
    fn test_invalid_material_is_fatal() {
        let err = build_server_config(b"not a certificate", KEY.as_bytes()).unwrap_err();
        assert!(matches!(err, WebError::Agent(ref e) if e.is_startup_fatal()));

        // Key and certificate swapped.
        assert!(build_server_config(KEY.as_bytes(), CERT.as_bytes()).is_err());
    }
}
