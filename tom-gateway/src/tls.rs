//! TLS 1.2+ termination: refuses to start without `cert.pem`/`key.pem`,
//! optionally appends `chain.pem`, and drives the axum router over a
//! manual rustls accept loop (no `axum-server` dependency, just the
//! rustls/tokio-rustls stack).

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use rustls::ServerConfig;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower::Service;

/// Build the `rustls::ServerConfig` from PEM files under `tls_dir`. Exits
/// the process if `cert.pem`/`key.pem` are missing — TLS is not optional
/// for this gateway.
pub fn load_server_config(tls_dir: impl AsRef<Path>) -> std::io::Result<ServerConfig> {
    let tls_dir = tls_dir.as_ref();
    let cert_path = tls_dir.join("cert.pem");
    let key_path = tls_dir.join("key.pem");
    let chain_path = tls_dir.join("chain.pem");

    if !cert_path.exists() {
        log::error!("TLS certificate not found: {}", cert_path.display());
        std::process::exit(1);
    }
    if !key_path.exists() {
        log::error!("TLS private key not found: {}", key_path.display());
        std::process::exit(1);
    }

    let mut cert_chain = load_certs(&cert_path)?;
    if chain_path.exists() {
        log::info!("certificate chain: {}", chain_path.display());
        cert_chain.extend(load_certs(&chain_path)?);
    }
    let key = load_key(&key_path)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

fn load_certs(path: &Path) -> std::io::Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()
}

fn load_key(path: &Path) -> std::io::Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "no private key found in key.pem"))
}

/// Accept loop: terminate TLS on every connection, then hand it to the
/// axum router via hyper's auto (HTTP/1.1 + HTTP/2) connection builder.
pub async fn serve(listener: TcpListener, tls_config: ServerConfig, app: Router) -> std::io::Result<()> {
    let acceptor = TlsAcceptor::from(Arc::new(tls_config));
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("failed to accept connection: {e}");
                continue;
            }
        };
        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    log::debug!("TLS handshake with {peer} failed: {e}");
                    return;
                }
            };
            let io = TokioIo::new(tls_stream);
            let service = hyper::service::service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                let mut app = app.clone();
                async move { app.call(req.map(axum::body::Body::new)).await }
            });
            if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                log::debug!("connection with {peer} closed with error: {e}");
            }
        });
    }
}
