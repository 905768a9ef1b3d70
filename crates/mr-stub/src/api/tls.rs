//! HTTPS listener serving the same router as plain HTTP.

use crate::domain::config::TlsConfig;
use crate::domain::error::ServiceError;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// How long open HTTPS connections get to finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Load the PEM certificate chain and key named in `tls`.
pub async fn load_rustls(tls: &TlsConfig) -> Result<RustlsConfig, ServiceError> {
    let (Some(cert), Some(key)) = (&tls.cert_path, &tls.key_path) else {
        return Err(ServiceError::Tls("no certificate and key configured".into()));
    };

    // Fails only when a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    RustlsConfig::from_pem_file(cert, key)
        .await
        .map_err(|e| ServiceError::Tls(format!("{}: {}", cert.display(), e)))
}

/// Serve `router` over TLS on `listener` until `shutdown` turns true.
pub fn spawn_https(
    listener: std::net::TcpListener,
    rustls: RustlsConfig,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<io::Result<()>> {
    let handle = Handle::new();

    let stopper = handle.clone();
    tokio::spawn(async move {
        let _ = shutdown.wait_for(|stop| *stop).await;
        stopper.graceful_shutdown(Some(DRAIN_TIMEOUT));
    });

    info!(addr = ?listener.local_addr().ok(), "HTTPS listener started");
    tokio::spawn(
        axum_server::from_tcp_rustls(listener, rustls)
            .handle(handle)
            .serve(router.into_make_service()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_paths_rejected() {
        assert!(matches!(
            load_rustls(&TlsConfig::default()).await,
            Err(ServiceError::Tls(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_certificate_rejected() {
        let tls = TlsConfig {
            port: 0,
            cert_path: Some("/nonexistent/cert.crt".into()),
            key_path: Some("/nonexistent/key.crt".into()),
        };
        let err = load_rustls(&tls).await.err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.contains("/nonexistent/cert.crt")));
    }
}
