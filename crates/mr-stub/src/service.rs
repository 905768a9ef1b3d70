//! Stub service: wires state, broker, router and relay together and owns the
//! server lifecycle.

use crate::api::{build_router, tls};
use crate::bridge::{BridgeRelay, HttpUpstream, Upstream};
use crate::broker::Broker;
use crate::domain::config::StubConfig;
use crate::domain::error::ServiceError;
use crate::store::SharedState;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cloneable trigger for graceful shutdown
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Stop the HTTP server and every relay loop
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// The message-router stub
pub struct StubService {
    config: StubConfig,
    state: Arc<SharedState>,
    broker: Arc<Broker>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl StubService {
    /// Create a service from a validated configuration
    pub fn new(config: StubConfig) -> Result<Self, ServiceError> {
        config.validate()?;

        let state = Arc::new(SharedState::new());
        let broker = Arc::new(Broker::new(Arc::clone(&state), &config));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            state,
            broker,
            shutdown_tx: Arc::new(shutdown_tx),
        })
    }

    pub fn config(&self) -> &StubConfig {
        &self.config
    }

    pub fn broker(&self) -> Arc<Broker> {
        Arc::clone(&self.broker)
    }

    pub fn router(&self) -> Router {
        build_router(self.broker(), &self.config)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Start the relay loops against `upstream`. Does nothing unless bridge
    /// mode is configured.
    pub fn spawn_bridge(&self, upstream: Arc<dyn Upstream>) -> Vec<JoinHandle<()>> {
        if !self.config.bridge.is_active() {
            return Vec::new();
        }
        BridgeRelay::new(Arc::clone(&self.state), upstream, self.config.bridge.clone())
            .spawn(self.shutdown_tx.subscribe())
    }

    /// Bind the configured addresses and serve until shutdown. The HTTPS
    /// listener is bound only when a certificate and key are configured.
    pub async fn run(self) -> Result<(), ServiceError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Bind(format!("{}: {}", addr, e)))?;

        let https = if self.config.tls.is_enabled() {
            let addr = self.config.tls_addr();
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| ServiceError::Bind(format!("{}: {}", addr, e)))?;
            Some(listener)
        } else {
            None
        };

        self.serve_with(listener, https).await
    }

    /// Serve plain HTTP on an already bound listener until shutdown.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServiceError> {
        self.serve_with(listener, None).await
    }

    /// Serve on already bound listeners until shutdown, then wait for the
    /// HTTPS listener and the relay loops to stop.
    ///
    /// `https` requires a configured certificate and key.
    pub async fn serve_with(
        self,
        listener: TcpListener,
        https: Option<TcpListener>,
    ) -> Result<(), ServiceError> {
        let https = match https {
            Some(listener) => {
                let rustls = tls::load_rustls(&self.config.tls).await?;
                let listener = listener
                    .into_std()
                    .map_err(|e| ServiceError::Bind(e.to_string()))?;
                Some((listener, rustls))
            }
            None => None,
        };

        let relays = if self.config.bridge.is_active() {
            let upstream = HttpUpstream::new(self.config.bridge.request_timeout)
                .map_err(|e| ServiceError::Upstream(e.to_string()))?;
            self.spawn_bridge(Arc::new(upstream))
        } else {
            Vec::new()
        };

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let router = self.router();

        let https_task = https.map(|(listener, rustls)| {
            tls::spawn_https(listener, rustls, router.clone(), self.shutdown_tx.subscribe())
        });

        info!(
            addr = ?listener.local_addr().ok(),
            commands_bridged = self.config.bridge.commands_bridged(),
            uploads_topics = self.config.bridge.uploads_topics(),
            "Message-router stub listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await?;

        // The server may also stop on its own; make sure the relays follow
        self.shutdown_tx.send_replace(true);
        if let Some(task) = https_task {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "HTTPS listener failed"),
                Err(e) => warn!(error = %e, "HTTPS task ended abnormally"),
            }
        }
        for handle in relays {
            if let Err(e) = handle.await {
                warn!(error = %e, "Relay task ended abnormally");
            }
        }

        info!("Message-router stub stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ConfigError;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = StubConfig::default();
        config.bridge.write_url = Some("http://mr/events/W".into());
        assert!(matches!(
            StubService::new(config),
            Err(ServiceError::Config(ConfigError::IncompleteBridge(_)))
        ));
    }

    #[tokio::test]
    async fn test_https_listener_needs_certificate() {
        let service = StubService::new(StubConfig::default()).unwrap();
        let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let https = TcpListener::bind("127.0.0.1:0").await.unwrap();
        assert!(matches!(
            service.serve_with(http, Some(https)).await,
            Err(ServiceError::Tls(_))
        ));
    }

    #[tokio::test]
    async fn test_no_relays_without_bridge() {
        struct Unused;
        #[async_trait::async_trait]
        impl Upstream for Unused {
            async fn post(
                &self,
                _url: &str,
                _content_type: &str,
                _body: String,
            ) -> Result<(), crate::bridge::UpstreamError> {
                Ok(())
            }
            async fn get(&self, _url: &str) -> Result<String, crate::bridge::UpstreamError> {
                Ok("[]".into())
            }
        }

        let service = StubService::new(StubConfig::default()).unwrap();
        assert!(service.spawn_bridge(Arc::new(Unused)).is_empty());
    }
}
