//! Background loops relaying local queues to and from the upstream broker.
//!
//! Each loop retries its head item forever on failure and never skips ahead,
//! so per-queue FIFO order survives an unreachable upstream. Every sleep and
//! every in-flight upstream call also watches the shutdown signal.

use crate::bridge::upstream::Upstream;
use crate::broker::parse_downloaded_responses;
use crate::domain::config::BridgeConfig;
use crate::domain::error::MIME_JSON;
use crate::store::SharedState;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The relay loops and what they share.
#[derive(Clone)]
pub struct BridgeRelay {
    state: Arc<SharedState>,
    upstream: Arc<dyn Upstream>,
    config: BridgeConfig,
}

impl BridgeRelay {
    pub fn new(state: Arc<SharedState>, upstream: Arc<dyn Upstream>, config: BridgeConfig) -> Self {
        Self {
            state,
            upstream,
            config,
        }
    }

    /// Spawn every loop the configuration enables.
    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let (Some(read_url), Some(write_url)) = (&self.config.read_url, &self.config.write_url) {
            handles.push(tokio::spawn(
                self.clone().run_uploader(write_url.clone(), shutdown.clone()),
            ));
            handles.push(tokio::spawn(
                self.clone().run_downloader(read_url.clone(), shutdown.clone()),
            ));
        }
        if let Some(base_url) = &self.config.upload_base_url {
            handles.push(tokio::spawn(
                self.clone().run_generic_uploader(base_url.clone(), shutdown),
            ));
        }

        info!(loops = handles.len(), "Bridge relay started");
        handles
    }

    /// Forward queued commands, oldest first, to `url`.
    pub async fn run_uploader(self, url: String, mut shutdown: watch::Receiver<bool>) {
        info!(url = %url, "Command uploader started");
        loop {
            let head = self.state.lock().peek_command();
            let Some(head) = head else {
                if !pause(&mut shutdown, self.config.idle_interval).await {
                    break;
                }
                continue;
            };

            let result = match serde_json::to_string(&head.item) {
                Ok(body) => {
                    let call = self.upstream.post(&url, MIME_JSON, body);
                    match until_shutdown(&mut shutdown, call).await {
                        Some(r) => r.map_err(|e| e.to_string()),
                        None => break,
                    }
                }
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok(()) => {
                    let popped = self.state.with(|s| s.pop_command_if(head.seq));
                    debug!(
                        correlation_id = %head.item.correlation_id,
                        popped = popped,
                        "Uploaded command"
                    );
                }
                Err(e) => {
                    warn!(
                        correlation_id = %head.item.correlation_id,
                        error = %e,
                        "Command upload failed, retrying"
                    );
                    if !pause(&mut shutdown, self.config.retry_backoff).await {
                        break;
                    }
                }
            }
        }
        info!("Command uploader stopped");
    }

    /// Pull response batches from `url` into the response map.
    pub async fn run_downloader(self, url: String, mut shutdown: watch::Receiver<bool>) {
        info!(url = %url, "Response downloader started");
        loop {
            let Some(result) = until_shutdown(&mut shutdown, self.upstream.get(&url)).await else {
                break;
            };

            let batch = result
                .map_err(|e| e.to_string())
                .and_then(|body| parse_downloaded_responses(&body).map_err(|e| e.to_string()));

            match batch {
                Ok(items) if items.is_empty() => {
                    if !pause(&mut shutdown, self.config.idle_interval).await {
                        break;
                    }
                }
                Ok(items) => {
                    let count = self.state.with(|s| s.store_responses(items));
                    info!(count = count, "Downloaded responses");
                }
                Err(e) => {
                    warn!(error = %e, "Response download failed, batch dropped");
                    if !pause(&mut shutdown, self.config.retry_backoff).await {
                        break;
                    }
                }
            }
        }
        info!("Response downloader stopped");
    }

    /// Forward the head of every upload-flagged topic to
    /// `{base_url}/events/{topic}`.
    pub async fn run_generic_uploader(self, base_url: String, mut shutdown: watch::Receiver<bool>) {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!(url = %base_url, "Generic topic uploader started");
        'sweep: loop {
            let heads = self.state.lock().upload_heads();
            if heads.is_empty() {
                if !pause(&mut shutdown, self.config.idle_interval).await {
                    break;
                }
                continue;
            }

            let mut failed = false;
            for head in heads {
                let url = format!("{}/events/{}", base_url, head.topic);
                let call = self
                    .upstream
                    .post(&url, head.message.content_type(), head.message.to_body());
                match until_shutdown(&mut shutdown, call).await {
                    None => break 'sweep,
                    Some(Ok(())) => {
                        self.state.with(|s| s.pop_message_if(&head.topic, head.seq));
                        debug!(topic = %head.topic, "Uploaded topic message");
                    }
                    Some(Err(e)) => {
                        warn!(topic = %head.topic, error = %e, "Topic upload failed, retrying");
                        failed = true;
                    }
                }
            }

            if failed && !pause(&mut shutdown, self.config.retry_backoff).await {
                break;
            }
        }
        info!("Generic topic uploader stopped");
    }
}

/// Sleep for `duration`. Returns false if shutdown was signalled first.
async fn pause(shutdown: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => !*shutdown.borrow(),
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}

/// Await `fut` unless shutdown is signalled first.
async fn until_shutdown<F: Future>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output> {
    if *shutdown.borrow() {
        return None;
    }
    tokio::select! {
        out = fut => Some(out),
        _ = shutdown.changed() => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pause_completes_without_shutdown() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(pause(&mut rx, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_pause_interrupted_by_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let sleeper = tokio::spawn(async move { pause(&mut rx, Duration::from_secs(3600)).await });
        tx.send(true).unwrap();
        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn test_until_shutdown_skips_when_already_stopped() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert_eq!(until_shutdown(&mut rx, async { 7 }).await, None);
    }

    #[tokio::test]
    async fn test_until_shutdown_returns_output() {
        let (_tx, mut rx) = watch::channel(false);
        assert_eq!(until_shutdown(&mut rx, async { 7 }).await, Some(7));
    }
}
