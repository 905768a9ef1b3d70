//! Broker operations over the shared state.
//!
//! ```text
//!   driver ──/send-request──────→ ┌──────────────┐ ──long-poll──→ consumer
//!          ←─/receive-response─── │    Broker    │ ←─responses─── consumer
//!                                 │ (one lock)   │
//!   publisher ──/events/{topic}─→ │  topics      │ ──long-poll──→ subscriber
//!                                 └──────┬───────┘
//!                                        │ bridge mode
//!                                        ▼
//!                                  BridgeRelay ⇄ upstream broker
//! ```
//!
//! [`Broker`] is the façade handlers call. It enforces the mode rules (which
//! endpoints are open to direct callers while the relay owns a channel) and
//! keeps every state change inside a single lock acquisition.

pub mod commands;
pub mod poll;
pub mod topics;

pub use commands::parse_downloaded_responses;
pub use poll::long_poll;
pub use topics::decode_messages;

use crate::domain::config::{PollConfig, StubConfig};
use crate::domain::correlation::CorrelationIdGenerator;
use crate::domain::error::StubResult;
use crate::store::{CounterName, SharedState};
use std::sync::Arc;
use tracing::info;

/// Façade over [`SharedState`] used by the HTTP handlers.
pub struct Broker {
    state: Arc<SharedState>,
    ids: CorrelationIdGenerator,
    poll: PollConfig,
    /// Command queue and response map belong to the relay
    commands_bridged: bool,
    /// Generic topics are uploaded, not served
    uploads_topics: bool,
}

impl Broker {
    pub fn new(state: Arc<SharedState>, config: &StubConfig) -> Self {
        Self {
            state,
            ids: CorrelationIdGenerator::new(),
            poll: config.poll.clone(),
            commands_bridged: config.bridge.commands_bridged(),
            uploads_topics: config.bridge.uploads_topics(),
        }
    }

    /// Shared state handle, for the relay
    pub fn state(&self) -> Arc<SharedState> {
        Arc::clone(&self.state)
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    pub fn commands_bridged(&self) -> bool {
        self.commands_bridged
    }

    pub fn uploads_topics(&self) -> bool {
        self.uploads_topics
    }

    /// Read a counter by its URL name.
    pub fn counter(&self, name: &str) -> StubResult<u64> {
        let name: CounterName = name.parse()?;
        Ok(self.state.lock().counter(name))
    }

    /// Clear every queue, the response map and all counters.
    pub fn reset(&self) {
        self.state.with(|s| s.reset());
        info!("Broker state reset");
    }
}
