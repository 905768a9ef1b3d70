//! mr-stub - an in-memory stand-in for a message router, used by integration
//! tests of policy agents and similar services.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          mr-stub                              │
//! ├───────────────────────────────────────────────────────────────┤
//! │  HTTP (axum), optional HTTPS (axum-server + rustls)           │
//! │  Tracing → CatchPanic → BodyLimit → handlers                  │
//! │         │                                                     │
//! │  ┌──────┴─────────────────────────────────┐                   │
//! │  │ Broker: commands, responses, topics    │                   │
//! │  │ long-poll reads, counters, reset       │                   │
//! │  └──────┬─────────────────────────────────┘                   │
//! │         │                                                     │
//! │  ┌──────┴────────────────┐    ┌────────────────────────────┐  │
//! │  │ SharedState (1 lock)  │ ←→ │ BridgeRelay (bridge mode)  │  │
//! │  └───────────────────────┘    └─────────────┬──────────────┘  │
//! └─────────────────────────────────────────────┼─────────────────┘
//!                                               │ HTTP
//!                                        upstream broker
//! ```
//!
//! # Modes
//!
//! - **Standalone**: commands are drained by a consumer through the read
//!   topic; answers come back through the write topic.
//! - **Command bridge** (`TOPIC_READ` + `TOPIC_WRITE`): commands are pushed
//!   to, and answers pulled from, an upstream broker.
//! - **Generic upload** (`GENERIC_TOPICS_UPLOAD_BASEURL`): messages published
//!   to generic topics are forwarded upstream instead of served locally.
//!
//! # Usage
//!
//! ```ignore
//! use mr_stub::{StubConfig, StubService};
//!
//! let service = StubService::new(StubConfig::from_env())?;
//! service.run().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod api;
pub mod bridge;
pub mod broker;
pub mod domain;
pub mod middleware;
pub mod service;
pub mod store;

// Re-exports for public API
pub use api::build_router;
pub use bridge::{BridgeRelay, HttpUpstream, Upstream, UpstreamError};
pub use broker::Broker;
pub use domain::config::{StubConfig, TlsConfig};
pub use domain::correlation::CorrelationId;
pub use domain::error::{ServiceError, StubError, StubResult};
pub use domain::types::*;
pub use service::{ShutdownHandle, StubService};
pub use store::SharedState;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
