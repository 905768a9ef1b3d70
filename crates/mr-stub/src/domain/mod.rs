//! Domain types for the message-router stub.
//!
//! Configuration, errors, correlation ids and the message envelopes. No I/O
//! and no locking lives here.

pub mod config;
pub mod correlation;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::{
    BridgeConfig, ConfigError, HttpConfig, PollConfig, StubConfig, TlsConfig, TopicsConfig,
};
pub use correlation::{CorrelationId, CorrelationIdGenerator};
pub use error::{ServiceError, StubError, StubResult};
pub use types::{is_text_topic, Operation, PendingCommand, PollParams, ResponseItem, TopicMessage};
