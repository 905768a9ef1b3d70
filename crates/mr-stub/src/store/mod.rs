//! Shared state store.
//!
//! One lock, one owner: handlers and relay tasks all go through
//! [`SharedState`].

pub mod counters;
pub mod state;

pub use counters::{CounterName, Counters};
pub use state::{BrokerState, Sequenced, SharedState, TopicQueue, UploadHead};
