//! Bridge mode: relays local queues to an upstream broker.

pub mod relay;
pub mod upstream;

pub use relay::BridgeRelay;
pub use upstream::{HttpUpstream, Upstream, UpstreamError};
