//! HTTP surface of the stub.

pub mod handlers;
pub mod router;
pub mod tls;

pub use handlers::AppState;
pub use router::build_router;
