//! Middleware for the stub's HTTP server.
//!
//! Layer order: Request → Tracing → CatchPanic → BodyLimit → Handler

pub mod tracing;

pub use tracing::TracingLayer;
