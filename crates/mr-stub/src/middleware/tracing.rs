//! Request tracing: one span per request plus a completion event.
//!
//! Test harnesses poll `/counter/*` in tight loops, so those requests are
//! reported at TRACE to keep DEBUG output readable.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, info_span, trace, Instrument, Span};

/// Path prefix reported at TRACE instead of DEBUG
const QUIET_PREFIX: &str = "/counter/";

/// Layer that wraps every request in an `mr_request` span
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let quiet = is_quiet(&path);

        let span = info_span!(
            "mr_request",
            http.method = %method,
            http.target = %path,
            http.status = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                if let Ok(response) = &result {
                    let status = response.status().as_u16();
                    Span::current().record("http.status", status);
                    if quiet {
                        trace!(status = status, elapsed_ms = elapsed_ms, "Request completed");
                    } else {
                        debug!(status = status, elapsed_ms = elapsed_ms, "Request completed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

fn is_quiet(path: &str) -> bool {
    path.starts_with(QUIET_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::{service_fn, ServiceExt};

    #[test]
    fn test_counter_paths_are_quiet() {
        assert!(is_quiet("/counter/requests_submitted"));
        assert!(!is_quiet("/events/topicA"));
        assert!(!is_quiet("/counter"));
    }

    #[tokio::test]
    async fn test_layer_passes_response_through() {
        let inner = service_fn(|_req: Request<Body>| async {
            let mut response = Response::new(Body::from("OK"));
            *response.status_mut() = StatusCode::ACCEPTED;
            Ok::<_, std::convert::Infallible>(response)
        });
        let service = TracingLayer::new().layer(inner);

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
