//! Route table and middleware stack.

use super::handlers::{self, AppState};
use crate::broker::Broker;
use crate::domain::config::StubConfig;
use crate::middleware::TracingLayer;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer};

/// Build the HTTP router.
///
/// The command read/write topics are registered as static routes, so they
/// take precedence over the generic `/events/:topic` routes.
///
/// Layers, outermost first: tracing, panic catcher, body limit.
pub fn build_router(broker: Arc<Broker>, config: &StubConfig) -> Router {
    let state = AppState { broker };
    let read_path = format!("/events/{}/users/:consumer", config.topics.read);
    let write_path = format!("/events/{}", config.topics.write);

    Router::new()
        .route("/", get(handlers::alive))
        .route(
            "/send-request",
            put(handlers::send_request).post(handlers::send_request),
        )
        .route("/receive-response", get(handlers::receive_response))
        .route(&read_path, get(handlers::drain_commands))
        .route(
            &write_path,
            put(handlers::write_responses).post(handlers::write_responses),
        )
        .route(
            "/events/:topic",
            get(handlers::subscribe).post(handlers::publish),
        )
        .route(
            "/events/:topic/*rest",
            get(handlers::subscribe_nested).post(handlers::publish_nested),
        )
        .route("/counter/:name", get(handlers::counter))
        .route(
            "/reset",
            get(handlers::reset).post(handlers::reset).put(handlers::reset),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.http.max_body_size))
        .layer(CatchPanicLayer::custom(handlers::panic_response))
        .layer(TracingLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SharedState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router(config: &StubConfig) -> Router {
        let broker = Arc::new(Broker::new(Arc::new(SharedState::new()), config));
        build_router(broker, config)
    }

    #[tokio::test]
    async fn test_alive_route() {
        let response = router(&StubConfig::default())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_topic_names_are_routed() {
        let mut config = StubConfig::default();
        config.topics.read = "CMD-IN".into();
        config.topics.write = "CMD-OUT".into();

        let response = router(&config)
            .oneshot(
                Request::get("/events/CMD-IN/users/agent?timeout=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut config = StubConfig::default();
        config.http.max_body_size = 16;

        let response = router(&config)
            .oneshot(
                Request::post("/events/topicA")
                    .header("content-length", "64")
                    .body(Body::from(vec![b' '; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
