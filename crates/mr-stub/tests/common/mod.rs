#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use mr_stub::{build_router, Broker, SharedState, StubConfig};
use std::sync::Arc;
use tower::ServiceExt;

/// Router plus the broker behind it, sharing one fresh state.
pub fn app(config: &StubConfig) -> (Router, Arc<Broker>) {
    let broker = Arc::new(Broker::new(Arc::new(SharedState::new()), config));
    (build_router(Arc::clone(&broker), config), broker)
}

pub fn default_app() -> Router {
    app(&StubConfig::default()).0
}

/// Decoded response: status, content type, body text.
pub struct Reply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("json body")
    }
}

pub async fn send(app: &Router, method: &str, uri: &str, body: impl Into<Body>) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");

    Reply {
        status,
        content_type,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn get(app: &Router, uri: &str) -> Reply {
    send(app, "GET", uri, Body::empty()).await
}

pub async fn post(app: &Router, uri: &str, body: &str) -> Reply {
    send(app, "POST", uri, body.to_string()).await
}

pub async fn put(app: &Router, uri: &str, body: &str) -> Reply {
    send(app, "PUT", uri, body.to_string()).await
}

pub async fn counter(app: &Router, name: &str) -> u64 {
    get(app, &format!("/counter/{}", name))
        .await
        .body
        .parse()
        .expect("counter value")
}
