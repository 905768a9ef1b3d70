//! HTTP handlers. Each one parses its inputs, calls the [`Broker`] and maps
//! the outcome onto a response; errors render through [`StubError`].

use crate::broker::Broker;
use crate::domain::error::{StubError, StubResult, MIME_JSON, MIME_TEXT};
use crate::domain::types::{PendingCommand, PollParams, TopicMessage};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

type QueryMap = Query<HashMap<String, String>>;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
}

fn poll_params(state: &AppState, query: &HashMap<String, String>) -> StubResult<PollParams> {
    PollParams::from_query(
        query.get("limit").map(String::as_str),
        query.get("timeout").map(String::as_str),
        state.broker.poll_config(),
    )
}

fn empty_json_ack() -> Response {
    ([(header::CONTENT_TYPE, MIME_JSON)], "{}").into_response()
}

/// GET /
pub async fn alive() -> &'static str {
    "OK"
}

/// PUT|POST /send-request?operation=..&url=..
pub async fn send_request(
    State(state): State<AppState>,
    Query(query): QueryMap,
    body: Bytes,
) -> StubResult<Response> {
    let id = state.broker.submit(
        query.get("operation").map(String::as_str),
        query.get("url").map(String::as_str),
        &body,
    )?;
    Ok(([(header::CONTENT_TYPE, MIME_TEXT)], id.to_string()).into_response())
}

/// GET /receive-response?correlationid=..
pub async fn receive_response(
    State(state): State<AppState>,
    Query(query): QueryMap,
) -> StubResult<Response> {
    let answer = state
        .broker
        .fetch_response(query.get("correlationid").map(String::as_str))?;
    Ok(match answer {
        Some(body) => ([(header::CONTENT_TYPE, MIME_JSON)], body).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// GET /events/{read-topic}/users/{consumer}
///
/// The consumer name is accepted but does not partition the queue.
pub async fn drain_commands(
    State(state): State<AppState>,
    Path(_consumer): Path<String>,
    Query(query): QueryMap,
) -> StubResult<Json<Vec<PendingCommand>>> {
    let params = poll_params(&state, &query)?;
    Ok(Json(state.broker.drain(params).await?))
}

/// PUT|POST /events/{write-topic}
pub async fn write_responses(State(state): State<AppState>, body: Bytes) -> StubResult<Response> {
    state.broker.submit_responses(&body)?;
    Ok(empty_json_ack())
}

/// POST /events/{topic}
pub async fn publish(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> StubResult<Response> {
    state.broker.publish(&topic, &body)?;
    Ok(empty_json_ack())
}

/// POST /events/{topic}/...; the first segment is the topic key.
pub async fn publish_nested(
    State(state): State<AppState>,
    Path((topic, _rest)): Path<(String, String)>,
    body: Bytes,
) -> StubResult<Response> {
    state.broker.publish(&topic, &body)?;
    Ok(empty_json_ack())
}

/// GET /events/{topic}
pub async fn subscribe(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(query): QueryMap,
) -> StubResult<Json<Vec<TopicMessage>>> {
    let params = poll_params(&state, &query)?;
    Ok(Json(state.broker.subscribe(&topic, params).await?))
}

/// GET /events/{topic}/...
pub async fn subscribe_nested(
    State(state): State<AppState>,
    Path((topic, _rest)): Path<(String, String)>,
    Query(query): QueryMap,
) -> StubResult<Json<Vec<TopicMessage>>> {
    let params = poll_params(&state, &query)?;
    Ok(Json(state.broker.subscribe(&topic, params).await?))
}

/// GET /counter/{name}
pub async fn counter(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> StubResult<Response> {
    let value = state.broker.counter(&name)?;
    Ok(([(header::CONTENT_TYPE, MIME_TEXT)], value.to_string()).into_response())
}

/// GET|POST|PUT /reset
pub async fn reset(State(state): State<AppState>) -> &'static str {
    state.broker.reset();
    "OK"
}

/// Render a caught handler panic as a 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    error!(panic = %detail, "Handler panicked");
    StubError::Internal(detail).into_response()
}
