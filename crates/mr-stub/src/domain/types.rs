//! Message types carried by the stub.

use crate::domain::config::PollConfig;
use crate::domain::correlation::CorrelationId;
use crate::domain::error::{StubError, StubResult, MIME_JSON, MIME_TEXT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Topic keys ending with this suffix carry plain text instead of JSON.
pub const TEXT_TOPIC_SUFFIX: &str = ".text";

const API_VERSION: &str = "1.0";
const ORIGINATOR_ID: &str = "849e6c6b420";
const REQUEST_ID: &str = "23343221";
const TARGET: &str = "policy-agent";
const MESSAGE_TYPE: &str = "request";

/// Operation a command asks the consumer to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Get,
    Put,
    Post,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "GET",
            Operation::Put => "PUT",
            Operation::Post => "POST",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = StubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Operation::Get),
            "PUT" => Ok(Operation::Put),
            "POST" => Ok(Operation::Post),
            "DELETE" => Ok(Operation::Delete),
            other => Err(StubError::invalid_parameter(
                "operation",
                format!("'{}' is not one of GET|PUT|POST|DELETE", other),
            )),
        }
    }
}

/// Message-router request envelope queued for the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCommand {
    pub api_version: String,
    pub operation: Operation,
    pub correlation_id: CorrelationId,
    pub originator_id: String,
    pub payload: Value,
    pub request_id: String,
    pub target: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl PendingCommand {
    /// Build an envelope stamped with the current UTC time. A missing payload
    /// becomes an empty object.
    pub fn new(
        operation: Operation,
        correlation_id: CorrelationId,
        payload: Option<Value>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            operation,
            correlation_id,
            originator_id: ORIGINATOR_ID.to_string(),
            payload: payload.unwrap_or_else(|| Value::Object(Default::default())),
            request_id: REQUEST_ID.to_string(),
            target: TARGET.to_string(),
            timestamp: chrono::Utc::now()
                .format("%Y-%m-%d %H:%M:%S%.6f")
                .to_string(),
            kind: MESSAGE_TYPE.to_string(),
            url: url.into(),
        }
    }
}

/// One validated answer, ready to be stored under its correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseItem {
    pub correlation_id: String,
    /// `message` followed by the 3-character status code
    pub body: String,
}

impl ResponseItem {
    /// Validate one `{correlationId, message, status}` object.
    pub fn from_value(item: &Value) -> StubResult<Self> {
        let object = item
            .as_object()
            .ok_or_else(|| StubError::InvalidJson("response item must be an object".into()))?;

        let field = |name: &'static str| match object.get(name) {
            None | Some(Value::Null) => Err(StubError::MissingField(name)),
            Some(v) => Ok(v),
        };

        let correlation_id = scalar_text(field("correlationId")?, "correlationId")?;
        let message = field("message")?;
        let status = scalar_text(field("status")?, "status")?;

        let mut body = match message {
            Value::String(s) => s.clone(),
            structured => structured.to_string(),
        };
        body.extend(status.chars().take(3));

        Ok(Self {
            correlation_id,
            body,
        })
    }

    /// Validate a single object or an array of objects. Fails on the first
    /// bad item, before anything is stored.
    pub fn parse_batch(value: &Value) -> StubResult<Vec<Self>> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            single => Ok(vec![Self::from_value(single)?]),
        }
    }
}

fn scalar_text(value: &Value, name: &'static str) -> StubResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(StubError::InvalidJson(format!("{} must be a string", name))),
    }
}

/// A message queued on a generic topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TopicMessage {
    Json(Value),
    Text(String),
}

impl TopicMessage {
    /// Content type used when forwarding this message
    pub fn content_type(&self) -> &'static str {
        match self {
            TopicMessage::Json(_) => MIME_JSON,
            TopicMessage::Text(_) => MIME_TEXT,
        }
    }

    /// Body used when forwarding this message
    pub fn to_body(&self) -> String {
        match self {
            TopicMessage::Json(v) => v.to_string(),
            TopicMessage::Text(s) => s.clone(),
        }
    }
}

/// Whether a topic key follows the plain-text convention.
pub fn is_text_topic(topic: &str) -> bool {
    topic.ends_with(TEXT_TOPIC_SUFFIX)
}

/// Clamped long-poll parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollParams {
    /// Max messages to return
    pub limit: usize,
    /// How long to wait for the first message
    pub timeout: Duration,
}

impl PollParams {
    /// Parse the `limit` and `timeout` query values. Out-of-range values are
    /// clamped, not rejected; non-integers are rejected.
    pub fn from_query(
        limit: Option<&str>,
        timeout: Option<&str>,
        config: &PollConfig,
    ) -> StubResult<Self> {
        let max_limit = i64::try_from(config.max_limit).unwrap_or(i64::MAX);
        let limit = match limit {
            None => config.max_limit,
            Some(raw) => {
                let value = parse_integer("limit", raw)?;
                usize::try_from(value.clamp(0, max_limit)).unwrap_or(config.max_limit)
            }
        };

        let max_ms = u64::try_from(config.max_timeout.as_millis()).unwrap_or(u64::MAX);
        let timeout = match timeout {
            None => config.default_timeout,
            Some(raw) => {
                let value = parse_integer("timeout", raw)?;
                let ms = u64::try_from(value.max(0)).unwrap_or(0).min(max_ms);
                Duration::from_millis(ms)
            }
        };

        Ok(Self { limit, timeout })
    }
}

fn parse_integer(name: &'static str, raw: &str) -> StubResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| StubError::invalid_parameter(name, e.to_string()))
}
