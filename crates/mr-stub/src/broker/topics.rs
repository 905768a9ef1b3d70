//! Generic topic store: arbitrary topics, lazy creation, long-poll reads.

use super::{long_poll, Broker};
use crate::domain::error::{StubError, StubResult};
use crate::domain::types::{is_text_topic, PollParams, TopicMessage};
use serde_json::Value;
use tracing::{debug, info};

impl Broker {
    /// Append the body to `topic`. A JSON array fans out into one message
    /// per element.
    pub fn publish(&self, topic: &str, body: &[u8]) -> StubResult<usize> {
        let messages = decode_messages(topic, body)?;
        let upload = self.uploads_topics;
        let count = self.state.with(|s| s.publish(topic, messages, upload));

        info!(topic = topic, count = count, "Published to topic");
        Ok(count)
    }

    /// Long-poll `topic` for up to `params.limit` messages.
    pub async fn subscribe(&self, topic: &str, params: PollParams) -> StubResult<Vec<TopicMessage>> {
        if self.uploads_topics {
            return Err(StubError::NotAvailable("Topic read"));
        }

        let batch = long_poll(params, self.poll.interval, |limit| {
            self.state.with(|s| s.pop_messages(topic, limit))
        })
        .await;

        debug!(topic = topic, count = batch.len(), "Topic read");
        Ok(batch)
    }
}

/// Turn a publish body into queued messages according to the topic's
/// text/JSON convention.
pub fn decode_messages(topic: &str, body: &[u8]) -> StubResult<Vec<TopicMessage>> {
    if is_text_topic(topic) {
        let text =
            String::from_utf8(body.to_vec()).map_err(|e| StubError::Publish(e.to_string()))?;
        return Ok(vec![TopicMessage::Text(text)]);
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| StubError::Publish(e.to_string()))?;
    Ok(match value {
        Value::Array(items) => items.into_iter().map(TopicMessage::Json).collect(),
        single => vec![TopicMessage::Json(single)],
    })
}
