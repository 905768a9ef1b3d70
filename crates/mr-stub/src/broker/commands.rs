//! Command/response channel.
//!
//! A driver submits commands and later fetches the answer by correlation id;
//! a consumer drains the commands and posts answers back.

use super::{long_poll, Broker};
use crate::domain::correlation::CorrelationId;
use crate::domain::error::{StubError, StubResult};
use crate::domain::types::{Operation, PendingCommand, PollParams, ResponseItem};
use serde_json::Value;
use tracing::{debug, info};

impl Broker {
    /// Queue a command and return its correlation id.
    ///
    /// Only PUT carries a payload; the body of other operations is ignored.
    pub fn submit(
        &self,
        operation: Option<&str>,
        url: Option<&str>,
        body: &[u8],
    ) -> StubResult<CorrelationId> {
        let operation = operation.ok_or(StubError::MissingParameter("operation"))?;
        let url = url.ok_or(StubError::MissingParameter("url"))?;
        let operation: Operation = operation.parse()?;

        let payload = match operation {
            Operation::Put if !body.iter().all(u8::is_ascii_whitespace) => Some(
                serde_json::from_slice::<Value>(body)
                    .map_err(|e| StubError::InvalidJson(e.to_string()))?,
            ),
            _ => None,
        };

        let correlation_id = self.ids.next_id();
        let command = PendingCommand::new(operation, correlation_id, payload, url);
        self.state.with(|s| s.push_command(command));

        info!(
            correlation_id = %correlation_id,
            operation = %operation,
            url = url,
            "Queued command"
        );
        Ok(correlation_id)
    }

    /// Take the answer for `correlation_id`. `Ok(None)` means not answered yet.
    pub fn fetch_response(&self, correlation_id: Option<&str>) -> StubResult<Option<String>> {
        let correlation_id = correlation_id.ok_or(StubError::MissingCorrelationId)?;
        let answer = self.state.with(|s| s.take_response(correlation_id));

        match &answer {
            Some(body) => debug!(correlation_id = correlation_id, body = %body, "Delivered response"),
            None => debug!(correlation_id = correlation_id, "No response yet"),
        }
        Ok(answer)
    }

    /// Store answers posted by the consumer: one object or an array of them.
    /// Validation covers the whole batch before anything is written.
    pub fn submit_responses(&self, body: &[u8]) -> StubResult<usize> {
        if self.commands_bridged {
            return Err(StubError::NotAvailable("Response write"));
        }

        let value: Value =
            serde_json::from_slice(body).map_err(|e| StubError::InvalidJson(e.to_string()))?;
        let items = ResponseItem::parse_batch(&value)?;
        let count = self.state.with(|s| s.store_responses(items));

        info!(count = count, "Stored responses");
        Ok(count)
    }

    /// Long-poll the command queue.
    pub async fn drain(&self, params: PollParams) -> StubResult<Vec<PendingCommand>> {
        if self.commands_bridged {
            return Err(StubError::NotAvailable("Command read"));
        }

        let batch = long_poll(params, self.poll.interval, |limit| {
            self.state.with(|s| s.pop_commands(limit))
        })
        .await;

        if !batch.is_empty() {
            info!(count = batch.len(), "Delivered commands");
        }
        Ok(batch)
    }
}

/// Parse a batch downloaded from the upstream broker: a JSON array whose
/// items are JSON-encoded strings (plain objects are accepted too).
pub fn parse_downloaded_responses(body: &str) -> StubResult<Vec<ResponseItem>> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| StubError::InvalidJson(e.to_string()))?;
    let Value::Array(entries) = value else {
        return Err(StubError::InvalidJson("expected a json array".into()));
    };

    entries
        .iter()
        .map(|entry| match entry {
            Value::String(encoded) => {
                let item: Value = serde_json::from_str(encoded)
                    .map_err(|e| StubError::InvalidJson(e.to_string()))?;
                ResponseItem::from_value(&item)
            }
            other => ResponseItem::from_value(other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::StubConfig;
    use crate::store::SharedState;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn broker() -> Broker {
        Broker::new(Arc::new(SharedState::new()), &StubConfig::default())
    }

    fn bridged_broker() -> Broker {
        let mut config = StubConfig::default();
        config.bridge.read_url = Some("http://mr/events/R/users/u".into());
        config.bridge.write_url = Some("http://mr/events/W".into());
        Broker::new(Arc::new(SharedState::new()), &config)
    }

    fn params(limit: usize, timeout_ms: u64) -> PollParams {
        PollParams {
            limit,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[test]
    fn test_submit_validation_order() {
        let broker = broker();
        assert_eq!(
            broker.submit(None, None, b""),
            Err(StubError::MissingParameter("operation"))
        );
        assert_eq!(
            broker.submit(Some("GET"), None, b""),
            Err(StubError::MissingParameter("url"))
        );
        assert!(matches!(
            broker.submit(Some("DEL"), Some("/p"), b""),
            Err(StubError::InvalidParameter { name: "operation", .. })
        ));
        assert_eq!(broker.counter("requests_submitted"), Ok(0));
    }

    #[test]
    fn test_submit_put_rejects_bad_json() {
        let broker = broker();
        assert!(matches!(
            broker.submit(Some("PUT"), Some("/p"), b"{not json"),
            Err(StubError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_put_payload_and_fifo() {
        let broker = broker();
        let first = broker
            .submit(Some("PUT"), Some("/policies/1"), br#"{"a":1}"#)
            .unwrap();
        let second = broker.submit(Some("DELETE"), Some("/policies/1"), b"ignored").unwrap();
        assert!(second > first);

        let batch = broker.drain(params(10, 1_000)).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].correlation_id, first);
        assert_eq!(batch[0].payload, json!({"a": 1}));
        assert_eq!(batch[1].operation, Operation::Delete);
        assert_eq!(batch[1].payload, json!({}));
        assert_eq!(broker.counter("requests_fetched"), Ok(2));
    }

    #[tokio::test]
    async fn test_drain_zero_limit_leaves_queue() {
        let broker = broker();
        broker.submit(Some("GET"), Some("/p"), b"").unwrap();

        let batch = broker.drain(params(0, 10_000)).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(broker.counter("current_requests"), Ok(1));
    }

    #[tokio::test]
    async fn test_fetch_response_at_most_once() {
        let broker = broker();
        broker
            .submit_responses(br#"[{"correlationId":"X","message":"hello","status":"200 OK"}]"#)
            .unwrap();

        assert_eq!(broker.fetch_response(Some("X")), Ok(Some("hello200".to_string())));
        assert_eq!(broker.fetch_response(Some("X")), Ok(None));
        assert_eq!(broker.fetch_response(None), Err(StubError::MissingCorrelationId));
    }

    #[test]
    fn test_submit_responses_is_all_or_nothing() {
        let broker = broker();
        let body = br#"[
            {"correlationId":"A","message":"ok","status":"200"},
            {"correlationId":"B","message":"missing status"}
        ]"#;
        assert_eq!(
            broker.submit_responses(body),
            Err(StubError::MissingField("status"))
        );
        assert_eq!(broker.fetch_response(Some("A")), Ok(None));
        assert_eq!(broker.counter("responses_submitted"), Ok(0));
    }

    #[tokio::test]
    async fn test_bridge_mode_closes_direct_paths() {
        let broker = bridged_broker();
        assert!(matches!(
            broker.drain(params(1, 0)).await,
            Err(StubError::NotAvailable(_))
        ));
        assert!(matches!(
            broker.submit_responses(b"{}"),
            Err(StubError::NotAvailable(_))
        ));
        // The driver side stays open
        assert!(broker.submit(Some("GET"), Some("/p"), b"").is_ok());
        assert_eq!(broker.fetch_response(Some("none")), Ok(None));
    }

    #[test]
    fn test_parse_downloaded_responses() {
        let body = serde_json::to_string(&json!([
            r#"{"correlationId":"1","message":"m","status":"200"}"#,
            {"correlationId": "2", "message": {"x": 1}, "status": "404"}
        ]))
        .unwrap();
        let items = parse_downloaded_responses(&body).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].body, "m200");
        assert_eq!(items[1].body, r#"{"x":1}404"#);

        assert!(parse_downloaded_responses("{}").is_err());
        assert!(parse_downloaded_responses(r#"["not json"]"#).is_err());
        assert_eq!(parse_downloaded_responses("[]").unwrap(), vec![]);
    }
}
