//! Message counters exposed on `/counter/{name}`.

use crate::domain::error::StubError;
use std::str::FromStr;

/// Monotonic totals. Depths are derived, never stored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub requests_submitted: u64,
    pub requests_fetched: u64,
    pub responses_submitted: u64,
    pub responses_fetched: u64,
}

impl Counters {
    /// Commands submitted but not yet fetched. Both totals move under the
    /// same lock as the queue, so this equals the queue length.
    pub fn current_requests(&self) -> u64 {
        self.requests_submitted.saturating_sub(self.requests_fetched)
    }
}

/// Counter names accepted by the metrics surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterName {
    RequestsSubmitted,
    RequestsFetched,
    ResponsesSubmitted,
    ResponsesFetched,
    CurrentRequests,
    CurrentResponses,
}

impl CounterName {
    pub const ALL: [CounterName; 6] = [
        CounterName::RequestsSubmitted,
        CounterName::RequestsFetched,
        CounterName::ResponsesSubmitted,
        CounterName::ResponsesFetched,
        CounterName::CurrentRequests,
        CounterName::CurrentResponses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterName::RequestsSubmitted => "requests_submitted",
            CounterName::RequestsFetched => "requests_fetched",
            CounterName::ResponsesSubmitted => "responses_submitted",
            CounterName::ResponsesFetched => "responses_fetched",
            CounterName::CurrentRequests => "current_requests",
            CounterName::CurrentResponses => "current_responses",
        }
    }
}

impl FromStr for CounterName {
    type Err = StubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| StubError::UnknownCounter(s.to_string()))
    }
}
