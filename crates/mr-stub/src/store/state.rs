//! Shared state behind the single broker lock.
//!
//! Every queue, map and counter lives in one [`BrokerState`] guarded by one
//! mutex. Callers hold the guard for exactly one logical operation and never
//! across an `.await`.

use crate::domain::types::{PendingCommand, ResponseItem, TopicMessage};
use crate::store::counters::{CounterName, Counters};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Queue entry tagged with a process-unique sequence number.
///
/// The relay uploads a clone of the head and pops it afterwards only if the
/// head still carries the same sequence number.
#[derive(Debug, Clone)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub item: T,
}

/// Messages of one generic topic.
#[derive(Debug, Default)]
pub struct TopicQueue {
    messages: VecDeque<Sequenced<TopicMessage>>,
    /// Forwarded by the generic uploader instead of served to subscribers
    upload: bool,
}

impl TopicQueue {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_upload(&self) -> bool {
        self.upload
    }
}

/// Oldest pending message of an upload-flagged topic.
#[derive(Debug, Clone)]
pub struct UploadHead {
    pub topic: String,
    pub seq: u64,
    pub message: TopicMessage,
}

/// All mutable broker data.
#[derive(Debug, Default)]
pub struct BrokerState {
    commands: VecDeque<Sequenced<PendingCommand>>,
    responses: HashMap<String, String>,
    topics: HashMap<String, TopicQueue>,
    counters: Counters,
    // Survives reset so a stale relay pop can never match a new entry
    next_seq: u64,
}

impl BrokerState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    // ── Command queue ────────────────────────────────────────────────────

    /// Append a command and count it as submitted.
    pub fn push_command(&mut self, command: PendingCommand) -> u64 {
        let seq = self.next_seq();
        self.commands.push_back(Sequenced { seq, item: command });
        self.counters.requests_submitted += 1;
        seq
    }

    /// Pop up to `limit` oldest commands, counting each as fetched.
    pub fn pop_commands(&mut self, limit: usize) -> Vec<PendingCommand> {
        let n = limit.min(self.commands.len());
        let batch: Vec<_> = self.commands.drain(..n).map(|e| e.item).collect();
        self.counters.requests_fetched += batch.len() as u64;
        batch
    }

    /// Clone of the oldest command.
    pub fn peek_command(&self) -> Option<Sequenced<PendingCommand>> {
        self.commands.front().cloned()
    }

    /// Pop the head if it is still entry `seq`.
    pub fn pop_command_if(&mut self, seq: u64) -> bool {
        match self.commands.front() {
            Some(head) if head.seq == seq => {
                self.commands.pop_front();
                self.counters.requests_fetched += 1;
                true
            }
            _ => false,
        }
    }

    pub fn command_depth(&self) -> usize {
        self.commands.len()
    }

    // ── Response map ─────────────────────────────────────────────────────

    /// Store a validated batch, overwriting earlier answers for the same id.
    pub fn store_responses(&mut self, items: Vec<ResponseItem>) -> usize {
        let count = items.len();
        for item in items {
            debug!(correlation_id = %item.correlation_id, "Stored response");
            self.responses.insert(item.correlation_id, item.body);
        }
        self.counters.responses_submitted += count as u64;
        count
    }

    /// Destructive read of one answer.
    pub fn take_response(&mut self, correlation_id: &str) -> Option<String> {
        let body = self.responses.remove(correlation_id)?;
        self.counters.responses_fetched += 1;
        Some(body)
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    // ── Generic topics ───────────────────────────────────────────────────

    /// Append messages to `topic`, creating the queue on first write.
    pub fn publish(&mut self, topic: &str, messages: Vec<TopicMessage>, upload: bool) -> usize {
        let count = messages.len();
        let seqs: Vec<u64> = (0..count).map(|_| self.next_seq()).collect();
        let queue = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicQueue {
                messages: VecDeque::new(),
                upload,
            });
        queue.messages.extend(
            seqs.into_iter()
                .zip(messages)
                .map(|(seq, item)| Sequenced { seq, item }),
        );
        count
    }

    /// Pop up to `limit` oldest messages of `topic`. Unknown topics yield
    /// nothing and are not created.
    pub fn pop_messages(&mut self, topic: &str, limit: usize) -> Vec<TopicMessage> {
        match self.topics.get_mut(topic) {
            Some(queue) => {
                let n = limit.min(queue.messages.len());
                queue.messages.drain(..n).map(|e| e.item).collect()
            }
            None => Vec::new(),
        }
    }

    /// Oldest message of every upload-flagged topic that has one.
    pub fn upload_heads(&self) -> Vec<UploadHead> {
        self.topics
            .iter()
            .filter(|(_, queue)| queue.upload)
            .filter_map(|(topic, queue)| {
                queue.messages.front().map(|head| UploadHead {
                    topic: topic.clone(),
                    seq: head.seq,
                    message: head.item.clone(),
                })
            })
            .collect()
    }

    /// Pop the head of `topic` if it is still entry `seq`.
    pub fn pop_message_if(&mut self, topic: &str, seq: u64) -> bool {
        let Some(queue) = self.topics.get_mut(topic) else {
            return false;
        };
        match queue.messages.front() {
            Some(head) if head.seq == seq => {
                queue.messages.pop_front();
                true
            }
            _ => false,
        }
    }

    pub fn topic(&self, topic: &str) -> Option<&TopicQueue> {
        self.topics.get(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    // ── Metrics / admin ──────────────────────────────────────────────────

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Value of a named counter.
    pub fn counter(&self, name: CounterName) -> u64 {
        let c = &self.counters;
        match name {
            CounterName::RequestsSubmitted => c.requests_submitted,
            CounterName::RequestsFetched => c.requests_fetched,
            CounterName::ResponsesSubmitted => c.responses_submitted,
            CounterName::ResponsesFetched => c.responses_fetched,
            CounterName::CurrentRequests => c.current_requests(),
            CounterName::CurrentResponses => self.responses.len() as u64,
        }
    }

    /// Drop every queued item and zero the counters.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.responses.clear();
        self.topics.clear();
        self.counters = Counters::default();
    }
}

/// The single owner of broker state, shared by handlers and relay tasks.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<BrokerState>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the broker lock.
    pub fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.inner.lock()
    }

    /// Run one logical operation under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut BrokerState) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
