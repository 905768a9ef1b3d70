//! Long-poll loop shared by command draining and topic subscription.

use crate::domain::types::PollParams;
use std::time::Duration;
use tokio::time::Instant;

/// Call `attempt` until it returns a non-empty batch or `params.timeout`
/// elapses, sleeping `interval` between tries.
///
/// `attempt` receives the batch limit and must take and release the broker
/// lock itself; no lock is held while sleeping. Attempts only happen before
/// the deadline, so a zero timeout or a zero limit returns `[]` without
/// calling `attempt` and leaves the queue untouched.
pub async fn long_poll<T, F>(params: PollParams, interval: Duration, mut attempt: F) -> Vec<T>
where
    F: FnMut(usize) -> Vec<T>,
{
    if params.limit == 0 || params.timeout.is_zero() {
        return Vec::new();
    }

    let deadline = Instant::now() + params.timeout;
    let mut now = Instant::now();
    while now < deadline {
        let batch = attempt(params.limit);
        if !batch.is_empty() {
            return batch;
        }

        now = Instant::now();
        if now < deadline {
            tokio::time::sleep(interval.min(deadline - now)).await;
            now = Instant::now();
        }
    }
    Vec::new()
}
