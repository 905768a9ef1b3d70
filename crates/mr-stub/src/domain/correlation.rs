//! Correlation ID for command/response matching.
//!
//! Ids are nanosecond timestamps forced strictly upward, so two submissions
//! in the same clock tick still get distinct values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation ID handed back to the driver on submission.
///
/// Serialized and displayed as a decimal string, which is also the form
/// responses use to address it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Wrap a raw value
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse from the decimal string form
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        s.parse().map(Self)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for CorrelationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CorrelationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CorrelationId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Source of process-unique correlation ids.
#[derive(Debug, Default)]
pub struct CorrelationIdGenerator {
    last: AtomicU64,
}

impl CorrelationIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id: current wall-clock nanoseconds, or one past the previous id
    /// if the clock has not advanced.
    pub fn next_id(&self) -> CorrelationId {
        let now = unix_nanos();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return CorrelationId(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

fn unix_nanos() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        // Clock before the epoch: fall back to the counter alone
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_strictly_increase() {
        let generator = CorrelationIdGenerator::new();
        let mut prev = generator.next_id();
        for _ in 0..10_000 {
            let next = generator.next_id();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let generator = Arc::new(CorrelationIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..1000).map(|_| generator.next_id()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 4000);
    }

    #[test]
    fn test_id_looks_like_timestamp() {
        let id = CorrelationIdGenerator::new().next_id();
        // Nanoseconds since epoch are 19 digits for the foreseeable future
        assert_eq!(id.to_string().len(), 19);
    }

    #[test]
    fn test_serializes_as_string() {
        let id = CorrelationId::from_raw(1_600_000_000_000_000_123);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1600000000000000123\"");
        let parsed: CorrelationId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
