//! Ingest counters for health visibility.
//!
//! Every message the relay pulls off the bus increments one counter keyed
//! by (channel, kind, source). The counters feed periodic log summaries;
//! they carry no correctness weight.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Key for one ingest counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    pub channel: String,
    pub kind: String,
    pub source: String,
}

/// Message ingest counters, shared between the relay thread and the
/// stats-logging loop.
#[derive(Debug, Default)]
pub struct MessageCounters {
    counts: Mutex<HashMap<CounterKey, u64>>,
}

impl MessageCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one ingested message.
    pub fn increment(&self, channel: &str, kind: &str, source: &str) {
        let key = CounterKey {
            channel: channel.to_string(),
            kind: kind.to_string(),
            source: source.to_string(),
        };
        *self.counts.lock().entry(key).or_insert(0) += 1;
    }

    /// Total messages counted across all keys.
    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// Sorted copy of all counters.
    pub fn snapshot(&self) -> Vec<(CounterKey, u64)> {
        let mut entries: Vec<_> = self
            .counts
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort();
        entries
    }

    /// Emit one log line per counter.
    pub fn log_summary(&self) {
        let entries = self.snapshot();
        log::info!("Ingested {} messages across {} keys", self.total(), entries.len());
        for (key, count) in entries {
            log::info!(
                "  {} type={} src={}: {}",
                key.channel,
                key.kind,
                key.source,
                count
            );
        }
    }
}
