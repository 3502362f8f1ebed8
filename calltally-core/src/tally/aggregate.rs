//! Count accumulation for the three aggregate views.

use indexmap::IndexMap;

use crate::config::Mode;

/// Insertion-ordered counters. Keys only ever gain counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub pairs: IndexMap<(String, String), u64>,
    pub methods: IndexMap<String, u64>,
    pub receivers: IndexMap<String, u64>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one admitted call site under `mode`.
    ///
    /// In pairs mode a receiverless call lands in `methods`, so `pairs`
    /// never holds an absent identity.
    pub fn record(&mut self, identity: Option<&str>, method: &str, mode: Mode) {
        match (mode, identity) {
            (Mode::Pairs, Some(id)) => {
                *self
                    .pairs
                    .entry((id.to_string(), method.to_string()))
                    .or_insert(0) += 1;
                *self.receivers.entry(id.to_string()).or_insert(0) += 1;
            }
            (Mode::Pairs, None) | (Mode::Methods, _) => {
                *self.methods.entry(method.to_string()).or_insert(0) += 1;
            }
            (Mode::Receivers, Some(id)) => {
                *self.receivers.entry(id.to_string()).or_insert(0) += 1;
            }
            (Mode::Receivers, None) => {}
        }
    }

    /// Adds `other` key by key. New keys are appended in `other`'s order.
    pub fn merge(&mut self, other: Tally) {
        for (key, count) in other.pairs {
            *self.pairs.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.methods {
            *self.methods.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.receivers {
            *self.receivers.entry(key).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.methods.is_empty() && self.receivers.is_empty()
    }

    pub fn pair_count(&self, receiver: &str, method: &str) -> u64 {
        self.pairs
            .get(&(receiver.to_string(), method.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn method_count(&self, method: &str) -> u64 {
        self.methods.get(method).copied().unwrap_or(0)
    }

    pub fn receiver_count(&self, receiver: &str) -> u64 {
        self.receivers.get(receiver).copied().unwrap_or(0)
    }
}
