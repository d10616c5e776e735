use crate::model::{AggregateEntry, CommitRecord};
use std::collections::{BTreeMap, HashMap};

/// Something a merger can fold commit records into.
///
/// The coordinator hands the aggregator to exactly one merger for the whole
/// run, so `merge` never runs concurrently with itself.
pub trait Aggregator: Send {
    fn merge(&mut self, record: CommitRecord);
}

/// Fold one record into `entries`, creating the contributor's entry on first sight.
pub fn merge(entries: &mut HashMap<String, AggregateEntry>, record: CommitRecord) {
    entries
        .entry(record.contributor_id.clone())
        .or_default()
        .add_record(&record);
}

#[derive(Debug, Default)]
pub struct AggregateStore {
    entries: HashMap<String, AggregateEntry>,
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the store. Nothing can merge into a frozen aggregate.
    pub fn freeze(self) -> FrozenAggregate {
        FrozenAggregate {
            entries: self.entries.into_iter().collect(),
        }
    }
}

impl Aggregator for AggregateStore {
    fn merge(&mut self, record: CommitRecord) {
        merge(&mut self.entries, record);
    }
}

/// Read-only aggregate produced after the completion barrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrozenAggregate {
    entries: BTreeMap<String, AggregateEntry>,
}

impl FrozenAggregate {
    pub fn get(&self, contributor: &str) -> Option<&AggregateEntry> {
        self.entries.get(contributor)
    }

    pub fn contains(&self, contributor: &str) -> bool {
        self.entries.contains_key(contributor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contributors in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregateEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
