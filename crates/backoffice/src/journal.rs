//! Append-only journal of every domain event the back office has applied.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use tailor_core::AggregateId;
use tailor_events::{Event, EventEnvelope};

pub type JournalEntry = EventEnvelope<Value>;

/// Committed events, one stream per aggregate instance.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    heads: HashMap<AggregateId, u64>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn head(&self, aggregate_id: AggregateId) -> u64 {
        self.heads.get(&aggregate_id).copied().unwrap_or(0)
    }

    /// Append a staged batch. Sequence numbers were assigned while staging.
    pub fn commit(&mut self, batch: JournalBatch) {
        for entry in batch.entries {
            debug!(
                aggregate_id = %entry.aggregate_id(),
                aggregate_type = entry.aggregate_type(),
                sequence_number = entry.sequence_number(),
                event_type = entry.event_type(),
                "journal append"
            );
            self.heads
                .insert(entry.aggregate_id(), entry.sequence_number());
            self.entries.push(entry);
        }
    }

    /// Events of one aggregate, in sequence order.
    pub fn stream(&self, aggregate_id: AggregateId) -> Vec<&JournalEntry> {
        self.entries
            .iter()
            .filter(|e| e.aggregate_id() == aggregate_id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Envelopes prepared for one operation, not yet visible in the journal.
///
/// Serialization happens here so a failure leaves both the journal and the
/// aggregates untouched.
#[derive(Debug, Default)]
pub struct JournalBatch {
    entries: Vec<JournalEntry>,
    pending: HashMap<AggregateId, u64>,
}

impl JournalBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<E>(
        &mut self,
        journal: &Journal,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        events: &[E],
    ) -> Result<(), serde_json::Error>
    where
        E: Event + Serialize,
    {
        let head = self
            .pending
            .entry(aggregate_id)
            .or_insert_with(|| journal.head(aggregate_id));
        for event in events {
            let next = *head + 1;
            self.entries.push(EventEnvelope::from_typed(
                aggregate_id,
                aggregate_type,
                next,
                event,
            )?);
            *head = next;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
