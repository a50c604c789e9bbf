use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tailor_core::AggregateId;

use crate::Event;

/// One journal row: a domain event plus where it sits in its document's history.
///
/// Every aggregate instance has its own stream, numbered from 1 without gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    aggregate_id: AggregateId,
    aggregate_type: String,

    /// Position in the aggregate stream, starting at 1.
    sequence_number: u64,

    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            event_type: event_type.into(),
            event_version,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<serde_json::Value> {
    /// Wrap a typed domain event, serializing it to JSON.
    pub fn from_typed<T>(
        aggregate_id: AggregateId,
        aggregate_type: &str,
        sequence_number: u64,
        event: &T,
    ) -> Result<Self, serde_json::Error>
    where
        T: Event + Serialize,
    {
        Ok(Self::new(
            Uuid::now_v7(),
            aggregate_id,
            aggregate_type,
            sequence_number,
            event.event_type(),
            event.version(),
            event.occurred_at(),
            serde_json::to_value(event)?,
        ))
    }
}
