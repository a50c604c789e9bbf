//! Outbound notifications (stock alerts).

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery to {address} failed: {reason}")]
    Delivery { address: String, reason: String },

    #[error("outbox lock poisoned")]
    LockPoisoned,
}

/// Delivery port. Called outside the back-office state lock.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, message: OutboundMessage) -> Result<(), NotifyError>;
}

/// Keeps every message in memory.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Result<Vec<OutboundMessage>, NotifyError> {
        let sent = self.sent.lock().map_err(|_| NotifyError::LockPoisoned)?;
        Ok(sent.clone())
    }
}

impl Notifier for InMemoryOutbox {
    fn dispatch(&self, message: OutboundMessage) -> Result<(), NotifyError> {
        let mut sent = self.sent.lock().map_err(|_| NotifyError::LockPoisoned)?;
        sent.push(message);
        Ok(())
    }
}

/// Writes each message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn dispatch(&self, message: OutboundMessage) -> Result<(), NotifyError> {
        info!(
            address = %message.address,
            subject = %message.subject,
            body = %message.body,
            "notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_keeps_messages_in_order() {
        let outbox = InMemoryOutbox::new();
        for subject in ["one", "two"] {
            outbox
                .dispatch(OutboundMessage {
                    address: "ops".into(),
                    subject: subject.into(),
                    body: String::new(),
                })
                .unwrap();
        }
        let subjects: Vec<String> = outbox.sent().unwrap().into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects, vec!["one", "two"]);
    }
}
