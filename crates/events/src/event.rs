use chrono::{DateTime, Utc};

/// Something that happened to a back-office document or master record.
///
/// Once applied an event is never edited; corrections are new events
/// (a cancelled sale emits `sales.sale.cancelled`, it does not erase the
/// confirmation).
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted `module.document.action` name, e.g. `sales.sale.confirmed`.
    fn event_type(&self) -> &'static str;

    /// Payload layout revision. Bump when a variant's fields change.
    fn version(&self) -> u32 {
        1
    }

    /// Business time of the change, as given by the caller.
    fn occurred_at(&self) -> DateTime<Utc>;
}
