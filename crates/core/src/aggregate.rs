//! Aggregate root traits for the back-office documents and masters.

/// Aggregate root marker + minimal interface.
///
/// Storage and orchestration live in the back office; documents only know
/// their own identity and how many events they have absorbed.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Number of events applied to this instance so far.
    fn version(&self) -> u64;
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` validates and returns events.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// A document confirmation is only ever applied after every aggregate it
/// touches has accepted its command, so `handle` must reject everything that
/// could make `apply` produce an invalid state.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event.
    ///
    /// Implementations bump `version()` by one per applied event.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    ///
    /// Must not mutate state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Apply a batch of events in order.
    fn apply_all(&mut self, events: &[Self::Event]) {
        for event in events {
            self.apply(event);
        }
    }
}
