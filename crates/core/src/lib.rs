//! `tailor-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! aggregate/entity traits, typed identifiers, money and the shared error type.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::AggregateId;
pub use money::{Money, Rate};
