//! Purchasing domain module (supplier purchase invoices).
//!
//! This crate contains business rules for purchases, implemented purely as
//! deterministic domain logic (no IO, no storage).

pub mod purchase;

pub use purchase::{
    AddPurchaseLine, CreatePurchase, Purchase, PurchaseCancelled, PurchaseCommand,
    PurchaseConfirmed, PurchaseCreated, PurchaseEvent, PurchaseId, PurchaseLine,
    PurchaseLineAdded, PurchaseLineRemoved, PurchaseResetToDraft, PurchaseStatus,
    PurchaseTransition, RemovePurchaseLine,
};
