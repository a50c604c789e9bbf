//! Parties domain module (customers and suppliers).
//!
//! Business rules for the customer and supplier masters, including the
//! customer loyalty balance, as deterministic domain logic (no IO, no storage).

pub mod party;

pub use party::{
    AdjustLoyalty, ContactInfo, CustomerTerms, CustomerTier, LoyaltyAdjusted, Party,
    PartyCommand, PartyEvent, PartyId, PartyKind, PartyReactivated, PartyRegistered,
    PartyStatus, PartySuspended, PartyTerms, PartyUpdated, ReactivateParty, RegisterParty,
    SupplierTerms, SuspendParty, UpdateDetails,
};
