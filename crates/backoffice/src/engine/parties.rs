use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use tailor_core::Rate;
use tailor_parties::{
    ContactInfo, CustomerTerms, CustomerTier, Party, PartyCommand, PartyId, PartyKind,
    PartyTerms, ReactivateParty, RegisterParty, SupplierTerms, SuspendParty, UpdateDetails,
};

use super::{Backoffice, PARTY, State};
use crate::error::BackofficeResult;
use crate::repository::Repository;
use crate::sequence::SequenceCode;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub tier: CustomerTier,
    pub discount: Rate,
    pub notes: Option<String>,
}

impl NewCustomer {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub terms: SupplierTerms,
    pub notes: Option<String>,
}

impl NewSupplier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartyUpdate {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub terms: Option<PartyTerms>,
    pub notes: Option<String>,
}

impl State {
    fn register_party(
        &mut self,
        code: SequenceCode,
        name: String,
        contact: Option<ContactInfo>,
        terms: PartyTerms,
        notes: Option<String>,
    ) -> BackofficeResult<PartyId> {
        let party_id = PartyId::generate();
        let party_code = self.sequences.peek(code);
        self.create(
            |s| &mut s.parties,
            party_id,
            Party::empty(party_id),
            PARTY,
            &PartyCommand::RegisterParty(RegisterParty {
                party_id,
                code: party_code.clone(),
                name,
                contact,
                terms,
                notes,
                occurred_at: Utc::now(),
            }),
        )?;
        self.sequences.next(code);
        info!(party = %party_id, code = %party_code, "party registered");
        Ok(party_id)
    }
}

impl Backoffice {
    pub fn register_customer(&self, customer: NewCustomer) -> BackofficeResult<PartyId> {
        self.write(|s| {
            s.register_party(
                SequenceCode::Customer,
                customer.name,
                customer.contact,
                PartyTerms::Customer(CustomerTerms {
                    tier: customer.tier,
                    discount: customer.discount,
                }),
                customer.notes,
            )
        })
    }

    pub fn register_supplier(&self, supplier: NewSupplier) -> BackofficeResult<PartyId> {
        self.write(|s| {
            s.register_party(
                SequenceCode::Supplier,
                supplier.name,
                supplier.contact,
                PartyTerms::Supplier(supplier.terms),
                supplier.notes,
            )
        })
    }

    /// Edit a party. New terms must be of the party's own kind.
    pub fn update_party(&self, party_id: PartyId, update: PartyUpdate) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.parties,
                &party_id,
                PARTY,
                &PartyCommand::UpdateDetails(UpdateDetails {
                    party_id,
                    name: update.name,
                    contact: update.contact,
                    terms: update.terms,
                    notes: update.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Suspended parties cannot be put on new documents.
    pub fn suspend_party(&self, party_id: PartyId, reason: Option<String>) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.parties,
                &party_id,
                PARTY,
                &PartyCommand::SuspendParty(SuspendParty {
                    party_id,
                    reason,
                    occurred_at: Utc::now(),
                }),
            )?;
            info!(party = %party_id, "party suspended");
            Ok(())
        })
    }

    pub fn reactivate_party(&self, party_id: PartyId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.parties,
                &party_id,
                PARTY,
                &PartyCommand::ReactivateParty(ReactivateParty {
                    party_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn party(&self, party_id: PartyId) -> BackofficeResult<Option<Party>> {
        self.read(|s| s.parties.get(&party_id).cloned())
    }

    pub fn customers(&self) -> BackofficeResult<Vec<Party>> {
        self.parties_of(PartyKind::Customer)
    }

    pub fn suppliers(&self) -> BackofficeResult<Vec<Party>> {
        self.parties_of(PartyKind::Supplier)
    }

    fn parties_of(&self, kind: PartyKind) -> BackofficeResult<Vec<Party>> {
        self.read(|s| {
            s.parties
                .values()
                .filter(|p| p.kind() == kind)
                .cloned()
                .collect()
        })
    }
}
