use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use tailor_events::Event;
use tailor_parties::PartyId;

use crate::book::{PaymentMethod, TransactionId, TransactionKind};

typed_id!(
    /// Customer / supplier payment identifier.
    PaymentId
);

/// Who pays whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Money received from a customer.
    Customer,
    /// Money paid out to a supplier.
    Supplier,
}

impl PaymentType {
    pub fn transaction_kind(self) -> TransactionKind {
        match self {
            PaymentType::Customer => TransactionKind::Income,
            PaymentType::Supplier => TransactionKind::Expense,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Draft,
    Confirmed,
    Cancel,
}

/// A store's treasury day a payment or expense is booked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreasuryDay {
    pub store: StoreId,
    pub date: NaiveDate,
}

/// Aggregate root: Payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    id: PaymentId,
    name: String,
    payment_type: PaymentType,
    party: Option<PartyId>,
    amount: Money,
    date: Option<DateTime<Utc>>,
    document: Option<String>,
    treasury_day: Option<TreasuryDay>,
    method: PaymentMethod,
    reference: Option<String>,
    notes: Option<String>,
    status: PaymentStatus,
    posted_transaction: Option<TransactionId>,
    version: u64,
    created: bool,
}

impl Payment {
    pub fn empty(id: PaymentId) -> Self {
        Self {
            id,
            name: String::new(),
            payment_type: PaymentType::Customer,
            party: None,
            amount: Money::ZERO,
            date: None,
            document: None,
            treasury_day: None,
            method: PaymentMethod::Cash,
            reference: None,
            notes: None,
            status: PaymentStatus::Draft,
            posted_transaction: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PaymentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payment_type(&self) -> PaymentType {
        self.payment_type
    }

    pub fn party(&self) -> Option<PartyId> {
        self.party
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    /// Sale or purchase this payment settles, by document name.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn treasury_day(&self) -> Option<TreasuryDay> {
        self.treasury_day
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PaymentStatus::Confirmed
    }

    /// Treasury transaction booked on confirmation, if any.
    pub fn posted_transaction(&self) -> Option<TransactionId> {
        self.posted_transaction
    }
}

impl AggregateRoot for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePayment {
    pub payment_id: PaymentId,
    pub name: String,
    pub payment_type: PaymentType,
    pub party: PartyId,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub document: Option<String>,
    pub treasury_day: Option<TreasuryDay>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub payment_id: PaymentId,
    /// Id of the treasury transaction the confirmation books, when the
    /// payment is linked to a treasury day.
    pub posted_transaction: Option<TransactionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransition {
    pub payment_id: PaymentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentCommand {
    CreatePayment(CreatePayment),
    Confirm(ConfirmPayment),
    Cancel(PaymentTransition),
    ResetToDraft(PaymentTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCreated {
    pub payment_id: PaymentId,
    pub name: String,
    pub payment_type: PaymentType,
    pub party: PartyId,
    pub amount: Money,
    pub date: DateTime<Utc>,
    pub document: Option<String>,
    pub treasury_day: Option<TreasuryDay>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub payment_id: PaymentId,
    pub posted_transaction: Option<TransactionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCancelled {
    pub payment_id: PaymentId,
    pub voided_transaction: Option<TransactionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResetToDraft {
    pub payment_id: PaymentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEvent {
    PaymentCreated(PaymentCreated),
    PaymentConfirmed(PaymentConfirmed),
    PaymentCancelled(PaymentCancelled),
    PaymentResetToDraft(PaymentResetToDraft),
}

impl Event for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentCreated(_) => "treasury.payment.created",
            PaymentEvent::PaymentConfirmed(_) => "treasury.payment.confirmed",
            PaymentEvent::PaymentCancelled(_) => "treasury.payment.cancelled",
            PaymentEvent::PaymentResetToDraft(_) => "treasury.payment.reset_to_draft",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentEvent::PaymentCreated(e) => e.occurred_at,
            PaymentEvent::PaymentConfirmed(e) => e.occurred_at,
            PaymentEvent::PaymentCancelled(e) => e.occurred_at,
            PaymentEvent::PaymentResetToDraft(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Payment {
    type Command = PaymentCommand;
    type Event = PaymentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentEvent::PaymentCreated(e) => {
                self.id = e.payment_id;
                self.name = e.name.clone();
                self.payment_type = e.payment_type;
                self.party = Some(e.party);
                self.amount = e.amount;
                self.date = Some(e.date);
                self.document = e.document.clone();
                self.treasury_day = e.treasury_day;
                self.method = e.method;
                self.reference = e.reference.clone();
                self.notes = e.notes.clone();
                self.status = PaymentStatus::Draft;
                self.created = true;
            }
            PaymentEvent::PaymentConfirmed(e) => {
                self.status = PaymentStatus::Confirmed;
                self.posted_transaction = e.posted_transaction;
            }
            PaymentEvent::PaymentCancelled(_) => {
                self.status = PaymentStatus::Cancel;
                self.posted_transaction = None;
            }
            PaymentEvent::PaymentResetToDraft(_) => {
                self.status = PaymentStatus::Draft;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentCommand::CreatePayment(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("payment already exists"));
                }
                if !cmd.amount.is_positive() {
                    return Err(DomainError::validation("payment amount must be positive"));
                }
                Ok(vec![PaymentEvent::PaymentCreated(PaymentCreated {
                    payment_id: cmd.payment_id,
                    name: cmd.name.clone(),
                    payment_type: cmd.payment_type,
                    party: cmd.party,
                    amount: cmd.amount,
                    date: cmd.date,
                    document: cmd.document.clone(),
                    treasury_day: cmd.treasury_day,
                    method: cmd.method,
                    reference: cmd.reference.clone(),
                    notes: cmd.notes.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            PaymentCommand::Confirm(cmd) => {
                self.ensure_created(cmd.payment_id)?;
                if self.status != PaymentStatus::Draft {
                    return Err(DomainError::transition(format!(
                        "payment {} is not a draft",
                        self.name
                    )));
                }
                if self.treasury_day.is_some() != cmd.posted_transaction.is_some() {
                    return Err(DomainError::invariant(
                        "a payment linked to a treasury day needs a posting, and only then",
                    ));
                }
                Ok(vec![PaymentEvent::PaymentConfirmed(PaymentConfirmed {
                    payment_id: cmd.payment_id,
                    posted_transaction: cmd.posted_transaction,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PaymentCommand::Cancel(cmd) => {
                self.ensure_created(cmd.payment_id)?;
                if self.status == PaymentStatus::Cancel {
                    return Err(DomainError::transition("payment is already cancelled"));
                }
                Ok(vec![PaymentEvent::PaymentCancelled(PaymentCancelled {
                    payment_id: cmd.payment_id,
                    voided_transaction: self.posted_transaction,
                    occurred_at: cmd.occurred_at,
                })])
            }
            PaymentCommand::ResetToDraft(cmd) => {
                self.ensure_created(cmd.payment_id)?;
                if self.status != PaymentStatus::Cancel {
                    return Err(DomainError::transition(
                        "only cancelled payments can be reset to draft",
                    ));
                }
                Ok(vec![PaymentEvent::PaymentResetToDraft(PaymentResetToDraft {
                    payment_id: cmd.payment_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Payment {
    fn ensure_created(&self, payment_id: PaymentId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("payment {payment_id}")));
        }
        if self.id != payment_id {
            return Err(DomainError::invariant("payment_id mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(treasury_day: Option<TreasuryDay>) -> Payment {
        let id = PaymentId::generate();
        let mut payment = Payment::empty(id);
        let events = payment
            .handle(&PaymentCommand::CreatePayment(CreatePayment {
                payment_id: id,
                name: "PAY/00001".into(),
                payment_type: PaymentType::Supplier,
                party: PartyId::generate(),
                amount: Money::from_major(250),
                date: Utc::now(),
                document: Some("PUR/00001".into()),
                treasury_day,
                method: PaymentMethod::Bank,
                reference: None,
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        payment.apply_all(&events);
        payment
    }

    #[test]
    fn supplier_payments_are_expenses() {
        assert_eq!(PaymentType::Supplier.transaction_kind(), TransactionKind::Expense);
        assert_eq!(PaymentType::Customer.transaction_kind(), TransactionKind::Income);
    }

    #[test]
    fn linked_payment_must_carry_its_posting() {
        let day = TreasuryDay {
            store: StoreId::generate(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        let payment = created(Some(day));
        let err = payment
            .handle(&PaymentCommand::Confirm(ConfirmPayment {
                payment_id: payment.id_typed(),
                posted_transaction: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn cancel_reports_the_voided_posting() {
        let day = TreasuryDay {
            store: StoreId::generate(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        let mut payment = created(Some(day));
        let tx = TransactionId::generate();
        let events = payment
            .handle(&PaymentCommand::Confirm(ConfirmPayment {
                payment_id: payment.id_typed(),
                posted_transaction: Some(tx),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        payment.apply_all(&events);
        assert_eq!(payment.posted_transaction(), Some(tx));

        let events = payment
            .handle(&PaymentCommand::Cancel(PaymentTransition {
                payment_id: payment.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &events[0] {
            PaymentEvent::PaymentCancelled(e) => assert_eq!(e.voided_transaction, Some(tx)),
            other => panic!("unexpected event: {other:?}"),
        }
        payment.apply_all(&events);
        assert_eq!(payment.status(), PaymentStatus::Cancel);
        assert_eq!(payment.posted_transaction(), None);
    }

    #[test]
    fn zero_amount_is_rejected() {
        let id = PaymentId::generate();
        let err = Payment::empty(id)
            .handle(&PaymentCommand::CreatePayment(CreatePayment {
                payment_id: id,
                name: "PAY/00002".into(),
                payment_type: PaymentType::Customer,
                party: PartyId::generate(),
                amount: Money::ZERO,
                date: Utc::now(),
                document: None,
                treasury_day: None,
                method: PaymentMethod::Cash,
                reference: None,
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
