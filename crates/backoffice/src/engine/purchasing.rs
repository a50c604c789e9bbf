use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, DomainError, Money};
use tailor_parties::{PartyId, PartyKind};
use tailor_purchasing::{
    AddPurchaseLine, CreatePurchase, Purchase, PurchaseCommand, PurchaseEvent, PurchaseId,
    PurchaseTransition, RemovePurchaseLine,
};
use tailor_stock::{MovementSource, StockEvent, Variant};
use tailor_treasury::{DocumentKind, TreasuryEvent};

use super::{Backoffice, LEDGER, PURCHASE, State, TREASURY_BOOK, apply_to, found};
use crate::error::BackofficeResult;
use crate::journal::JournalBatch;
use crate::repository::Repository;
use crate::sequence::SequenceCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub supplier: PartyId,
    pub store: StoreId,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

fn purchase_place(purchase: &Purchase) -> Result<(StoreId, NaiveDate), DomainError> {
    match (purchase.store(), purchase.day()) {
        (Some(store), Some(day)) => Ok((store, day)),
        _ => Err(DomainError::invariant(format!(
            "purchase {} has no store or date",
            purchase.name()
        ))),
    }
}

impl State {
    /// Confirm or cancel a purchase together with its stock and day total.
    fn purchase_transition(
        &mut self,
        purchase_id: PurchaseId,
        command: PurchaseCommand,
    ) -> BackofficeResult<()> {
        let now = Utc::now();
        let purchase = found(&self.purchases, &purchase_id, "purchase")?;
        let events = purchase.handle(&command)?;
        let (store, day) = purchase_place(purchase)?;
        let name = purchase.name().to_string();

        let (stock_events, treasury_events) = match command {
            PurchaseCommand::Confirm(_) => (
                self.decide_movements(
                    purchase.movement_reference(MovementSource::Purchase),
                    purchase.confirm_movements(),
                    now,
                )?,
                self.decide_document_total(
                    store,
                    day,
                    DocumentKind::Purchase,
                    purchase.amount_total(),
                    &name,
                    now,
                )?,
            ),
            PurchaseCommand::Cancel(_) if purchase.is_confirmed() => (
                self.decide_movements(
                    purchase.movement_reference(MovementSource::PurchaseCancellation),
                    purchase.cancel_movements(),
                    now,
                )?,
                self.decide_document_total(
                    store,
                    day,
                    DocumentKind::Purchase,
                    -purchase.amount_total(),
                    &name,
                    now,
                )?,
            ),
            _ => (Vec::new(), Vec::new()),
        };

        self.commit_purchase(purchase_id, store, &events, stock_events, treasury_events)?;
        info!(purchase = %purchase_id, %name, "purchase {}", transition_label(&events));
        Ok(())
    }

    fn commit_purchase(
        &mut self,
        purchase_id: PurchaseId,
        store: StoreId,
        events: &[PurchaseEvent],
        stock_events: Vec<StockEvent>,
        treasury_events: Vec<TreasuryEvent>,
    ) -> BackofficeResult<()> {
        let book_id = self.require_book(store)?.id_typed();
        let mut batch = JournalBatch::new();
        self.stage(&mut batch, purchase_id, PURCHASE, events)?;
        self.stage(&mut batch, self.ledger.id_typed(), LEDGER, &stock_events)?;
        self.stage(&mut batch, book_id, TREASURY_BOOK, &treasury_events)?;

        apply_to(&mut self.purchases, &purchase_id, events)?;
        self.ledger.apply_all(&stock_events);
        apply_to(&mut self.books, &store, &treasury_events)?;
        self.journal.commit(batch);
        Ok(())
    }
}

fn transition_label(events: &[PurchaseEvent]) -> &'static str {
    match events.first() {
        Some(PurchaseEvent::PurchaseConfirmed(_)) => "confirmed",
        Some(PurchaseEvent::PurchaseCancelled(_)) => "cancelled",
        _ => "updated",
    }
}

impl Backoffice {
    pub fn create_purchase(&self, purchase: NewPurchase) -> BackofficeResult<PurchaseId> {
        self.write(|s| {
            s.require_party(purchase.supplier, PartyKind::Supplier)?;
            s.require_store(purchase.store)?;

            let purchase_id = PurchaseId::generate();
            let name = s.sequences.peek(SequenceCode::Purchase);
            s.create(
                |s| &mut s.purchases,
                purchase_id,
                Purchase::empty(purchase_id),
                PURCHASE,
                &PurchaseCommand::CreatePurchase(CreatePurchase {
                    purchase_id,
                    name: name.clone(),
                    supplier: purchase.supplier,
                    store: purchase.store,
                    date: purchase.date,
                    notes: purchase.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::Purchase);
            info!(purchase = %purchase_id, %name, "purchase created");
            Ok(purchase_id)
        })
    }

    /// Add a received line at the supplier's price. Returns the new line number.
    pub fn add_purchase_line(
        &self,
        purchase_id: PurchaseId,
        variant: Variant,
        quantity: i64,
        unit_price: Money,
    ) -> BackofficeResult<u32> {
        self.write(|s| {
            s.require_variant(&variant)?;
            let events = s.execute(
                |s| &mut s.purchases,
                &purchase_id,
                PURCHASE,
                &PurchaseCommand::AddLine(AddPurchaseLine {
                    purchase_id,
                    variant,
                    quantity,
                    unit_price,
                    occurred_at: Utc::now(),
                }),
            )?;
            events
                .iter()
                .find_map(|e| match e {
                    PurchaseEvent::LineAdded(added) => Some(added.line.line_no),
                    _ => None,
                })
                .ok_or_else(|| DomainError::invariant("purchase line was not added").into())
        })
    }

    pub fn remove_purchase_line(
        &self,
        purchase_id: PurchaseId,
        line_no: u32,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.purchases,
                &purchase_id,
                PURCHASE,
                &PurchaseCommand::RemoveLine(RemovePurchaseLine {
                    purchase_id,
                    line_no,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Receive the goods into the purchase's store and post the day total.
    pub fn confirm_purchase(&self, purchase_id: PurchaseId) -> BackofficeResult<()> {
        self.write(|s| {
            s.purchase_transition(
                purchase_id,
                PurchaseCommand::Confirm(PurchaseTransition {
                    purchase_id,
                    occurred_at: Utc::now(),
                }),
            )
        })
        .inspect_err(|err| {
            warn!(purchase = %purchase_id, error = %err, "purchase confirmation rejected")
        })
    }

    /// Cancel a purchase. A confirmed one takes its goods back out of stock,
    /// which fails if they have already been sold.
    pub fn cancel_purchase(&self, purchase_id: PurchaseId) -> BackofficeResult<()> {
        self.write(|s| {
            s.purchase_transition(
                purchase_id,
                PurchaseCommand::Cancel(PurchaseTransition {
                    purchase_id,
                    occurred_at: Utc::now(),
                }),
            )
        })
        .inspect_err(|err| {
            warn!(purchase = %purchase_id, error = %err, "purchase cancellation rejected")
        })
    }

    pub fn reset_purchase_to_draft(&self, purchase_id: PurchaseId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.purchases,
                &purchase_id,
                PURCHASE,
                &PurchaseCommand::ResetToDraft(PurchaseTransition {
                    purchase_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn purchase(&self, purchase_id: PurchaseId) -> BackofficeResult<Option<Purchase>> {
        self.read(|s| s.purchases.get(&purchase_id).cloned())
    }

    pub fn purchases(&self) -> BackofficeResult<Vec<Purchase>> {
        self.read(|s| s.purchases.values().cloned().collect())
    }
}
