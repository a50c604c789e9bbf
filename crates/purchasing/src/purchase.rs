use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use tailor_events::Event;
use tailor_parties::PartyId;
use tailor_stock::{MovementReference, MovementSource, StockMovement, Variant};

typed_id!(
    /// Purchase invoice identifier.
    PurchaseId
);

/// Purchase status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Draft,
    Confirmed,
    Cancel,
}

/// Purchase line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub line_no: u32,
    pub variant: Variant,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PurchaseLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Aggregate root: Purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    id: PurchaseId,
    name: String,
    supplier: Option<PartyId>,
    store: Option<StoreId>,
    date: Option<DateTime<Utc>>,
    notes: Option<String>,
    status: PurchaseStatus,
    lines: Vec<PurchaseLine>,
    next_line_no: u32,
    version: u64,
    created: bool,
}

impl Purchase {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseId) -> Self {
        Self {
            id,
            name: String::new(),
            supplier: None,
            store: None,
            date: None,
            notes: None,
            status: PurchaseStatus::Draft,
            lines: Vec::new(),
            next_line_no: 1,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supplier(&self) -> Option<PartyId> {
        self.supplier
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.date.map(|d| d.date_naive())
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> PurchaseStatus {
        self.status
    }

    pub fn lines(&self) -> &[PurchaseLine] {
        &self.lines
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == PurchaseStatus::Confirmed
    }

    pub fn amount_total(&self) -> Money {
        self.lines.iter().map(PurchaseLine::subtotal).sum()
    }

    pub fn movement_reference(&self, source: MovementSource) -> MovementReference {
        MovementReference::new(source, self.name.clone())
    }

    /// Goods received into the purchase's store.
    pub fn confirm_movements(&self) -> Vec<StockMovement> {
        let Some(store) = self.store else {
            return Vec::new();
        };
        self.lines
            .iter()
            .map(|l| StockMovement::inbound(l.variant.at(store), l.quantity))
            .collect()
    }

    /// Goods taken back out when a confirmed purchase is cancelled.
    pub fn cancel_movements(&self) -> Vec<StockMovement> {
        let Some(store) = self.store else {
            return Vec::new();
        };
        if self.status != PurchaseStatus::Confirmed {
            return Vec::new();
        }
        self.lines
            .iter()
            .map(|l| StockMovement::outbound(l.variant.at(store), l.quantity))
            .collect()
    }
}

impl AggregateRoot for Purchase {
    type Id = PurchaseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub purchase_id: PurchaseId,
    pub name: String,
    pub supplier: PartyId,
    pub store: StoreId,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddPurchaseLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPurchaseLine {
    pub purchase_id: PurchaseId,
    pub variant: Variant,
    pub quantity: i64,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemovePurchaseLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePurchaseLine {
    pub purchase_id: PurchaseId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Status transitions: confirm, cancel, reset to draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseTransition {
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseCommand {
    CreatePurchase(CreatePurchase),
    AddLine(AddPurchaseLine),
    RemoveLine(RemovePurchaseLine),
    Confirm(PurchaseTransition),
    Cancel(PurchaseTransition),
    ResetToDraft(PurchaseTransition),
}

/// Event: PurchaseCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCreated {
    pub purchase_id: PurchaseId,
    pub name: String,
    pub supplier: PartyId,
    pub store: StoreId,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLineAdded {
    pub purchase_id: PurchaseId,
    pub line: PurchaseLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseLineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLineRemoved {
    pub purchase_id: PurchaseId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseConfirmed.
///
/// Carries the lines so the received goods can be reflected in stock without
/// rehydrating the purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseConfirmed {
    pub purchase_id: PurchaseId,
    pub supplier: PartyId,
    pub lines: Vec<PurchaseLine>,
    pub amount_total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseCancelled {
    pub purchase_id: PurchaseId,
    pub was_confirmed: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResetToDraft {
    pub purchase_id: PurchaseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseEvent {
    PurchaseCreated(PurchaseCreated),
    LineAdded(PurchaseLineAdded),
    LineRemoved(PurchaseLineRemoved),
    PurchaseConfirmed(PurchaseConfirmed),
    PurchaseCancelled(PurchaseCancelled),
    PurchaseResetToDraft(PurchaseResetToDraft),
}

impl Event for PurchaseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseEvent::PurchaseCreated(_) => "purchasing.purchase.created",
            PurchaseEvent::LineAdded(_) => "purchasing.purchase.line_added",
            PurchaseEvent::LineRemoved(_) => "purchasing.purchase.line_removed",
            PurchaseEvent::PurchaseConfirmed(_) => "purchasing.purchase.confirmed",
            PurchaseEvent::PurchaseCancelled(_) => "purchasing.purchase.cancelled",
            PurchaseEvent::PurchaseResetToDraft(_) => "purchasing.purchase.reset_to_draft",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseEvent::PurchaseCreated(e) => e.occurred_at,
            PurchaseEvent::LineAdded(e) => e.occurred_at,
            PurchaseEvent::LineRemoved(e) => e.occurred_at,
            PurchaseEvent::PurchaseConfirmed(e) => e.occurred_at,
            PurchaseEvent::PurchaseCancelled(e) => e.occurred_at,
            PurchaseEvent::PurchaseResetToDraft(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Purchase {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseEvent::PurchaseCreated(e) => {
                self.id = e.purchase_id;
                self.name = e.name.clone();
                self.supplier = Some(e.supplier);
                self.store = Some(e.store);
                self.date = Some(e.date);
                self.notes = e.notes.clone();
                self.status = PurchaseStatus::Draft;
                self.lines.clear();
                self.next_line_no = 1;
                self.created = true;
            }
            PurchaseEvent::LineAdded(e) => {
                self.next_line_no = e.line.line_no + 1;
                self.lines.push(e.line.clone());
            }
            PurchaseEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            PurchaseEvent::PurchaseConfirmed(_) => {
                self.status = PurchaseStatus::Confirmed;
            }
            PurchaseEvent::PurchaseCancelled(_) => {
                self.status = PurchaseStatus::Cancel;
            }
            PurchaseEvent::PurchaseResetToDraft(_) => {
                self.status = PurchaseStatus::Draft;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseCommand::CreatePurchase(cmd) => self.handle_create(cmd),
            PurchaseCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            PurchaseCommand::Confirm(cmd) => self.handle_confirm(cmd),
            PurchaseCommand::Cancel(cmd) => self.handle_cancel(cmd),
            PurchaseCommand::ResetToDraft(cmd) => self.handle_reset(cmd),
        }
    }
}

impl Purchase {
    fn ensure_created(&self, purchase_id: PurchaseId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("purchase {purchase_id}")));
        }
        if self.id != purchase_id {
            return Err(DomainError::invariant("purchase_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != PurchaseStatus::Draft {
            return Err(DomainError::transition(format!(
                "purchase {} can only be edited in draft",
                self.name
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePurchase) -> Result<Vec<PurchaseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("purchase name cannot be empty"));
        }

        Ok(vec![PurchaseEvent::PurchaseCreated(PurchaseCreated {
            purchase_id: cmd.purchase_id,
            name: cmd.name.clone(),
            supplier: cmd.supplier,
            store: cmd.store,
            date: cmd.date,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddPurchaseLine) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_created(cmd.purchase_id)?;
        self.ensure_draft()?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.unit_price.is_negative() {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        let subtotal = cmd.unit_price.checked_times(cmd.quantity)?;
        Money::checked_sum(self.lines.iter().map(PurchaseLine::subtotal).chain([subtotal]))?;

        Ok(vec![PurchaseEvent::LineAdded(PurchaseLineAdded {
            purchase_id: cmd.purchase_id,
            line: PurchaseLine {
                line_no: self.next_line_no,
                variant: cmd.variant,
                quantity: cmd.quantity,
                unit_price: cmd.unit_price,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(
        &self,
        cmd: &RemovePurchaseLine,
    ) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_created(cmd.purchase_id)?;
        self.ensure_draft()?;
        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::missing(format!("purchase line {}", cmd.line_no)));
        }
        Ok(vec![PurchaseEvent::LineRemoved(PurchaseLineRemoved {
            purchase_id: cmd.purchase_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &PurchaseTransition) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_created(cmd.purchase_id)?;
        if self.status != PurchaseStatus::Draft {
            return Err(DomainError::transition("only draft purchases can be confirmed"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "a purchase without lines cannot be confirmed",
            ));
        }
        let supplier = self
            .supplier
            .ok_or_else(|| DomainError::invariant("purchase has no supplier"))?;

        Ok(vec![PurchaseEvent::PurchaseConfirmed(PurchaseConfirmed {
            purchase_id: cmd.purchase_id,
            supplier,
            lines: self.lines.clone(),
            amount_total: self.amount_total(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &PurchaseTransition) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_created(cmd.purchase_id)?;
        if self.status == PurchaseStatus::Cancel {
            return Err(DomainError::transition("purchase is already cancelled"));
        }
        Ok(vec![PurchaseEvent::PurchaseCancelled(PurchaseCancelled {
            purchase_id: cmd.purchase_id,
            was_confirmed: self.status == PurchaseStatus::Confirmed,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reset(&self, cmd: &PurchaseTransition) -> Result<Vec<PurchaseEvent>, DomainError> {
        self.ensure_created(cmd.purchase_id)?;
        if self.status != PurchaseStatus::Cancel {
            return Err(DomainError::transition(
                "only cancelled purchases can be reset to draft",
            ));
        }
        Ok(vec![PurchaseEvent::PurchaseResetToDraft(PurchaseResetToDraft {
            purchase_id: cmd.purchase_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tailor_catalog::{ColorId, ProductId, SizeId};

    fn variant() -> Variant {
        Variant::new(ProductId::generate(), SizeId::generate(), ColorId::generate())
    }

    fn run(purchase: &mut Purchase, cmd: PurchaseCommand) -> Result<(), DomainError> {
        let events = purchase.handle(&cmd)?;
        purchase.apply_all(&events);
        Ok(())
    }

    fn created() -> Purchase {
        let id = PurchaseId::generate();
        let mut purchase = Purchase::empty(id);
        run(
            &mut purchase,
            PurchaseCommand::CreatePurchase(CreatePurchase {
                purchase_id: id,
                name: "PUR/00001".into(),
                supplier: PartyId::generate(),
                store: StoreId::generate(),
                date: Utc::now(),
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        purchase
    }

    fn add_line(purchase: &mut Purchase, quantity: i64, price: i64) -> Result<(), DomainError> {
        let id = purchase.id_typed();
        run(
            purchase,
            PurchaseCommand::AddLine(AddPurchaseLine {
                purchase_id: id,
                variant: variant(),
                quantity,
                unit_price: Money::from_minor(price),
                occurred_at: Utc::now(),
            }),
        )
    }

    fn transition(
        purchase: &mut Purchase,
        f: fn(PurchaseTransition) -> PurchaseCommand,
    ) -> Result<(), DomainError> {
        let cmd = f(PurchaseTransition {
            purchase_id: purchase.id_typed(),
            occurred_at: Utc::now(),
        });
        run(purchase, cmd)
    }

    #[test]
    fn confirm_requires_lines() {
        let mut purchase = created();
        let err = transition(&mut purchase, PurchaseCommand::Confirm).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_priced_lines_are_accepted() {
        let mut purchase = created();
        add_line(&mut purchase, 3, 0).unwrap();
        assert_eq!(purchase.amount_total(), Money::ZERO);
        let err = add_line(&mut purchase, 1, -1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn confirm_receives_every_line() {
        let mut purchase = created();
        add_line(&mut purchase, 4, 2500).unwrap();
        add_line(&mut purchase, 2, 1000).unwrap();
        transition(&mut purchase, PurchaseCommand::Confirm).unwrap();

        assert!(purchase.is_confirmed());
        assert_eq!(purchase.amount_total(), Money::from_minor(12_000));
        let movements = purchase.confirm_movements();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.delta > 0));
        assert!(purchase.cancel_movements().iter().all(|m| m.delta < 0));
    }

    #[test]
    fn lines_are_frozen_after_confirmation() {
        let mut purchase = created();
        add_line(&mut purchase, 1, 100).unwrap();
        transition(&mut purchase, PurchaseCommand::Confirm).unwrap();
        let err = add_line(&mut purchase, 1, 100).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn reset_only_from_cancel() {
        let mut purchase = created();
        add_line(&mut purchase, 1, 100).unwrap();
        let err = transition(&mut purchase, PurchaseCommand::ResetToDraft).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        transition(&mut purchase, PurchaseCommand::Cancel).unwrap();
        assert!(purchase.cancel_movements().is_empty());
        transition(&mut purchase, PurchaseCommand::ResetToDraft).unwrap();
        assert_eq!(purchase.status(), PurchaseStatus::Draft);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the total always equals the sum of line subtotals.
        #[test]
        fn total_is_sum_of_lines(lines in prop::collection::vec((1i64..50, 0i64..100_000), 1..10)) {
            let mut purchase = created();
            for (qty, price) in &lines {
                add_line(&mut purchase, *qty, *price).unwrap();
            }
            let expected: i64 = lines.iter().map(|(q, p)| q * p).sum();
            prop_assert_eq!(purchase.amount_total(), Money::from_minor(expected));
        }
    }
}
