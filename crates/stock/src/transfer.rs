use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use tailor_events::Event;

use crate::ledger::{MovementReference, MovementSource, StockMovement, Variant};

typed_id!(
    /// Inter-store transfer identifier.
    TransferId
);

/// Transfer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Draft,
    Confirmed,
    Done,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub line_no: u32,
    pub variant: Variant,
    pub quantity: i64,
}

/// Aggregate root: Transfer.
///
/// Confirming takes the goods out of `store_from`; completing puts them into
/// `store_to`. Between the two the goods are in transit and counted nowhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    id: TransferId,
    name: String,
    store_from: Option<StoreId>,
    store_to: Option<StoreId>,
    date: Option<NaiveDate>,
    notes: Option<String>,
    status: TransferStatus,
    lines: Vec<TransferLine>,
    next_line_no: u32,
    version: u64,
    created: bool,
}

impl Transfer {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TransferId) -> Self {
        Self {
            id,
            name: String::new(),
            store_from: None,
            store_to: None,
            date: None,
            notes: None,
            status: TransferStatus::Draft,
            lines: Vec::new(),
            next_line_no: 1,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransferId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_from(&self) -> Option<StoreId> {
        self.store_from
    }

    pub fn store_to(&self) -> Option<StoreId> {
        self.store_to
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn lines(&self) -> &[TransferLine] {
        &self.lines
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Stock taken out of the source store on confirmation.
    pub fn confirm_movements(&self) -> Vec<StockMovement> {
        match self.store_from {
            Some(store) => self
                .lines
                .iter()
                .map(|l| StockMovement::outbound(l.variant.at(store), l.quantity))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Stock put into the destination store on completion.
    pub fn complete_movements(&self) -> Vec<StockMovement> {
        match self.store_to {
            Some(store) => self
                .lines
                .iter()
                .map(|l| StockMovement::inbound(l.variant.at(store), l.quantity))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Stock given back to the source store when a confirmed transfer is
    /// cancelled. Empty for drafts.
    pub fn cancel_movements(&self) -> Vec<StockMovement> {
        if self.status != TransferStatus::Confirmed {
            return Vec::new();
        }
        match self.store_from {
            Some(store) => self
                .lines
                .iter()
                .map(|l| StockMovement::inbound(l.variant.at(store), l.quantity))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn movement_reference(&self, source: MovementSource) -> MovementReference {
        MovementReference::new(source, self.name.clone())
    }
}

impl AggregateRoot for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTransfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransfer {
    pub transfer_id: TransferId,
    pub name: String,
    pub store_from: StoreId,
    pub store_to: StoreId,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddTransferLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTransferLine {
    pub transfer_id: TransferId,
    pub variant: Variant,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveTransferLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveTransferLine {
    pub transfer_id: TransferId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Status-only commands share a shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTransition {
    pub transfer_id: TransferId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferCommand {
    CreateTransfer(CreateTransfer),
    AddLine(AddTransferLine),
    RemoveLine(RemoveTransferLine),
    Confirm(TransferTransition),
    Complete(TransferTransition),
    Cancel(TransferTransition),
    ResetToDraft(TransferTransition),
}

/// Event: TransferCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCreated {
    pub transfer_id: TransferId,
    pub name: String,
    pub store_from: StoreId,
    pub store_to: StoreId,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLineAdded {
    pub transfer_id: TransferId,
    pub line_no: u32,
    pub variant: Variant,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferLineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLineRemoved {
    pub transfer_id: TransferId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransferStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatusChanged {
    pub transfer_id: TransferId,
    pub status: TransferStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEvent {
    TransferCreated(TransferCreated),
    LineAdded(TransferLineAdded),
    LineRemoved(TransferLineRemoved),
    StatusChanged(TransferStatusChanged),
}

impl Event for TransferEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferEvent::TransferCreated(_) => "stock.transfer.created",
            TransferEvent::LineAdded(_) => "stock.transfer.line_added",
            TransferEvent::LineRemoved(_) => "stock.transfer.line_removed",
            TransferEvent::StatusChanged(e) => match e.status {
                TransferStatus::Draft => "stock.transfer.reset_to_draft",
                TransferStatus::Confirmed => "stock.transfer.confirmed",
                TransferStatus::Done => "stock.transfer.done",
                TransferStatus::Cancel => "stock.transfer.cancelled",
            },
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferEvent::TransferCreated(e) => e.occurred_at,
            TransferEvent::LineAdded(e) => e.occurred_at,
            TransferEvent::LineRemoved(e) => e.occurred_at,
            TransferEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Transfer {
    type Command = TransferCommand;
    type Event = TransferEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferEvent::TransferCreated(e) => {
                self.id = e.transfer_id;
                self.name = e.name.clone();
                self.store_from = Some(e.store_from);
                self.store_to = Some(e.store_to);
                self.date = Some(e.date);
                self.notes = e.notes.clone();
                self.status = TransferStatus::Draft;
                self.lines.clear();
                self.next_line_no = 1;
                self.created = true;
            }
            TransferEvent::LineAdded(e) => {
                self.lines.push(TransferLine {
                    line_no: e.line_no,
                    variant: e.variant,
                    quantity: e.quantity,
                });
                self.next_line_no = e.line_no + 1;
            }
            TransferEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            TransferEvent::StatusChanged(e) => {
                self.status = e.status;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferCommand::CreateTransfer(cmd) => self.handle_create(cmd),
            TransferCommand::AddLine(cmd) => self.handle_add_line(cmd),
            TransferCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            TransferCommand::Confirm(cmd) => self.handle_confirm(cmd),
            TransferCommand::Complete(cmd) => self.handle_complete(cmd),
            TransferCommand::Cancel(cmd) => self.handle_cancel(cmd),
            TransferCommand::ResetToDraft(cmd) => self.handle_reset(cmd),
        }
    }
}

impl Transfer {
    fn ensure_created(&self, transfer_id: TransferId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("transfer {transfer_id}")));
        }
        if self.id != transfer_id {
            return Err(DomainError::invariant("transfer_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != TransferStatus::Draft {
            return Err(DomainError::transition(format!(
                "transfer {} can only be edited in draft",
                self.name
            )));
        }
        Ok(())
    }

    fn status_changed(
        &self,
        cmd: &TransferTransition,
        status: TransferStatus,
    ) -> Vec<TransferEvent> {
        vec![TransferEvent::StatusChanged(TransferStatusChanged {
            transfer_id: cmd.transfer_id,
            status,
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_create(&self, cmd: &CreateTransfer) -> Result<Vec<TransferEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer already exists"));
        }
        if cmd.store_from == cmd.store_to {
            return Err(DomainError::validation(
                "source and destination stores must be different",
            ));
        }

        Ok(vec![TransferEvent::TransferCreated(TransferCreated {
            transfer_id: cmd.transfer_id,
            name: cmd.name.clone(),
            store_from: cmd.store_from,
            store_to: cmd.store_to,
            date: cmd.date,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddTransferLine) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_created(cmd.transfer_id)?;
        self.ensure_draft()?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        Ok(vec![TransferEvent::LineAdded(TransferLineAdded {
            transfer_id: cmd.transfer_id,
            line_no: self.next_line_no,
            variant: cmd.variant,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(
        &self,
        cmd: &RemoveTransferLine,
    ) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_created(cmd.transfer_id)?;
        self.ensure_draft()?;

        if !self.lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::missing(format!("transfer line {}", cmd.line_no)));
        }

        Ok(vec![TransferEvent::LineRemoved(TransferLineRemoved {
            transfer_id: cmd.transfer_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &TransferTransition) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_created(cmd.transfer_id)?;
        if self.status != TransferStatus::Draft {
            return Err(DomainError::transition("only draft transfers can be confirmed"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot confirm transfer without lines"));
        }
        Ok(self.status_changed(cmd, TransferStatus::Confirmed))
    }

    fn handle_complete(&self, cmd: &TransferTransition) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_created(cmd.transfer_id)?;
        if self.status != TransferStatus::Confirmed {
            return Err(DomainError::transition(
                "only confirmed transfers can be marked done",
            ));
        }
        Ok(self.status_changed(cmd, TransferStatus::Done))
    }

    fn handle_cancel(&self, cmd: &TransferTransition) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_created(cmd.transfer_id)?;
        match self.status {
            TransferStatus::Done => Err(DomainError::transition(
                "a completed transfer cannot be cancelled",
            )),
            TransferStatus::Cancel => Err(DomainError::transition("transfer is already cancelled")),
            TransferStatus::Draft | TransferStatus::Confirmed => {
                Ok(self.status_changed(cmd, TransferStatus::Cancel))
            }
        }
    }

    fn handle_reset(&self, cmd: &TransferTransition) -> Result<Vec<TransferEvent>, DomainError> {
        self.ensure_created(cmd.transfer_id)?;
        if self.status != TransferStatus::Cancel {
            return Err(DomainError::transition(
                "only cancelled transfers can be reset to draft",
            ));
        }
        Ok(self.status_changed(cmd, TransferStatus::Draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tailor_catalog::{ColorId, ProductId, SizeId};

    fn variant() -> Variant {
        Variant::new(ProductId::generate(), SizeId::generate(), ColorId::generate())
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn transition(id: TransferId) -> TransferTransition {
        TransferTransition {
            transfer_id: id,
            occurred_at: Utc::now(),
        }
    }

    fn run(transfer: &mut Transfer, cmd: TransferCommand) -> Result<(), DomainError> {
        let events = transfer.handle(&cmd)?;
        transfer.apply_all(&events);
        Ok(())
    }

    fn draft_with_line(from: StoreId, to: StoreId, v: Variant, qty: i64) -> Transfer {
        let id = TransferId::generate();
        let mut transfer = Transfer::empty(id);
        run(
            &mut transfer,
            TransferCommand::CreateTransfer(CreateTransfer {
                transfer_id: id,
                name: "TRF/00001".into(),
                store_from: from,
                store_to: to,
                date: date(),
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut transfer,
            TransferCommand::AddLine(AddTransferLine {
                transfer_id: id,
                variant: v,
                quantity: qty,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        transfer
    }

    #[test]
    fn same_store_on_both_ends_is_rejected() {
        let id = TransferId::generate();
        let store = StoreId::generate();
        let err = Transfer::empty(id)
            .handle(&TransferCommand::CreateTransfer(CreateTransfer {
                transfer_id: id,
                name: "TRF/00001".into(),
                store_from: store,
                store_to: store,
                date: date(),
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn movements_follow_the_lifecycle() {
        let (from, to, v) = (StoreId::generate(), StoreId::generate(), variant());
        let mut transfer = draft_with_line(from, to, v, 3);
        let id = transfer.id_typed();

        assert!(transfer.cancel_movements().is_empty());
        assert_eq!(
            transfer.confirm_movements(),
            vec![StockMovement::new(v.at(from), -3)]
        );
        assert_eq!(
            transfer.complete_movements(),
            vec![StockMovement::new(v.at(to), 3)]
        );

        run(&mut transfer, TransferCommand::Confirm(transition(id))).unwrap();
        assert_eq!(
            transfer.cancel_movements(),
            vec![StockMovement::new(v.at(from), 3)]
        );

        run(&mut transfer, TransferCommand::Complete(transition(id))).unwrap();
        assert_eq!(transfer.status(), TransferStatus::Done);

        let err = transfer
            .handle(&TransferCommand::Cancel(transition(id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn empty_transfer_cannot_be_confirmed() {
        let id = TransferId::generate();
        let mut transfer = Transfer::empty(id);
        run(
            &mut transfer,
            TransferCommand::CreateTransfer(CreateTransfer {
                transfer_id: id,
                name: "TRF/00002".into(),
                store_from: StoreId::generate(),
                store_to: StoreId::generate(),
                date: date(),
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = transfer
            .handle(&TransferCommand::Confirm(transition(id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn lines_are_frozen_after_confirmation() {
        let mut transfer = draft_with_line(StoreId::generate(), StoreId::generate(), variant(), 1);
        let id = transfer.id_typed();
        run(&mut transfer, TransferCommand::Confirm(transition(id))).unwrap();

        let err = transfer
            .handle(&TransferCommand::RemoveLine(RemoveTransferLine {
                transfer_id: id,
                line_no: 1,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn reset_to_draft_only_from_cancel() {
        let mut transfer = draft_with_line(StoreId::generate(), StoreId::generate(), variant(), 1);
        let id = transfer.id_typed();

        let err = transfer
            .handle(&TransferCommand::ResetToDraft(transition(id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        run(&mut transfer, TransferCommand::Cancel(transition(id))).unwrap();
        run(&mut transfer, TransferCommand::ResetToDraft(transition(id))).unwrap();
        assert_eq!(transfer.status(), TransferStatus::Draft);
        assert_eq!(transfer.lines().len(), 1);
    }
}
