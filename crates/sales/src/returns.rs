//! Returns and exchanges against a confirmed sale.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use tailor_events::Event;
use tailor_parties::PartyId;
use tailor_stock::{MovementReference, MovementSource, StockMovement, Variant};

use crate::sale::{Sale, SaleId};

typed_id!(
    /// Return / exchange document identifier.
    ReturnId
);

/// Default number of days after a sale during which returns are accepted.
pub const DEFAULT_RETURN_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    /// Money back.
    #[default]
    Return,
    /// Goods swapped for other goods.
    Exchange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Defect,
    WrongSize,
    WrongColor,
    NotAsDescribed,
    CustomerChangedMind,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnStatus {
    Draft,
    Approved,
    Done,
    Cancel,
}

/// A sale line as seen by the return: how much was sold and how much comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    /// Line number on the original sale.
    pub sale_line_no: u32,
    pub variant: Variant,
    pub quantity_sold: i64,
    pub quantity_return: i64,
    pub unit_price: Money,
}

impl ReturnLine {
    pub fn amount(&self) -> Money {
        self.unit_price.times(self.quantity_return)
    }
}

/// Replacement goods handed out in an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLine {
    pub line_no: u32,
    pub variant: Variant,
    pub quantity: i64,
    pub unit_price: Money,
}

impl ExchangeLine {
    pub fn amount(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Money side of a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReturnAmounts {
    pub return_amount: Money,
    pub exchange_amount: Money,
    /// Positive: the customer pays. Negative: the customer is refunded.
    pub difference: Money,
}

/// Aggregate root: SaleReturn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReturn {
    id: ReturnId,
    name: String,
    sale: Option<SaleId>,
    sale_date: Option<DateTime<Utc>>,
    store: Option<StoreId>,
    customer: Option<PartyId>,
    date: Option<DateTime<Utc>>,
    return_type: ReturnType,
    reason: Option<ReturnReason>,
    reason_details: Option<String>,
    notes: Option<String>,
    status: ReturnStatus,
    lines: Vec<ReturnLine>,
    exchange_lines: Vec<ExchangeLine>,
    next_exchange_no: u32,
    version: u64,
    created: bool,
}

impl SaleReturn {
    pub fn empty(id: ReturnId) -> Self {
        Self {
            id,
            name: String::new(),
            sale: None,
            sale_date: None,
            store: None,
            customer: None,
            date: None,
            return_type: ReturnType::Return,
            reason: None,
            reason_details: None,
            notes: None,
            status: ReturnStatus::Draft,
            lines: Vec::new(),
            exchange_lines: Vec::new(),
            next_exchange_no: 1,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReturnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sale(&self) -> Option<SaleId> {
        self.sale
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn customer(&self) -> Option<PartyId> {
        self.customer
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }

    pub fn reason(&self) -> Option<ReturnReason> {
        self.reason
    }

    pub fn reason_details(&self) -> Option<&str> {
        self.reason_details.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> ReturnStatus {
        self.status
    }

    pub fn lines(&self) -> &[ReturnLine] {
        &self.lines
    }

    pub fn exchange_lines(&self) -> &[ExchangeLine] {
        &self.exchange_lines
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Whether this return blocks cancelling its sale.
    pub fn is_open(&self) -> bool {
        self.created && self.status != ReturnStatus::Cancel
    }

    /// Whether this return's quantities count against the sale.
    pub fn holds_quantities(&self) -> bool {
        matches!(self.status, ReturnStatus::Approved | ReturnStatus::Done)
    }

    /// Whole days between the sale and the return.
    pub fn days_since_sale(&self) -> i64 {
        match (self.sale_date, self.date) {
            (Some(sold), Some(returned)) => (returned - sold).num_days(),
            _ => 0,
        }
    }

    pub fn amounts(&self) -> ReturnAmounts {
        let return_amount: Money = self.lines.iter().map(ReturnLine::amount).sum();
        let exchange_amount: Money = self.exchange_lines.iter().map(ExchangeLine::amount).sum();
        ReturnAmounts {
            return_amount,
            exchange_amount,
            difference: exchange_amount - return_amount,
        }
    }

    /// Quantity returned per sale line.
    pub fn returned_quantities(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.lines
            .iter()
            .filter(|l| l.quantity_return > 0)
            .map(|l| (l.sale_line_no, l.quantity_return))
    }

    pub fn movement_reference(&self) -> MovementReference {
        MovementReference::new(MovementSource::Return, self.name.clone())
    }

    /// Returned goods back in, replacement goods out, as one batch.
    pub fn complete_movements(&self) -> Vec<StockMovement> {
        let Some(store) = self.store else {
            return Vec::new();
        };
        let inbound = self
            .lines
            .iter()
            .filter(|l| l.quantity_return > 0)
            .map(|l| StockMovement::inbound(l.variant.at(store), l.quantity_return));
        let outbound = self
            .exchange_lines
            .iter()
            .filter(|_| self.return_type == ReturnType::Exchange)
            .map(|l| StockMovement::outbound(l.variant.at(store), l.quantity));
        inbound.chain(outbound).collect()
    }
}

impl AggregateRoot for SaleReturn {
    type Id = ReturnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// What a return needs to know about its sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoldLines {
    pub sale_id: SaleId,
    pub sale_date: DateTime<Utc>,
    pub store: StoreId,
    pub customer: Option<PartyId>,
    pub lines: Vec<ReturnLine>,
}

impl SoldLines {
    /// Snapshot of a confirmed sale with nothing marked for return yet.
    pub fn from_sale(sale: &Sale) -> Result<Self, DomainError> {
        if !sale.is_confirmed() {
            return Err(DomainError::transition(format!(
                "returns can only be created for confirmed sales ({} is {:?})",
                sale.name(),
                sale.status()
            )));
        }
        let (Some(store), Some(sale_date)) = (sale.store(), sale.date()) else {
            return Err(DomainError::invariant("confirmed sale without store or date"));
        };
        Ok(Self {
            sale_id: sale.id_typed(),
            sale_date,
            store,
            customer: sale.customer(),
            lines: sale
                .lines()
                .iter()
                .map(|l| ReturnLine {
                    sale_line_no: l.line_no,
                    variant: l.variant,
                    quantity_sold: l.quantity,
                    quantity_return: 0,
                    unit_price: l.unit_price,
                })
                .collect(),
        })
    }
}

/// Command: CreateReturn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReturn {
    pub return_id: ReturnId,
    pub name: String,
    pub sold: SoldLines,
    pub date: DateTime<Utc>,
    pub return_type: ReturnType,
    pub reason: ReturnReason,
    pub reason_details: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetReturnQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReturnQuantity {
    pub return_id: ReturnId,
    pub sale_line_no: u32,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddExchangeLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddExchangeLine {
    pub return_id: ReturnId,
    pub variant: Variant,
    pub quantity: i64,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveExchangeLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveExchangeLine {
    pub return_id: ReturnId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveReturn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveReturn {
    pub return_id: ReturnId,
    pub window_days: i64,
    /// Quantities already held by other approved or done returns of the same
    /// sale, keyed by sale line number.
    pub already_returned: BTreeMap<u32, i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnTransition {
    pub return_id: ReturnId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnCommand {
    CreateReturn(CreateReturn),
    SetQuantity(SetReturnQuantity),
    AddExchangeLine(AddExchangeLine),
    RemoveExchangeLine(RemoveExchangeLine),
    Approve(ApproveReturn),
    Complete(ReturnTransition),
    Cancel(ReturnTransition),
    ResetToDraft(ReturnTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnCreated {
    pub return_id: ReturnId,
    pub name: String,
    pub sold: SoldLines,
    pub date: DateTime<Utc>,
    pub return_type: ReturnType,
    pub reason: ReturnReason,
    pub reason_details: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnQuantitySet {
    pub return_id: ReturnId,
    pub sale_line_no: u32,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLineAdded {
    pub return_id: ReturnId,
    pub line: ExchangeLine,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLineRemoved {
    pub return_id: ReturnId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnStatusChanged {
    pub return_id: ReturnId,
    pub status: ReturnStatus,
    pub amounts: ReturnAmounts,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnEvent {
    ReturnCreated(ReturnCreated),
    QuantitySet(ReturnQuantitySet),
    ExchangeLineAdded(ExchangeLineAdded),
    ExchangeLineRemoved(ExchangeLineRemoved),
    StatusChanged(ReturnStatusChanged),
}

impl Event for ReturnEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReturnEvent::ReturnCreated(_) => "sales.return.created",
            ReturnEvent::QuantitySet(_) => "sales.return.quantity_set",
            ReturnEvent::ExchangeLineAdded(_) => "sales.return.exchange_line_added",
            ReturnEvent::ExchangeLineRemoved(_) => "sales.return.exchange_line_removed",
            ReturnEvent::StatusChanged(e) => match e.status {
                ReturnStatus::Draft => "sales.return.reset_to_draft",
                ReturnStatus::Approved => "sales.return.approved",
                ReturnStatus::Done => "sales.return.done",
                ReturnStatus::Cancel => "sales.return.cancelled",
            },
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReturnEvent::ReturnCreated(e) => e.occurred_at,
            ReturnEvent::QuantitySet(e) => e.occurred_at,
            ReturnEvent::ExchangeLineAdded(e) => e.occurred_at,
            ReturnEvent::ExchangeLineRemoved(e) => e.occurred_at,
            ReturnEvent::StatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for SaleReturn {
    type Command = ReturnCommand;
    type Event = ReturnEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReturnEvent::ReturnCreated(e) => {
                self.id = e.return_id;
                self.name = e.name.clone();
                self.sale = Some(e.sold.sale_id);
                self.sale_date = Some(e.sold.sale_date);
                self.store = Some(e.sold.store);
                self.customer = e.sold.customer;
                self.lines = e.sold.lines.clone();
                self.date = Some(e.date);
                self.return_type = e.return_type;
                self.reason = Some(e.reason);
                self.reason_details = e.reason_details.clone();
                self.notes = e.notes.clone();
                self.status = ReturnStatus::Draft;
                self.exchange_lines.clear();
                self.next_exchange_no = 1;
                self.created = true;
            }
            ReturnEvent::QuantitySet(e) => {
                if let Some(line) = self
                    .lines
                    .iter_mut()
                    .find(|l| l.sale_line_no == e.sale_line_no)
                {
                    line.quantity_return = e.quantity;
                }
            }
            ReturnEvent::ExchangeLineAdded(e) => {
                self.next_exchange_no = e.line.line_no + 1;
                self.exchange_lines.push(e.line.clone());
            }
            ReturnEvent::ExchangeLineRemoved(e) => {
                self.exchange_lines.retain(|l| l.line_no != e.line_no);
            }
            ReturnEvent::StatusChanged(e) => {
                self.status = e.status;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReturnCommand::CreateReturn(cmd) => self.handle_create(cmd),
            ReturnCommand::SetQuantity(cmd) => self.handle_set_quantity(cmd),
            ReturnCommand::AddExchangeLine(cmd) => self.handle_add_exchange(cmd),
            ReturnCommand::RemoveExchangeLine(cmd) => self.handle_remove_exchange(cmd),
            ReturnCommand::Approve(cmd) => self.handle_approve(cmd),
            ReturnCommand::Complete(cmd) => self.handle_complete(cmd),
            ReturnCommand::Cancel(cmd) => self.handle_cancel(cmd),
            ReturnCommand::ResetToDraft(cmd) => self.handle_reset(cmd),
        }
    }
}

impl SaleReturn {
    fn ensure_created(&self, return_id: ReturnId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("return {return_id}")));
        }
        if self.id != return_id {
            return Err(DomainError::invariant("return_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != ReturnStatus::Draft {
            return Err(DomainError::transition(format!(
                "return {} can only be edited in draft",
                self.name
            )));
        }
        Ok(())
    }

    fn status_changed(
        &self,
        return_id: ReturnId,
        status: ReturnStatus,
        at: DateTime<Utc>,
    ) -> Vec<ReturnEvent> {
        vec![ReturnEvent::StatusChanged(ReturnStatusChanged {
            return_id,
            status,
            amounts: self.amounts(),
            occurred_at: at,
        })]
    }

    fn handle_create(&self, cmd: &CreateReturn) -> Result<Vec<ReturnEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("return already exists"));
        }
        if cmd.sold.lines.is_empty() {
            return Err(DomainError::validation("the sale has no lines to return"));
        }
        if cmd.date < cmd.sold.sale_date {
            return Err(DomainError::validation("a return cannot predate its sale"));
        }

        let mut sold = cmd.sold.clone();
        for line in &mut sold.lines {
            line.quantity_return = 0;
        }

        Ok(vec![ReturnEvent::ReturnCreated(ReturnCreated {
            return_id: cmd.return_id,
            name: cmd.name.clone(),
            sold,
            date: cmd.date,
            return_type: cmd.return_type,
            reason: cmd.reason,
            reason_details: cmd.reason_details.clone(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_quantity(
        &self,
        cmd: &SetReturnQuantity,
    ) -> Result<Vec<ReturnEvent>, DomainError> {
        self.ensure_created(cmd.return_id)?;
        self.ensure_draft()?;

        let line = self
            .lines
            .iter()
            .find(|l| l.sale_line_no == cmd.sale_line_no)
            .ok_or_else(|| DomainError::missing(format!("sale line {}", cmd.sale_line_no)))?;

        if cmd.quantity < 0 {
            return Err(DomainError::validation(
                "returned quantity cannot be negative",
            ));
        }
        if cmd.quantity > line.quantity_sold {
            return Err(DomainError::validation(format!(
                "returned quantity ({}) exceeds sold quantity ({})",
                cmd.quantity, line.quantity_sold
            )));
        }

        Ok(vec![ReturnEvent::QuantitySet(ReturnQuantitySet {
            return_id: cmd.return_id,
            sale_line_no: cmd.sale_line_no,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_exchange(&self, cmd: &AddExchangeLine) -> Result<Vec<ReturnEvent>, DomainError> {
        self.ensure_created(cmd.return_id)?;
        self.ensure_draft()?;

        if self.return_type != ReturnType::Exchange {
            return Err(DomainError::validation(
                "replacement goods only apply to exchanges",
            ));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.unit_price.is_negative() {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        let amount = cmd.unit_price.checked_times(cmd.quantity)?;
        Money::checked_sum(self.exchange_lines.iter().map(ExchangeLine::amount).chain([amount]))?;

        Ok(vec![ReturnEvent::ExchangeLineAdded(ExchangeLineAdded {
            return_id: cmd.return_id,
            line: ExchangeLine {
                line_no: self.next_exchange_no,
                variant: cmd.variant,
                quantity: cmd.quantity,
                unit_price: cmd.unit_price,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_exchange(
        &self,
        cmd: &RemoveExchangeLine,
    ) -> Result<Vec<ReturnEvent>, DomainError> {
        self.ensure_created(cmd.return_id)?;
        self.ensure_draft()?;
        if !self.exchange_lines.iter().any(|l| l.line_no == cmd.line_no) {
            return Err(DomainError::missing(format!("exchange line {}", cmd.line_no)));
        }
        Ok(vec![ReturnEvent::ExchangeLineRemoved(ExchangeLineRemoved {
            return_id: cmd.return_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveReturn) -> Result<Vec<ReturnEvent>, DomainError> {
        self.ensure_created(cmd.return_id)?;
        if self.status != ReturnStatus::Draft {
            return Err(DomainError::transition("only draft returns can be approved"));
        }

        if !self.lines.iter().any(|l| l.quantity_return > 0) {
            return Err(DomainError::validation(
                "at least one line must have a returned quantity",
            ));
        }

        let days = self.days_since_sale();
        if days > cmd.window_days {
            return Err(DomainError::ReturnWindowExpired {
                days,
                window: cmd.window_days,
            });
        }

        for line in &self.lines {
            let taken = cmd
                .already_returned
                .get(&line.sale_line_no)
                .copied()
                .unwrap_or(0);
            let returnable = line.quantity_sold - taken;
            if line.quantity_return > returnable {
                return Err(DomainError::validation(format!(
                    "returned quantity ({}) exceeds what is still returnable ({}) on sale line {}",
                    line.quantity_return, returnable, line.sale_line_no
                )));
            }
        }

        Ok(self.status_changed(cmd.return_id, ReturnStatus::Approved, cmd.occurred_at))
    }

    fn handle_complete(&self, cmd: &ReturnTransition) -> Result<Vec<ReturnEvent>, DomainError> {
        self.ensure_created(cmd.return_id)?;
        if self.status != ReturnStatus::Approved {
            return Err(DomainError::transition(
                "the return must be approved before it is completed",
            ));
        }
        Ok(self.status_changed(cmd.return_id, ReturnStatus::Done, cmd.occurred_at))
    }

    fn handle_cancel(&self, cmd: &ReturnTransition) -> Result<Vec<ReturnEvent>, DomainError> {
        self.ensure_created(cmd.return_id)?;
        match self.status {
            ReturnStatus::Done => Err(DomainError::transition(
                "a completed return cannot be cancelled",
            )),
            ReturnStatus::Cancel => Err(DomainError::transition("return is already cancelled")),
            ReturnStatus::Draft | ReturnStatus::Approved => {
                Ok(self.status_changed(cmd.return_id, ReturnStatus::Cancel, cmd.occurred_at))
            }
        }
    }

    fn handle_reset(&self, cmd: &ReturnTransition) -> Result<Vec<ReturnEvent>, DomainError> {
        self.ensure_created(cmd.return_id)?;
        if self.status != ReturnStatus::Cancel {
            return Err(DomainError::transition(
                "only cancelled returns can be reset to draft",
            ));
        }
        Ok(self.status_changed(cmd.return_id, ReturnStatus::Draft, cmd.occurred_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use tailor_catalog::{ColorId, ProductId, SizeId};

    fn sold_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    fn variant() -> Variant {
        Variant::new(ProductId::generate(), SizeId::generate(), ColorId::generate())
    }

    fn sold(quantities: &[i64]) -> SoldLines {
        SoldLines {
            sale_id: SaleId::generate(),
            sale_date: sold_at(),
            store: StoreId::generate(),
            customer: None,
            lines: quantities
                .iter()
                .zip(1u32..)
                .map(|(q, n)| ReturnLine {
                    sale_line_no: n,
                    variant: variant(),
                    quantity_sold: *q,
                    quantity_return: 0,
                    unit_price: Money::from_major(100),
                })
                .collect(),
        }
    }

    fn run(ret: &mut SaleReturn, cmd: ReturnCommand) -> Result<(), DomainError> {
        let events = ret.handle(&cmd)?;
        ret.apply_all(&events);
        Ok(())
    }

    fn created(sold: SoldLines, return_type: ReturnType, days_after: i64) -> SaleReturn {
        let id = ReturnId::generate();
        let mut ret = SaleReturn::empty(id);
        run(
            &mut ret,
            ReturnCommand::CreateReturn(CreateReturn {
                return_id: id,
                name: "RET/00001".into(),
                sold,
                date: sold_at() + Duration::days(days_after),
                return_type,
                reason: ReturnReason::WrongSize,
                reason_details: None,
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        ret
    }

    fn set_qty(ret: &mut SaleReturn, line: u32, qty: i64) -> Result<(), DomainError> {
        let id = ret.id_typed();
        run(
            ret,
            ReturnCommand::SetQuantity(SetReturnQuantity {
                return_id: id,
                sale_line_no: line,
                quantity: qty,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn approve(ret: &mut SaleReturn, already: BTreeMap<u32, i64>) -> Result<(), DomainError> {
        let id = ret.id_typed();
        run(
            ret,
            ReturnCommand::Approve(ApproveReturn {
                return_id: id,
                window_days: DEFAULT_RETURN_WINDOW_DAYS,
                already_returned: already,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn approval_requires_a_returned_quantity() {
        let mut ret = created(sold(&[2]), ReturnType::Return, 1);
        let err = approve(&mut ret, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn approval_outside_window_is_rejected() {
        let mut ret = created(sold(&[2]), ReturnType::Return, 8);
        set_qty(&mut ret, 1, 1).unwrap();
        let err = approve(&mut ret, BTreeMap::new()).unwrap_err();
        assert_eq!(err, DomainError::ReturnWindowExpired { days: 8, window: 7 });
    }

    #[test]
    fn last_day_of_window_is_accepted() {
        let mut ret = created(sold(&[2]), ReturnType::Return, 7);
        set_qty(&mut ret, 1, 2).unwrap();
        approve(&mut ret, BTreeMap::new()).unwrap();
        assert_eq!(ret.status(), ReturnStatus::Approved);
        assert!(ret.holds_quantities());
    }

    #[test]
    fn quantity_above_sold_is_rejected_at_entry() {
        let mut ret = created(sold(&[2]), ReturnType::Return, 0);
        let err = set_qty(&mut ret, 1, 3).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn earlier_returns_reduce_what_is_returnable() {
        let mut ret = created(sold(&[3]), ReturnType::Return, 0);
        set_qty(&mut ret, 1, 2).unwrap();
        let err = approve(&mut ret, BTreeMap::from([(1, 2)])).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("returnable") => {}
            other => panic!("unexpected error: {other:?}"),
        }
        approve(&mut ret, BTreeMap::from([(1, 1)])).unwrap();
    }

    #[test]
    fn exchange_moves_both_directions_and_prices_the_difference() {
        let s = sold(&[1]);
        let store = s.store;
        let returned = s.lines[0].variant;
        let mut ret = created(s, ReturnType::Exchange, 2);
        set_qty(&mut ret, 1, 1).unwrap();

        let replacement = variant();
        let id = ret.id_typed();
        run(
            &mut ret,
            ReturnCommand::AddExchangeLine(AddExchangeLine {
                return_id: id,
                variant: replacement,
                quantity: 1,
                unit_price: Money::from_major(130),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let amounts = ret.amounts();
        assert_eq!(amounts.return_amount, Money::from_major(100));
        assert_eq!(amounts.exchange_amount, Money::from_major(130));
        assert_eq!(amounts.difference, Money::from_major(30));

        assert_eq!(
            ret.complete_movements(),
            vec![
                StockMovement::inbound(returned.at(store), 1),
                StockMovement::outbound(replacement.at(store), 1),
            ]
        );
    }

    #[test]
    fn plain_return_refuses_replacement_goods() {
        let ret = created(sold(&[1]), ReturnType::Return, 0);
        let err = ret
            .handle(&ReturnCommand::AddExchangeLine(AddExchangeLine {
                return_id: ret.id_typed(),
                variant: variant(),
                quantity: 1,
                unit_price: Money::from_major(1),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn done_return_cannot_be_cancelled() {
        let mut ret = created(sold(&[1]), ReturnType::Return, 0);
        set_qty(&mut ret, 1, 1).unwrap();
        approve(&mut ret, BTreeMap::new()).unwrap();
        let id = ret.id_typed();
        run(
            &mut ret,
            ReturnCommand::Complete(ReturnTransition {
                return_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = ret
            .handle(&ReturnCommand::Cancel(ReturnTransition {
                return_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever quantities are requested, an approved return
        /// never holds more than was sold minus what earlier returns hold.
        #[test]
        fn approved_quantity_never_exceeds_sold(
            sold_qty in 1i64..10,
            requested in 0i64..15,
            earlier in 0i64..10,
        ) {
            let mut ret = created(sold(&[sold_qty]), ReturnType::Return, 1);
            let earlier = earlier.min(sold_qty);
            if set_qty(&mut ret, 1, requested).is_err() {
                prop_assert!(requested > sold_qty);
                return Ok(());
            }
            if approve(&mut ret, BTreeMap::from([(1, earlier)])).is_ok() {
                let line = &ret.lines()[0];
                prop_assert!(line.quantity_return <= line.quantity_sold);
                prop_assert!(line.quantity_return + earlier <= sold_qty);
            }
        }
    }
}
