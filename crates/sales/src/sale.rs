use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, Rate, typed_id};
use tailor_events::Event;
use tailor_hr::EmployeeId;
use tailor_parties::PartyId;
use tailor_stock::{MovementReference, MovementSource, StockMovement, Variant};

typed_id!(
    /// Sale invoice identifier.
    SaleId
);

/// Sale lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Draft,
    Confirmed,
    Cancel,
}

/// Document-level discount, applied before the customer's own rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Discount {
    #[default]
    None,
    Percentage(Rate),
    Fixed(Money),
}

impl Discount {
    pub fn amount_on(&self, untaxed: Money) -> Money {
        match self {
            Discount::None => Money::ZERO,
            Discount::Percentage(rate) => rate.of(untaxed),
            Discount::Fixed(amount) => *amount,
        }
    }
}

/// Sale line: variant, quantity, unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub variant: Variant,
    pub quantity: i64,
    pub unit_price: Money,
}

impl SaleLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Totals of a sale, recomputed from lines and discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleTotals {
    pub amount_untaxed: Money,
    pub discount_amount: Money,
    pub amount_total: Money,
}

impl SaleTotals {
    pub fn compute(lines: &[SaleLine], discount: Discount, customer_discount: Rate) -> Self {
        let amount_untaxed: Money = lines.iter().map(SaleLine::subtotal).sum();
        let discount_amount =
            discount.amount_on(amount_untaxed) + customer_discount.of(amount_untaxed);
        Self {
            amount_untaxed,
            discount_amount,
            amount_total: amount_untaxed - discount_amount,
        }
    }
}

/// Aggregate root: Sale (customer invoice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    name: String,
    store: Option<StoreId>,
    customer: Option<PartyId>,
    customer_discount: Rate,
    employee: Option<EmployeeId>,
    date: Option<DateTime<Utc>>,
    discount: Discount,
    loyalty_points_used: i64,
    loyalty_points_earned: i64,
    notes: Option<String>,
    status: SaleStatus,
    lines: Vec<SaleLine>,
    next_line_no: u32,
    version: u64,
    created: bool,
}

impl Sale {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            name: String::new(),
            store: None,
            customer: None,
            customer_discount: Rate::ZERO,
            employee: None,
            date: None,
            discount: Discount::None,
            loyalty_points_used: 0,
            loyalty_points_earned: 0,
            notes: None,
            status: SaleStatus::Draft,
            lines: Vec::new(),
            next_line_no: 1,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn customer(&self) -> Option<PartyId> {
        self.customer
    }

    pub fn customer_discount(&self) -> Rate {
        self.customer_discount
    }

    pub fn employee(&self) -> Option<EmployeeId> {
        self.employee
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    /// Business day of the sale (treasury posting key).
    pub fn day(&self) -> Option<NaiveDate> {
        self.date.map(|d| d.date_naive())
    }

    pub fn discount(&self) -> Discount {
        self.discount
    }

    pub fn loyalty_points_used(&self) -> i64 {
        self.loyalty_points_used
    }

    /// Points credited on confirmation; fixed once confirmed.
    pub fn loyalty_points_earned(&self) -> i64 {
        self.loyalty_points_earned
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn line(&self, line_no: u32) -> Option<&SaleLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == SaleStatus::Confirmed
    }

    pub fn totals(&self) -> SaleTotals {
        SaleTotals::compute(&self.lines, self.discount, self.customer_discount)
    }

    pub fn amount_total(&self) -> Money {
        self.totals().amount_total
    }

    pub fn movement_reference(&self, source: MovementSource) -> MovementReference {
        MovementReference::new(source, self.name.clone())
    }

    /// Stock leaving the store on confirmation.
    pub fn confirm_movements(&self) -> Vec<StockMovement> {
        match self.store {
            Some(store) => self
                .lines
                .iter()
                .map(|l| StockMovement::outbound(l.variant.at(store), l.quantity))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Stock put back when a confirmed sale is cancelled. Empty for drafts.
    pub fn cancel_movements(&self) -> Vec<StockMovement> {
        if self.status != SaleStatus::Confirmed {
            return Vec::new();
        }
        match self.store {
            Some(store) => self
                .lines
                .iter()
                .map(|l| StockMovement::inbound(l.variant.at(store), l.quantity))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSale {
    pub sale_id: SaleId,
    pub name: String,
    pub store: StoreId,
    pub customer: Option<PartyId>,
    /// The customer's discount rate at the time it was attached.
    pub customer_discount: Rate,
    pub employee: Option<EmployeeId>,
    pub date: DateTime<Utc>,
    pub discount: Discount,
    pub loyalty_points_used: i64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateSaleTerms (draft only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSaleTerms {
    pub sale_id: SaleId,
    pub customer: Option<PartyId>,
    pub customer_discount: Rate,
    pub employee: Option<EmployeeId>,
    pub discount: Discount,
    pub loyalty_points_used: i64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddSaleLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSaleLine {
    pub sale_id: SaleId,
    pub variant: Variant,
    pub quantity: i64,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveSaleLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveSaleLine {
    pub sale_id: SaleId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmSale {
    pub sale_id: SaleId,
    /// Loyalty rate in force at confirmation.
    pub spend_per_point: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelSale {
    pub sale_id: SaleId,
    /// Returns against this sale that are not cancelled.
    pub open_returns: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResetSaleToDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSaleToDraft {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    CreateSale(CreateSale),
    UpdateTerms(UpdateSaleTerms),
    AddLine(AddSaleLine),
    RemoveLine(RemoveSaleLine),
    Confirm(ConfirmSale),
    Cancel(CancelSale),
    ResetToDraft(ResetSaleToDraft),
}

/// Event: SaleCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCreated {
    pub sale_id: SaleId,
    pub name: String,
    pub store: StoreId,
    pub customer: Option<PartyId>,
    pub customer_discount: Rate,
    pub employee: Option<EmployeeId>,
    pub date: DateTime<Utc>,
    pub discount: Discount,
    pub loyalty_points_used: i64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleTermsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTermsUpdated {
    pub sale_id: SaleId,
    pub customer: Option<PartyId>,
    pub customer_discount: Rate,
    pub employee: Option<EmployeeId>,
    pub discount: Discount,
    pub loyalty_points_used: i64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleLineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineAdded {
    pub sale_id: SaleId,
    pub line_no: u32,
    pub variant: Variant,
    pub quantity: i64,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleLineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRemoved {
    pub sale_id: SaleId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfirmed {
    pub sale_id: SaleId,
    pub totals: SaleTotals,
    pub loyalty_points_earned: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancelled {
    pub sale_id: SaleId,
    /// Whether stock, loyalty and treasury effects were reversed.
    pub was_confirmed: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleResetToDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleResetToDraft {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleCreated(SaleCreated),
    TermsUpdated(SaleTermsUpdated),
    LineAdded(SaleLineAdded),
    LineRemoved(SaleLineRemoved),
    SaleConfirmed(SaleConfirmed),
    SaleCancelled(SaleCancelled),
    SaleResetToDraft(SaleResetToDraft),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleCreated(_) => "sales.sale.created",
            SaleEvent::TermsUpdated(_) => "sales.sale.terms_updated",
            SaleEvent::LineAdded(_) => "sales.sale.line_added",
            SaleEvent::LineRemoved(_) => "sales.sale.line_removed",
            SaleEvent::SaleConfirmed(_) => "sales.sale.confirmed",
            SaleEvent::SaleCancelled(_) => "sales.sale.cancelled",
            SaleEvent::SaleResetToDraft(_) => "sales.sale.reset_to_draft",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SaleCreated(e) => e.occurred_at,
            SaleEvent::TermsUpdated(e) => e.occurred_at,
            SaleEvent::LineAdded(e) => e.occurred_at,
            SaleEvent::LineRemoved(e) => e.occurred_at,
            SaleEvent::SaleConfirmed(e) => e.occurred_at,
            SaleEvent::SaleCancelled(e) => e.occurred_at,
            SaleEvent::SaleResetToDraft(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleCreated(e) => {
                self.id = e.sale_id;
                self.name = e.name.clone();
                self.store = Some(e.store);
                self.customer = e.customer;
                self.customer_discount = e.customer_discount;
                self.employee = e.employee;
                self.date = Some(e.date);
                self.discount = e.discount;
                self.loyalty_points_used = e.loyalty_points_used;
                self.loyalty_points_earned = 0;
                self.notes = e.notes.clone();
                self.status = SaleStatus::Draft;
                self.lines.clear();
                self.next_line_no = 1;
                self.created = true;
            }
            SaleEvent::TermsUpdated(e) => {
                self.customer = e.customer;
                self.customer_discount = e.customer_discount;
                self.employee = e.employee;
                self.discount = e.discount;
                self.loyalty_points_used = e.loyalty_points_used;
                self.notes = e.notes.clone();
            }
            SaleEvent::LineAdded(e) => {
                self.lines.push(SaleLine {
                    line_no: e.line_no,
                    variant: e.variant,
                    quantity: e.quantity,
                    unit_price: e.unit_price,
                });
                self.next_line_no = e.line_no + 1;
            }
            SaleEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.line_no != e.line_no);
            }
            SaleEvent::SaleConfirmed(e) => {
                self.loyalty_points_earned = e.loyalty_points_earned;
                self.status = SaleStatus::Confirmed;
            }
            SaleEvent::SaleCancelled(_) => {
                self.status = SaleStatus::Cancel;
            }
            SaleEvent::SaleResetToDraft(_) => {
                self.loyalty_points_earned = 0;
                self.status = SaleStatus::Draft;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::CreateSale(cmd) => self.handle_create(cmd),
            SaleCommand::UpdateTerms(cmd) => self.handle_update_terms(cmd),
            SaleCommand::AddLine(cmd) => self.handle_add_line(cmd),
            SaleCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            SaleCommand::Confirm(cmd) => self.handle_confirm(cmd),
            SaleCommand::Cancel(cmd) => self.handle_cancel(cmd),
            SaleCommand::ResetToDraft(cmd) => self.handle_reset(cmd),
        }
    }
}

impl Sale {
    fn ensure_created(&self, sale_id: SaleId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("sale {sale_id}")));
        }
        if self.id != sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if self.status != SaleStatus::Draft {
            return Err(DomainError::transition(format!(
                "sale {} can only be edited in draft",
                self.name
            )));
        }
        Ok(())
    }

    fn validate_terms(discount: Discount, loyalty_points_used: i64) -> Result<(), DomainError> {
        if let Discount::Fixed(amount) = discount {
            if amount.is_negative() {
                return Err(DomainError::validation("discount cannot be negative"));
            }
        }
        if loyalty_points_used < 0 {
            return Err(DomainError::validation(
                "loyalty points used cannot be negative",
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already exists"));
        }
        Self::validate_terms(cmd.discount, cmd.loyalty_points_used)?;
        if cmd.customer.is_none() && cmd.loyalty_points_used > 0 {
            return Err(DomainError::validation(
                "loyalty points can only be used by a customer",
            ));
        }

        Ok(vec![SaleEvent::SaleCreated(SaleCreated {
            sale_id: cmd.sale_id,
            name: cmd.name.clone(),
            store: cmd.store,
            customer: cmd.customer,
            customer_discount: if cmd.customer.is_some() {
                cmd.customer_discount
            } else {
                Rate::ZERO
            },
            employee: cmd.employee,
            date: cmd.date,
            discount: cmd.discount,
            loyalty_points_used: cmd.loyalty_points_used,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_terms(&self, cmd: &UpdateSaleTerms) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_created(cmd.sale_id)?;
        self.ensure_draft()?;
        Self::validate_terms(cmd.discount, cmd.loyalty_points_used)?;
        if cmd.customer.is_none() && cmd.loyalty_points_used > 0 {
            return Err(DomainError::validation(
                "loyalty points can only be used by a customer",
            ));
        }

        Ok(vec![SaleEvent::TermsUpdated(SaleTermsUpdated {
            sale_id: cmd.sale_id,
            customer: cmd.customer,
            customer_discount: if cmd.customer.is_some() {
                cmd.customer_discount
            } else {
                Rate::ZERO
            },
            employee: cmd.employee,
            discount: cmd.discount,
            loyalty_points_used: cmd.loyalty_points_used,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddSaleLine) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_created(cmd.sale_id)?;
        self.ensure_draft()?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if !cmd.unit_price.is_positive() {
            return Err(DomainError::validation("unit_price must be positive"));
        }
        let subtotal = cmd.unit_price.checked_times(cmd.quantity)?;
        Money::checked_sum(self.lines.iter().map(SaleLine::subtotal).chain([subtotal]))?;

        Ok(vec![SaleEvent::LineAdded(SaleLineAdded {
            sale_id: cmd.sale_id,
            line_no: self.next_line_no,
            variant: cmd.variant,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveSaleLine) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_created(cmd.sale_id)?;
        self.ensure_draft()?;
        if self.line(cmd.line_no).is_none() {
            return Err(DomainError::missing(format!("sale line {}", cmd.line_no)));
        }
        Ok(vec![SaleEvent::LineRemoved(SaleLineRemoved {
            sale_id: cmd.sale_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_created(cmd.sale_id)?;

        if self.status != SaleStatus::Draft {
            return Err(DomainError::transition("only draft sales can be confirmed"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("cannot confirm sale without lines"));
        }
        if !cmd.spend_per_point.is_positive() {
            return Err(DomainError::validation(
                "loyalty spend per point must be positive",
            ));
        }

        let totals = self.totals();
        if totals.discount_amount > totals.amount_untaxed {
            return Err(DomainError::validation(format!(
                "discount {} exceeds the untaxed amount {}",
                totals.discount_amount, totals.amount_untaxed
            )));
        }

        let loyalty_points_earned = if self.customer.is_some() {
            totals.amount_total.whole_units_of(cmd.spend_per_point)
        } else {
            0
        };

        Ok(vec![SaleEvent::SaleConfirmed(SaleConfirmed {
            sale_id: cmd.sale_id,
            totals,
            loyalty_points_earned,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelSale) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_created(cmd.sale_id)?;

        match self.status {
            SaleStatus::Cancel => Err(DomainError::transition("sale is already cancelled")),
            SaleStatus::Confirmed if cmd.open_returns > 0 => Err(DomainError::invariant(format!(
                "sale {} has {} open return(s); cancel them first",
                self.name, cmd.open_returns
            ))),
            SaleStatus::Draft | SaleStatus::Confirmed => {
                Ok(vec![SaleEvent::SaleCancelled(SaleCancelled {
                    sale_id: cmd.sale_id,
                    was_confirmed: self.status == SaleStatus::Confirmed,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }

    fn handle_reset(&self, cmd: &ResetSaleToDraft) -> Result<Vec<SaleEvent>, DomainError> {
        self.ensure_created(cmd.sale_id)?;
        if self.status != SaleStatus::Cancel {
            return Err(DomainError::transition(
                "only cancelled sales can be reset to draft",
            ));
        }
        Ok(vec![SaleEvent::SaleResetToDraft(SaleResetToDraft {
            sale_id: cmd.sale_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
