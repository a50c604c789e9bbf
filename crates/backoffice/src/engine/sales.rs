use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, DomainError, Money, Rate};
use tailor_hr::EmployeeId;
use tailor_parties::{AdjustLoyalty, PartyCommand, PartyEvent, PartyId, PartyKind};
use tailor_sales::{
    AddExchangeLine, AddSaleLine, ApproveReturn, CancelSale, ConfirmSale, CreateReturn,
    CreateSale, Discount, RemoveExchangeLine, RemoveSaleLine, ResetSaleToDraft, ReturnCommand,
    ReturnEvent, ReturnId, ReturnReason, ReturnTransition, ReturnType, Sale, SaleCommand,
    SaleEvent, SaleId, SaleReturn, SetReturnQuantity, SoldLines, UpdateSaleTerms,
};
use tailor_stock::{MovementSource, StockEvent, Variant};
use tailor_treasury::{DocumentKind, TreasuryEvent};

use super::{Backoffice, LEDGER, PARTY, RETURN, SALE, State, TREASURY_BOOK, apply_to, found};
use crate::error::BackofficeResult;
use crate::journal::JournalBatch;
use crate::repository::Repository;
use crate::sequence::SequenceCode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub store: StoreId,
    pub customer: Option<PartyId>,
    pub employee: Option<EmployeeId>,
    pub date: DateTime<Utc>,
    pub discount: Discount,
    pub loyalty_points_used: i64,
    pub notes: Option<String>,
}

impl NewSale {
    /// Walk-in sale with no customer, employee or discount.
    pub fn walk_in(store: StoreId, date: DateTime<Utc>) -> Self {
        Self {
            store,
            customer: None,
            employee: None,
            date,
            discount: Discount::None,
            loyalty_points_used: 0,
            notes: None,
        }
    }
}

/// Header fields editable while a sale is a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTerms {
    pub customer: Option<PartyId>,
    pub employee: Option<EmployeeId>,
    pub discount: Discount,
    pub loyalty_points_used: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReturn {
    pub sale: SaleId,
    pub date: DateTime<Utc>,
    pub return_type: ReturnType,
    pub reason: ReturnReason,
    pub reason_details: Option<String>,
    pub notes: Option<String>,
}

/// Loyalty change of one customer, decided alongside a sale transition.
struct LoyaltyChange {
    customer: PartyId,
    events: Vec<PartyEvent>,
}

impl State {
    /// Customer discount rate to freeze on the sale; checks the references.
    fn sale_references(
        &self,
        customer: Option<PartyId>,
        employee: Option<EmployeeId>,
    ) -> BackofficeResult<Rate> {
        if let Some(employee) = employee {
            let employee = self.require_employee(employee)?;
            if !employee.is_active() {
                return Err(DomainError::invariant(format!(
                    "employee {} is not active",
                    employee.name()
                ))
                .into());
            }
        }
        Ok(match customer {
            Some(customer) => self.require_party(customer, PartyKind::Customer)?.discount(),
            None => Rate::ZERO,
        })
    }

    fn decide_loyalty(
        &self,
        customer: Option<PartyId>,
        earned: i64,
        used: i64,
        document: &str,
        occurred_at: DateTime<Utc>,
    ) -> BackofficeResult<Option<LoyaltyChange>> {
        let Some(customer) = customer else {
            return Ok(None);
        };
        let party = found(&self.parties, &customer, "customer")?;
        let events = party.handle(&PartyCommand::AdjustLoyalty(AdjustLoyalty {
            party_id: customer,
            earned,
            used,
            document: document.to_string(),
            occurred_at,
        }))?;
        Ok(Some(LoyaltyChange { customer, events }))
    }

    /// Confirm: stock out, loyalty in, day total up. All or nothing.
    fn confirm_sale(&mut self, sale_id: SaleId) -> BackofficeResult<()> {
        let now = Utc::now();
        let sale = found(&self.sales, &sale_id, "sale")?;
        let events = sale.handle(&SaleCommand::Confirm(ConfirmSale {
            sale_id,
            spend_per_point: self.settings.loyalty_spend_per_point,
            occurred_at: now,
        }))?;
        let earned = events
            .iter()
            .find_map(|e| match e {
                SaleEvent::SaleConfirmed(confirmed) => Some(confirmed.loyalty_points_earned),
                _ => None,
            })
            .unwrap_or(0);
        let (store, day) = sale_place(sale)?;
        let name = sale.name().to_string();
        let amount_total = sale.amount_total();

        let stock_events = self.decide_movements(
            sale.movement_reference(MovementSource::Sale),
            sale.confirm_movements(),
            now,
        )?;
        let loyalty =
            self.decide_loyalty(sale.customer(), earned, sale.loyalty_points_used(), &name, now)?;
        let treasury_events =
            self.decide_document_total(store, day, DocumentKind::Sale, amount_total, &name, now)?;

        self.commit_sale(sale_id, store, events, stock_events, loyalty, treasury_events)?;
        info!(sale = %sale_id, %name, amount_total = %amount_total, earned, "sale confirmed");
        Ok(())
    }

    /// Cancel: a confirmed sale gives back its stock, loyalty and day total.
    fn cancel_sale(&mut self, sale_id: SaleId) -> BackofficeResult<()> {
        let now = Utc::now();
        let open_returns = self
            .returns
            .values()
            .filter(|r| r.sale() == Some(sale_id) && r.is_open())
            .count();
        let sale = found(&self.sales, &sale_id, "sale")?;
        let events = sale.handle(&SaleCommand::Cancel(CancelSale {
            sale_id,
            open_returns,
            occurred_at: now,
        }))?;
        let (store, day) = sale_place(sale)?;
        let name = sale.name().to_string();

        let (stock_events, loyalty, treasury_events) = if sale.is_confirmed() {
            (
                self.decide_movements(
                    sale.movement_reference(MovementSource::SaleCancellation),
                    sale.cancel_movements(),
                    now,
                )?,
                self.decide_loyalty(
                    sale.customer(),
                    sale.loyalty_points_used(),
                    sale.loyalty_points_earned(),
                    &name,
                    now,
                )?,
                self.decide_document_total(
                    store,
                    day,
                    DocumentKind::Sale,
                    -sale.amount_total(),
                    &name,
                    now,
                )?,
            )
        } else {
            (Vec::new(), None, Vec::new())
        };

        self.commit_sale(sale_id, store, events, stock_events, loyalty, treasury_events)?;
        info!(sale = %sale_id, %name, "sale cancelled");
        Ok(())
    }

    fn commit_sale(
        &mut self,
        sale_id: SaleId,
        store: StoreId,
        events: Vec<SaleEvent>,
        stock_events: Vec<StockEvent>,
        loyalty: Option<LoyaltyChange>,
        treasury_events: Vec<TreasuryEvent>,
    ) -> BackofficeResult<()> {
        let book_id = self.require_book(store)?.id_typed();
        let mut batch = JournalBatch::new();
        self.stage(&mut batch, sale_id, SALE, &events)?;
        self.stage(&mut batch, self.ledger.id_typed(), LEDGER, &stock_events)?;
        if let Some(change) = &loyalty {
            self.stage(&mut batch, change.customer, PARTY, &change.events)?;
        }
        self.stage(&mut batch, book_id, TREASURY_BOOK, &treasury_events)?;

        apply_to(&mut self.sales, &sale_id, &events)?;
        self.ledger.apply_all(&stock_events);
        if let Some(change) = loyalty {
            apply_to(&mut self.parties, &change.customer, &change.events)?;
        }
        apply_to(&mut self.books, &store, &treasury_events)?;
        self.journal.commit(batch);
        Ok(())
    }

    /// Quantities of each sale line held by the sale's other approved or done returns.
    fn already_returned(&self, sale_id: SaleId, except: ReturnId) -> BTreeMap<u32, i64> {
        let mut taken = BTreeMap::new();
        for other in self
            .returns
            .values()
            .filter(|r| r.id_typed() != except && r.sale() == Some(sale_id))
            .filter(|r| r.holds_quantities())
        {
            for (line_no, quantity) in other.returned_quantities() {
                *taken.entry(line_no).or_insert(0) += quantity;
            }
        }
        taken
    }
}

fn sale_place(sale: &Sale) -> Result<(StoreId, NaiveDate), DomainError> {
    match (sale.store(), sale.day()) {
        (Some(store), Some(day)) => Ok((store, day)),
        _ => Err(DomainError::invariant(format!(
            "sale {} has no store or date",
            sale.name()
        ))),
    }
}

impl Backoffice {
    pub fn create_sale(&self, sale: NewSale) -> BackofficeResult<SaleId> {
        self.write(|s| {
            s.require_store(sale.store)?;
            let customer_discount = s.sale_references(sale.customer, sale.employee)?;

            let sale_id = SaleId::generate();
            let name = s.sequences.peek(SequenceCode::Sale);
            s.create(
                |s| &mut s.sales,
                sale_id,
                Sale::empty(sale_id),
                SALE,
                &SaleCommand::CreateSale(CreateSale {
                    sale_id,
                    name: name.clone(),
                    store: sale.store,
                    customer: sale.customer,
                    customer_discount,
                    employee: sale.employee,
                    date: sale.date,
                    discount: sale.discount,
                    loyalty_points_used: sale.loyalty_points_used,
                    notes: sale.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::Sale);
            info!(sale = %sale_id, %name, "sale created");
            Ok(sale_id)
        })
    }

    pub fn update_sale_terms(&self, sale_id: SaleId, terms: SaleTerms) -> BackofficeResult<()> {
        self.write(|s| {
            let customer_discount = s.sale_references(terms.customer, terms.employee)?;
            s.execute(
                |s| &mut s.sales,
                &sale_id,
                SALE,
                &SaleCommand::UpdateTerms(UpdateSaleTerms {
                    sale_id,
                    customer: terms.customer,
                    customer_discount,
                    employee: terms.employee,
                    discount: terms.discount,
                    loyalty_points_used: terms.loyalty_points_used,
                    notes: terms.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Add a line; without `unit_price` the product's list price is used.
    /// Returns the new line number.
    pub fn add_sale_line(
        &self,
        sale_id: SaleId,
        variant: Variant,
        quantity: i64,
        unit_price: Option<Money>,
    ) -> BackofficeResult<u32> {
        self.write(|s| {
            let unit_price = unit_price.unwrap_or(s.require_variant(&variant)?.price());
            let events = s.execute(
                |s| &mut s.sales,
                &sale_id,
                SALE,
                &SaleCommand::AddLine(AddSaleLine {
                    sale_id,
                    variant,
                    quantity,
                    unit_price,
                    occurred_at: Utc::now(),
                }),
            )?;
            events
                .iter()
                .find_map(|e| match e {
                    SaleEvent::LineAdded(added) => Some(added.line_no),
                    _ => None,
                })
                .ok_or_else(|| DomainError::invariant("sale line was not added").into())
        })
    }

    pub fn remove_sale_line(&self, sale_id: SaleId, line_no: u32) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.sales,
                &sale_id,
                SALE,
                &SaleCommand::RemoveLine(RemoveSaleLine {
                    sale_id,
                    line_no,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Confirm a draft sale.
    ///
    /// Fails with `InsufficientStock` when any line exceeds what its store
    /// holds; nothing at all is applied in that case.
    pub fn confirm_sale(&self, sale_id: SaleId) -> BackofficeResult<()> {
        self.write(|s| s.confirm_sale(sale_id))
            .inspect_err(|err| {
                warn!(sale = %sale_id, error = %err, "sale confirmation rejected")
            })
    }

    /// Cancel a sale. Rejected while the sale has a return that is not cancelled.
    pub fn cancel_sale(&self, sale_id: SaleId) -> BackofficeResult<()> {
        self.write(|s| s.cancel_sale(sale_id))
            .inspect_err(|err| {
                warn!(sale = %sale_id, error = %err, "sale cancellation rejected")
            })
    }

    pub fn reset_sale_to_draft(&self, sale_id: SaleId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.sales,
                &sale_id,
                SALE,
                &SaleCommand::ResetToDraft(ResetSaleToDraft {
                    sale_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn sale(&self, sale_id: SaleId) -> BackofficeResult<Option<Sale>> {
        self.read(|s| s.sales.get(&sale_id).cloned())
    }

    pub fn sales(&self) -> BackofficeResult<Vec<Sale>> {
        self.read(|s| s.sales.values().cloned().collect())
    }

    /// Number of returns raised against a sale, whatever their state.
    pub fn return_count(&self, sale_id: SaleId) -> BackofficeResult<usize> {
        self.read(|s| s.returns.values().filter(|r| r.sale() == Some(sale_id)).count())
    }

    pub fn has_returns(&self, sale_id: SaleId) -> BackofficeResult<bool> {
        Ok(self.return_count(sale_id)? > 0)
    }

    /// Open a return against a confirmed sale, one line per sale line.
    pub fn create_return(&self, ret: NewReturn) -> BackofficeResult<ReturnId> {
        self.write(|s| {
            let sold = SoldLines::from_sale(found(&s.sales, &ret.sale, "sale")?)?;

            let return_id = ReturnId::generate();
            let name = s.sequences.peek(SequenceCode::Return);
            s.create(
                |s| &mut s.returns,
                return_id,
                SaleReturn::empty(return_id),
                RETURN,
                &ReturnCommand::CreateReturn(CreateReturn {
                    return_id,
                    name: name.clone(),
                    sold,
                    date: ret.date,
                    return_type: ret.return_type,
                    reason: ret.reason,
                    reason_details: ret.reason_details,
                    notes: ret.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::Return);
            info!(return_id = %return_id, %name, sale = %ret.sale, "return created");
            Ok(return_id)
        })
    }

    pub fn set_return_quantity(
        &self,
        return_id: ReturnId,
        sale_line_no: u32,
        quantity: i64,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.returns,
                &return_id,
                RETURN,
                &ReturnCommand::SetQuantity(SetReturnQuantity {
                    return_id,
                    sale_line_no,
                    quantity,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Replacement goods for an exchange. Returns the new line number.
    pub fn add_exchange_line(
        &self,
        return_id: ReturnId,
        variant: Variant,
        quantity: i64,
        unit_price: Option<Money>,
    ) -> BackofficeResult<u32> {
        self.write(|s| {
            let unit_price = unit_price.unwrap_or(s.require_variant(&variant)?.price());
            let events = s.execute(
                |s| &mut s.returns,
                &return_id,
                RETURN,
                &ReturnCommand::AddExchangeLine(AddExchangeLine {
                    return_id,
                    variant,
                    quantity,
                    unit_price,
                    occurred_at: Utc::now(),
                }),
            )?;
            events
                .iter()
                .find_map(|e| match e {
                    ReturnEvent::ExchangeLineAdded(added) => Some(added.line.line_no),
                    _ => None,
                })
                .ok_or_else(|| DomainError::invariant("exchange line was not added").into())
        })
    }

    pub fn remove_exchange_line(
        &self,
        return_id: ReturnId,
        line_no: u32,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.returns,
                &return_id,
                RETURN,
                &ReturnCommand::RemoveExchangeLine(RemoveExchangeLine {
                    return_id,
                    line_no,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Approve within the return window and within what is still returnable.
    pub fn approve_return(&self, return_id: ReturnId) -> BackofficeResult<()> {
        self.write(|s| {
            let sale_id = found(&s.returns, &return_id, "return")?
                .sale()
                .ok_or_else(|| DomainError::invariant("return without sale"))?;
            let already_returned = s.already_returned(sale_id, return_id);
            let window_days = s.settings.return_window_days;
            s.execute(
                |s| &mut s.returns,
                &return_id,
                RETURN,
                &ReturnCommand::Approve(ApproveReturn {
                    return_id,
                    window_days,
                    already_returned,
                    occurred_at: Utc::now(),
                }),
            )?;
            info!(return_id = %return_id, "return approved");
            Ok(())
        })
        .inspect_err(|err| {
            warn!(return_id = %return_id, error = %err, "return approval rejected")
        })
    }

    /// Returned goods back into stock, exchange goods out, in one batch.
    pub fn complete_return(&self, return_id: ReturnId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute_with_stock(
                |s| &mut s.returns,
                &return_id,
                RETURN,
                &ReturnCommand::Complete(ReturnTransition {
                    return_id,
                    occurred_at: Utc::now(),
                }),
                |ret| (ret.movement_reference(), ret.complete_movements()),
            )?;
            info!(return_id = %return_id, "return completed");
            Ok(())
        })
        .inspect_err(|err| {
            warn!(return_id = %return_id, error = %err, "return completion rejected")
        })
    }

    pub fn cancel_return(&self, return_id: ReturnId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.returns,
                &return_id,
                RETURN,
                &ReturnCommand::Cancel(ReturnTransition {
                    return_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn reset_return_to_draft(&self, return_id: ReturnId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.returns,
                &return_id,
                RETURN,
                &ReturnCommand::ResetToDraft(ReturnTransition {
                    return_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn sale_return(&self, return_id: ReturnId) -> BackofficeResult<Option<SaleReturn>> {
        self.read(|s| s.returns.get(&return_id).cloned())
    }

    pub fn returns_for_sale(&self, sale_id: SaleId) -> BackofficeResult<Vec<SaleReturn>> {
        self.read(|s| {
            s.returns
                .values()
                .filter(|r| r.sale() == Some(sale_id))
                .cloned()
                .collect()
        })
    }
}
