//! The back-office engine: cross-document orchestration behind one lock.
//!
//! Every write follows the same pipeline:
//!
//! ```text
//! operation
//!   ↓
//! 1. Lock the state (single writer)
//!   ↓
//! 2. Decide: `handle` on every affected aggregate (pure, no mutation)
//!   ↓
//! 3. Stage: serialize every decided event into a journal batch
//!   ↓
//! 4. Apply: `apply_all` on each aggregate, then commit the batch
//! ```
//!
//! Steps 2 and 3 can fail; step 4 cannot. A failing operation therefore leaves
//! stock, loyalty balances, treasury books and the journal exactly as they
//! were. Validation and mutation share one critical section, so two
//! concurrent sales can never both take the last unit.
//!
//! Notifications are the only effect dispatched outside the lock.

mod catalog;
mod hr;
mod parties;
mod purchasing;
mod sales;
mod stock;
mod treasury;

use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use tailor_catalog::{Color, ColorId, Product, ProductId, Size, SizeId, Store, StoreId};
use tailor_core::{Aggregate, AggregateId, DomainError, DomainResult, Money};
use tailor_events::Event;
use tailor_hr::{Attendance, AttendanceId, Employee, EmployeeId};
use tailor_parties::{Party, PartyId, PartyKind};
use tailor_purchasing::{Purchase, PurchaseId};
use tailor_sales::{ReturnId, Sale, SaleId, SaleReturn};
use tailor_stock::{
    ApplyMovements, CountId, InventoryCount, LedgerId, MovementReference, SetDefaultMinQuantity,
    StockAlertRules, StockCommand, StockEvent, StockLedger, StockMovement, Transfer, TransferId,
    Variant,
};
use tailor_treasury::{
    DocumentKind, Expense, ExpenseCategory, ExpenseCategoryId, ExpenseId, Payment, PaymentId,
    PostDocumentTotal, TransactionCategory, TransactionCategoryId, TreasuryBook, TreasuryCommand,
    TreasuryEvent,
};

use crate::config::{BackofficeConfig, Settings};
use crate::error::{BackofficeError, BackofficeResult};
use crate::journal::{Journal, JournalBatch, JournalEntry};
use crate::notify::Notifier;
use crate::repository::{InMemoryRepository, Repository};
use crate::sequence::SequenceService;

pub use catalog::NewProduct;
pub use hr::{EmployeeUpdate, NewEmployee};
pub use parties::{NewCustomer, NewSupplier, PartyUpdate};
pub use purchasing::NewPurchase;
pub use sales::{NewReturn, NewSale, SaleTerms};
pub use stock::NewTransfer;
pub use treasury::{NewExpense, NewPayment, NewTransaction};

pub(crate) const PRODUCT: &str = "catalog.product";
pub(crate) const LEDGER: &str = "stock.ledger";
pub(crate) const TRANSFER: &str = "stock.transfer";
pub(crate) const COUNT: &str = "stock.count";
pub(crate) const PARTY: &str = "parties.party";
pub(crate) const SALE: &str = "sales.sale";
pub(crate) const RETURN: &str = "sales.return";
pub(crate) const PURCHASE: &str = "purchasing.purchase";
pub(crate) const TREASURY_BOOK: &str = "treasury.book";
pub(crate) const PAYMENT: &str = "treasury.payment";
pub(crate) const EXPENSE: &str = "treasury.expense";
pub(crate) const EMPLOYEE: &str = "hr.employee";
pub(crate) const ATTENDANCE: &str = "hr.attendance";

/// Everything the back office knows, guarded by the engine lock.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) settings: Settings,
    pub(crate) sequences: SequenceService,
    pub(crate) journal: Journal,

    pub(crate) stores: InMemoryRepository<StoreId, Store>,
    pub(crate) sizes: InMemoryRepository<SizeId, Size>,
    pub(crate) colors: InMemoryRepository<ColorId, Color>,
    pub(crate) products: InMemoryRepository<ProductId, Product>,

    pub(crate) ledger: StockLedger,
    pub(crate) alert_rules: StockAlertRules,
    pub(crate) transfers: InMemoryRepository<TransferId, Transfer>,
    pub(crate) counts: InMemoryRepository<CountId, InventoryCount>,

    pub(crate) parties: InMemoryRepository<PartyId, Party>,
    pub(crate) sales: InMemoryRepository<SaleId, Sale>,
    pub(crate) returns: InMemoryRepository<ReturnId, SaleReturn>,
    pub(crate) purchases: InMemoryRepository<PurchaseId, Purchase>,

    /// One book per store, opened with the store.
    pub(crate) books: InMemoryRepository<StoreId, TreasuryBook>,
    pub(crate) transaction_categories:
        InMemoryRepository<TransactionCategoryId, TransactionCategory>,
    pub(crate) expense_categories: InMemoryRepository<ExpenseCategoryId, ExpenseCategory>,
    pub(crate) payments: InMemoryRepository<PaymentId, Payment>,
    pub(crate) expenses: InMemoryRepository<ExpenseId, Expense>,

    pub(crate) employees: InMemoryRepository<EmployeeId, Employee>,
    pub(crate) attendances: InMemoryRepository<AttendanceId, Attendance>,
}

impl State {
    fn new(settings: Settings) -> Self {
        Self {
            ledger: StockLedger::new(LedgerId::generate(), settings.default_min_quantity),
            settings,
            sequences: SequenceService::new(),
            journal: Journal::new(),
            stores: InMemoryRepository::new(),
            sizes: InMemoryRepository::new(),
            colors: InMemoryRepository::new(),
            products: InMemoryRepository::new(),
            alert_rules: StockAlertRules::new(),
            transfers: InMemoryRepository::new(),
            counts: InMemoryRepository::new(),
            parties: InMemoryRepository::new(),
            sales: InMemoryRepository::new(),
            returns: InMemoryRepository::new(),
            purchases: InMemoryRepository::new(),
            books: InMemoryRepository::new(),
            transaction_categories: InMemoryRepository::new(),
            expense_categories: InMemoryRepository::new(),
            payments: InMemoryRepository::new(),
            expenses: InMemoryRepository::new(),
            employees: InMemoryRepository::new(),
            attendances: InMemoryRepository::new(),
        }
    }

    fn require_store(&self, id: StoreId) -> DomainResult<&Store> {
        found(&self.stores, &id, "store")
    }

    fn require_book(&self, store: StoreId) -> DomainResult<&TreasuryBook> {
        found(&self.books, &store, "treasury book for store")
    }

    /// Product must exist and be tradable; size and color must exist.
    fn require_variant(&self, variant: &Variant) -> DomainResult<&Product> {
        let product = found(&self.products, &variant.product, "product")?;
        if !product.can_be_traded() {
            return Err(DomainError::invariant(format!(
                "product {} is archived",
                product.name()
            )));
        }
        found(&self.sizes, &variant.size, "size")?;
        found(&self.colors, &variant.color, "color")?;
        Ok(product)
    }

    fn require_party(&self, id: PartyId, kind: PartyKind) -> DomainResult<&Party> {
        let party = found(&self.parties, &id, "party")?;
        if party.kind() != kind {
            return Err(DomainError::validation(format!(
                "{} is not a {}",
                party.name(),
                match kind {
                    PartyKind::Customer => "customer",
                    PartyKind::Supplier => "supplier",
                }
            )));
        }
        if !party.can_transact() {
            return Err(DomainError::invariant(format!(
                "{} is suspended",
                party.name()
            )));
        }
        Ok(party)
    }

    fn require_employee(&self, id: EmployeeId) -> DomainResult<&Employee> {
        found(&self.employees, &id, "employee")
    }

    /// Decide a stock batch. An empty batch decides nothing.
    fn decide_movements(
        &self,
        reference: MovementReference,
        movements: Vec<StockMovement>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<StockEvent>> {
        if movements.is_empty() {
            return Ok(vec![]);
        }
        self.ledger
            .handle(&StockCommand::ApplyMovements(ApplyMovements {
                ledger_id: self.ledger.id_typed(),
                reference,
                movements,
                occurred_at,
            }))
    }

    /// Decide a same-day document posting into the store's treasury book.
    fn decide_document_total(
        &self,
        store: StoreId,
        date: NaiveDate,
        kind: DocumentKind,
        amount: Money,
        document: &str,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<TreasuryEvent>> {
        let book = self.require_book(store)?;
        book.handle(&TreasuryCommand::PostDocumentTotal(PostDocumentTotal {
            book_id: book.id_typed(),
            date,
            kind,
            amount,
            document: document.to_string(),
            occurred_at,
        }))
    }

    /// Decide, stage and apply one command on a stored aggregate.
    fn execute<K, A>(
        &mut self,
        repo: fn(&mut State) -> &mut InMemoryRepository<K, A>,
        key: &K,
        aggregate_type: &str,
        command: &A::Command,
    ) -> BackofficeResult<Vec<A::Event>>
    where
        K: Ord + Display,
        A: Aggregate<Error = DomainError>,
        A::Id: Into<AggregateId>,
        A::Event: Event + Serialize,
    {
        let (aggregate_id, events) = {
            let aggregate = found(repo(self), key, aggregate_type)?;
            let aggregate_id: AggregateId = aggregate.id().clone().into();
            (aggregate_id, aggregate.handle(command)?)
        };
        let mut batch = JournalBatch::new();
        self.stage(&mut batch, aggregate_id, aggregate_type, &events)?;

        apply_to(repo(self), key, &events)?;
        self.journal.commit(batch);
        Ok(events)
    }

    /// Like [`State::execute`], plus the stock batch the transition implies.
    ///
    /// `movements` sees the document as it was before the transition.
    fn execute_with_stock<K, A>(
        &mut self,
        repo: fn(&mut State) -> &mut InMemoryRepository<K, A>,
        key: &K,
        aggregate_type: &str,
        command: &A::Command,
        movements: impl FnOnce(&A) -> (MovementReference, Vec<StockMovement>),
    ) -> BackofficeResult<Vec<A::Event>>
    where
        K: Ord + Display,
        A: Aggregate<Error = DomainError>,
        A::Id: Into<AggregateId>,
        A::Event: Event + Serialize,
    {
        let (aggregate_id, events, reference, movements) = {
            let aggregate = found(repo(self), key, aggregate_type)?;
            let events = aggregate.handle(command)?;
            let (reference, movements) = movements(aggregate);
            let aggregate_id: AggregateId = aggregate.id().clone().into();
            (aggregate_id, events, reference, movements)
        };
        let stock_events = self.decide_movements(reference, movements, Utc::now())?;

        let mut batch = JournalBatch::new();
        self.stage(&mut batch, aggregate_id, aggregate_type, &events)?;
        self.stage(&mut batch, self.ledger.id_typed(), LEDGER, &stock_events)?;

        apply_to(repo(self), key, &events)?;
        self.ledger.apply_all(&stock_events);
        self.journal.commit(batch);
        Ok(events)
    }

    /// Decide, stage and apply the creating command of a new aggregate.
    fn create<K, A>(
        &mut self,
        repo: fn(&mut State) -> &mut InMemoryRepository<K, A>,
        key: K,
        mut aggregate: A,
        aggregate_type: &str,
        command: &A::Command,
    ) -> BackofficeResult<Vec<A::Event>>
    where
        K: Ord,
        A: Aggregate<Error = DomainError>,
        A::Id: Into<AggregateId>,
        A::Event: Event + Serialize,
    {
        let events = aggregate.handle(command)?;
        let mut batch = JournalBatch::new();
        self.stage(&mut batch, aggregate.id().clone(), aggregate_type, &events)?;

        aggregate.apply_all(&events);
        repo(self).upsert(key, aggregate);
        self.journal.commit(batch);
        Ok(events)
    }

    fn stage<E>(
        &self,
        batch: &mut JournalBatch,
        aggregate_id: impl Into<AggregateId>,
        aggregate_type: &str,
        events: &[E],
    ) -> BackofficeResult<()>
    where
        E: Event + Serialize,
    {
        batch.record(&self.journal, aggregate_id.into(), aggregate_type, events)?;
        Ok(())
    }
}

pub(crate) fn found<'a, K, V>(
    repo: &'a InMemoryRepository<K, V>,
    key: &K,
    what: &str,
) -> DomainResult<&'a V>
where
    K: Ord + Display,
{
    repo.get(key)
        .ok_or_else(|| DomainError::missing(format!("{what} {key}")))
}

/// Apply already-decided events to a stored aggregate.
pub(crate) fn apply_to<K, A>(
    repo: &mut InMemoryRepository<K, A>,
    key: &K,
    events: &[A::Event],
) -> DomainResult<()>
where
    K: Ord + Display,
    A: Aggregate,
{
    let aggregate = repo
        .get_mut(key)
        .ok_or_else(|| DomainError::missing(format!("record {key}")))?;
    aggregate.apply_all(events);
    Ok(())
}

/// Multi-branch retail back office.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct Backoffice {
    state: Mutex<State>,
    notifier: Arc<dyn Notifier>,
    alert_address: String,
}

impl std::fmt::Debug for Backoffice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoffice")
            .field("alert_address", &self.alert_address)
            .finish_non_exhaustive()
    }
}

impl Backoffice {
    pub fn new(config: &BackofficeConfig, notifier: Arc<dyn Notifier>) -> BackofficeResult<Self> {
        let settings = config.settings();
        settings.validate()?;
        info!(
            currency = %settings.currency,
            return_window_days = settings.return_window_days,
            default_min_quantity = settings.default_min_quantity,
            "back office started"
        );
        Ok(Self {
            state: Mutex::new(State::new(settings)),
            notifier,
            alert_address: config.alert_address.clone(),
        })
    }

    fn lock(&self) -> BackofficeResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| BackofficeError::LockPoisoned)
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&State) -> T) -> BackofficeResult<T> {
        let state = self.lock()?;
        Ok(f(&state))
    }

    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&mut State) -> BackofficeResult<T>,
    ) -> BackofficeResult<T> {
        let mut state = self.lock()?;
        f(&mut state)
    }

    pub fn settings(&self) -> BackofficeResult<Settings> {
        self.read(|s| s.settings.clone())
    }

    /// Replace the business settings. A new default minimum applies to stock
    /// records created from now on.
    pub fn update_settings(&self, settings: Settings) -> BackofficeResult<()> {
        settings.validate()?;
        self.write(|s| {
            let events = s
                .ledger
                .handle(&StockCommand::SetDefaultMinQuantity(SetDefaultMinQuantity {
                    ledger_id: s.ledger.id_typed(),
                    min_quantity: settings.default_min_quantity,
                    occurred_at: Utc::now(),
                }))?;
            let mut batch = JournalBatch::new();
            s.stage(&mut batch, s.ledger.id_typed(), LEDGER, &events)?;

            s.ledger.apply_all(&events);
            s.journal.commit(batch);
            info!(
                return_window_days = settings.return_window_days,
                default_min_quantity = settings.default_min_quantity,
                currency = %settings.currency,
                "settings updated"
            );
            s.settings = settings;
            Ok(())
        })
    }

    /// Audit trail of one aggregate (sale, party, treasury book, ...).
    pub fn history(
        &self,
        aggregate_id: impl Into<AggregateId>,
    ) -> BackofficeResult<Vec<JournalEntry>> {
        let id = aggregate_id.into();
        self.read(|s| s.journal.stream(id).into_iter().cloned().collect())
    }

    /// Every journaled event, in commit order.
    pub fn journal(&self) -> BackofficeResult<Vec<JournalEntry>> {
        self.read(|s| s.journal.iter().cloned().collect())
    }

    pub fn ledger_id(&self) -> BackofficeResult<LedgerId> {
        self.read(|s| s.ledger.id_typed())
    }
}
