//! Per-store cash treasury: one record per business day, the transactions
//! booked into it, and the sale / purchase totals posted for that day.
//!
//! A day's closing balance is `opening + total_income - total_expense`, where
//! income includes the day's confirmed sales and expense includes the day's
//! confirmed purchases. Transfer transactions are informational only. The
//! opening balance of a new day is the closing balance of the last closed day.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use tailor_events::Event;
use tailor_hr::EmployeeId;

use crate::category::TransactionCategoryId;

typed_id!(
    /// Treasury book identifier (one book per store).
    TreasuryBookId
);

typed_id!(
    /// Treasury transaction identifier.
    TransactionId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Bank,
    Check,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Draft,
    Confirmed,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Payment,
    Expense,
    Closing,
}

/// Document that produced a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionReference {
    pub kind: ReferenceKind,
    pub document: String,
}

impl TransactionReference {
    pub fn new(kind: ReferenceKind, document: impl Into<String>) -> Self {
        Self {
            kind,
            document: document.into(),
        }
    }
}

/// Everything needed to book a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub transaction_id: TransactionId,
    pub name: String,
    pub at: DateTime<Utc>,
    pub kind: TransactionKind,
    pub category: Option<TransactionCategoryId>,
    pub amount: Money,
    pub description: String,
    pub employee: Option<EmployeeId>,
    pub payment_method: PaymentMethod,
    pub reference: Option<TransactionReference>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub name: String,
    pub at: DateTime<Utc>,
    pub kind: TransactionKind,
    pub category: Option<TransactionCategoryId>,
    pub amount: Money,
    pub description: String,
    pub employee: Option<EmployeeId>,
    pub payment_method: PaymentMethod,
    pub reference: Option<TransactionReference>,
    pub status: TransactionStatus,
    pub notes: Option<String>,
}

impl Transaction {
    fn from_draft(draft: &TransactionDraft, status: TransactionStatus) -> Self {
        Self {
            id: draft.transaction_id,
            name: draft.name.clone(),
            at: draft.at,
            kind: draft.kind,
            category: draft.category,
            amount: draft.amount,
            description: draft.description.clone(),
            employee: draft.employee,
            payment_method: draft.payment_method,
            reference: draft.reference.clone(),
            status,
            notes: draft.notes.clone(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == TransactionStatus::Confirmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Sale,
    Purchase,
}

/// Confirmed sale and purchase totals posted for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub sales: Money,
    pub purchases: Money,
}

impl DocumentTotals {
    fn posted(self, kind: DocumentKind, amount: Money) -> Self {
        match kind {
            DocumentKind::Sale => Self {
                sales: self.sales + amount,
                ..self
            },
            DocumentKind::Purchase => Self {
                purchases: self.purchases + amount,
                ..self
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreasuryTotals {
    pub opening_balance: Money,
    pub total_sales: Money,
    pub total_purchases: Money,
    pub total_income: Money,
    pub total_expense: Money,
    pub closing_balance: Money,
}

impl TreasuryTotals {
    pub fn compute(opening: Money, transactions: &[Transaction], docs: DocumentTotals) -> Self {
        let confirmed = |kind: TransactionKind| -> Money {
            transactions
                .iter()
                .filter(|t| t.is_confirmed() && t.kind == kind)
                .map(|t| t.amount)
                .sum()
        };

        let total_income = confirmed(TransactionKind::Income) + docs.sales;
        let total_expense = confirmed(TransactionKind::Expense) + docs.purchases;
        Self {
            opening_balance: opening,
            total_sales: docs.sales,
            total_purchases: docs.purchases,
            total_income,
            total_expense,
            closing_balance: opening + total_income - total_expense,
        }
    }
}

/// Snapshot taken when a day is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closing {
    pub totals: TreasuryTotals,
    pub counted_cash: Option<Money>,
    /// `counted - closing`; zero when no count was taken.
    pub difference: Money,
    pub closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Open,
    Closed,
}

/// One business day of a store's treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryRecord {
    pub name: String,
    pub date: NaiveDate,
    pub employee: Option<EmployeeId>,
    pub opening_balance: Money,
    pub status: RecordStatus,
    pub transactions: Vec<Transaction>,
    pub closing: Option<Closing>,
    pub notes: Option<String>,
}

impl TreasuryRecord {
    pub fn is_open(&self) -> bool {
        self.status == RecordStatus::Open
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Snapshot for closed days, live totals otherwise.
    pub fn totals(&self, docs: DocumentTotals) -> TreasuryTotals {
        match &self.closing {
            Some(closing) => closing.totals,
            None => TreasuryTotals::compute(self.opening_balance, &self.transactions, docs),
        }
    }

    pub fn difference(&self) -> Money {
        self.closing.map(|c| c.difference).unwrap_or(Money::ZERO)
    }
}

/// Aggregate root: TreasuryBook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasuryBook {
    id: TreasuryBookId,
    store: Option<StoreId>,
    records: BTreeMap<NaiveDate, TreasuryRecord>,
    documents: BTreeMap<NaiveDate, DocumentTotals>,
    version: u64,
    created: bool,
}

impl TreasuryBook {
    pub fn empty(id: TreasuryBookId) -> Self {
        Self {
            id,
            store: None,
            records: BTreeMap::new(),
            documents: BTreeMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TreasuryBookId {
        self.id
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn record(&self, date: NaiveDate) -> Option<&TreasuryRecord> {
        self.records.get(&date)
    }

    /// Records in date order.
    pub fn records(&self) -> impl Iterator<Item = &TreasuryRecord> {
        self.records.values()
    }

    pub fn open_record(&self) -> Option<&TreasuryRecord> {
        self.records.values().find(|r| r.is_open())
    }

    pub fn document_totals(&self, date: NaiveDate) -> DocumentTotals {
        self.documents.get(&date).copied().unwrap_or_default()
    }

    pub fn totals(&self, date: NaiveDate) -> Option<TreasuryTotals> {
        self.records
            .get(&date)
            .map(|r| r.totals(self.document_totals(date)))
    }

    /// Closing balance of the most recent closed day, or zero.
    pub fn next_opening_balance(&self) -> Money {
        self.records
            .values()
            .rev()
            .find_map(|r| r.closing.map(|c| c.totals.closing_balance))
            .unwrap_or(Money::ZERO)
    }

    pub fn find_transaction(&self, id: TransactionId) -> Option<(NaiveDate, &Transaction)> {
        self.records
            .values()
            .find_map(|r| r.transaction(id).map(|t| (r.date, t)))
    }

    /// Confirmed transactions dated within `[from, to]`, in date order.
    pub fn confirmed_transactions(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &Transaction> {
        self.records
            .range(from..=to)
            .flat_map(|(_, r)| r.transactions.iter())
            .filter(|t| t.is_confirmed())
    }
}

impl AggregateRoot for TreasuryBook {
    type Id = TreasuryBookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBook {
    pub book_id: TreasuryBookId,
    pub store: StoreId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDay {
    pub book_id: TreasuryBookId,
    pub name: String,
    pub date: NaiveDate,
    pub employee: Option<EmployeeId>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub transaction: TransactionDraft,
    /// Book directly as confirmed (postings from payments and expenses).
    pub confirmed: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTransition {
    pub book_id: TreasuryBookId,
    pub transaction_id: TransactionId,
    /// Set when the payment or expense that posted the transaction drives the change.
    pub by_owner: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Adds (or, with a negative amount, reverses) a confirmed document total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDocumentTotal {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub kind: DocumentKind,
    pub amount: Money,
    pub document: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseDay {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub counted_cash: Option<Money>,
    pub closing_transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenDay {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreasuryCommand {
    OpenBook(OpenBook),
    OpenDay(OpenDay),
    RecordTransaction(RecordTransaction),
    ConfirmTransaction(TransactionTransition),
    CancelTransaction(TransactionTransition),
    ResetTransaction(TransactionTransition),
    PostDocumentTotal(PostDocumentTotal),
    CloseDay(CloseDay),
    ReopenDay(ReopenDay),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookOpened {
    pub book_id: TreasuryBookId,
    pub store: StoreId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOpened {
    pub book_id: TreasuryBookId,
    pub name: String,
    pub date: NaiveDate,
    pub employee: Option<EmployeeId>,
    pub opening_balance: Money,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub transaction: Transaction,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatusChanged {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotalPosted {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub kind: DocumentKind,
    pub amount: Money,
    pub document: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayClosed {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub closing: Closing,
    pub closing_transaction: Transaction,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReopened {
    pub book_id: TreasuryBookId,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreasuryEvent {
    BookOpened(BookOpened),
    DayOpened(DayOpened),
    TransactionRecorded(TransactionRecorded),
    TransactionStatusChanged(TransactionStatusChanged),
    DocumentTotalPosted(DocumentTotalPosted),
    DayClosed(DayClosed),
    DayReopened(DayReopened),
}

impl Event for TreasuryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TreasuryEvent::BookOpened(_) => "treasury.book.opened",
            TreasuryEvent::DayOpened(_) => "treasury.book.day_opened",
            TreasuryEvent::TransactionRecorded(_) => "treasury.book.transaction_recorded",
            TreasuryEvent::TransactionStatusChanged(e) => match e.status {
                TransactionStatus::Draft => "treasury.book.transaction_reset",
                TransactionStatus::Confirmed => "treasury.book.transaction_confirmed",
                TransactionStatus::Cancel => "treasury.book.transaction_cancelled",
            },
            TreasuryEvent::DocumentTotalPosted(_) => "treasury.book.document_posted",
            TreasuryEvent::DayClosed(_) => "treasury.book.day_closed",
            TreasuryEvent::DayReopened(_) => "treasury.book.day_reopened",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TreasuryEvent::BookOpened(e) => e.occurred_at,
            TreasuryEvent::DayOpened(e) => e.occurred_at,
            TreasuryEvent::TransactionRecorded(e) => e.occurred_at,
            TreasuryEvent::TransactionStatusChanged(e) => e.occurred_at,
            TreasuryEvent::DocumentTotalPosted(e) => e.occurred_at,
            TreasuryEvent::DayClosed(e) => e.occurred_at,
            TreasuryEvent::DayReopened(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TreasuryBook {
    type Command = TreasuryCommand;
    type Event = TreasuryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TreasuryEvent::BookOpened(e) => {
                self.id = e.book_id;
                self.store = Some(e.store);
                self.created = true;
            }
            TreasuryEvent::DayOpened(e) => {
                self.records.insert(
                    e.date,
                    TreasuryRecord {
                        name: e.name.clone(),
                        date: e.date,
                        employee: e.employee,
                        opening_balance: e.opening_balance,
                        status: RecordStatus::Open,
                        transactions: Vec::new(),
                        closing: None,
                        notes: e.notes.clone(),
                    },
                );
            }
            TreasuryEvent::TransactionRecorded(e) => {
                if let Some(record) = self.records.get_mut(&e.date) {
                    record.transactions.push(e.transaction.clone());
                }
            }
            TreasuryEvent::TransactionStatusChanged(e) => {
                if let Some(tx) = self
                    .records
                    .get_mut(&e.date)
                    .and_then(|r| r.transactions.iter_mut().find(|t| t.id == e.transaction_id))
                {
                    tx.status = e.status;
                }
            }
            TreasuryEvent::DocumentTotalPosted(e) => {
                let totals = self.document_totals(e.date).posted(e.kind, e.amount);
                self.documents.insert(e.date, totals);
            }
            TreasuryEvent::DayClosed(e) => {
                if let Some(record) = self.records.get_mut(&e.date) {
                    record.status = RecordStatus::Closed;
                    record.closing = Some(e.closing);
                    record.transactions.push(e.closing_transaction.clone());
                }
            }
            TreasuryEvent::DayReopened(e) => {
                if let Some(record) = self.records.get_mut(&e.date) {
                    record.status = RecordStatus::Open;
                    record.closing = None;
                    for tx in record.transactions.iter_mut().filter(|t| {
                        t.is_confirmed()
                            && t.reference.as_ref().map(|r| r.kind) == Some(ReferenceKind::Closing)
                    }) {
                        tx.status = TransactionStatus::Cancel;
                    }
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TreasuryCommand::OpenBook(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("treasury book already exists"));
                }
                Ok(vec![TreasuryEvent::BookOpened(BookOpened {
                    book_id: cmd.book_id,
                    store: cmd.store,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TreasuryCommand::OpenDay(cmd) => self.handle_open_day(cmd),
            TreasuryCommand::RecordTransaction(cmd) => self.handle_record(cmd),
            TreasuryCommand::ConfirmTransaction(cmd) => {
                self.handle_transition(cmd, TransactionStatus::Confirmed)
            }
            TreasuryCommand::CancelTransaction(cmd) => {
                self.handle_transition(cmd, TransactionStatus::Cancel)
            }
            TreasuryCommand::ResetTransaction(cmd) => {
                self.handle_transition(cmd, TransactionStatus::Draft)
            }
            TreasuryCommand::PostDocumentTotal(cmd) => self.handle_post(cmd),
            TreasuryCommand::CloseDay(cmd) => self.handle_close(cmd),
            TreasuryCommand::ReopenDay(cmd) => self.handle_reopen(cmd),
        }
    }
}

impl TreasuryBook {
    fn ensure_created(&self, book_id: TreasuryBookId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("treasury book {book_id}")));
        }
        if self.id != book_id {
            return Err(DomainError::invariant("book_id mismatch"));
        }
        Ok(())
    }

    fn existing_record(&self, date: NaiveDate) -> Result<&TreasuryRecord, DomainError> {
        self.records
            .get(&date)
            .ok_or_else(|| DomainError::missing(format!("treasury day {date}")))
    }

    fn open_record_for(&self, date: NaiveDate) -> Result<&TreasuryRecord, DomainError> {
        let record = self.existing_record(date)?;
        if !record.is_open() {
            return Err(DomainError::transition(format!(
                "treasury day {date} is closed"
            )));
        }
        Ok(record)
    }

    fn handle_open_day(&self, cmd: &OpenDay) -> Result<Vec<TreasuryEvent>, DomainError> {
        self.ensure_created(cmd.book_id)?;

        if self.records.contains_key(&cmd.date) {
            return Err(DomainError::conflict(format!(
                "a treasury day already exists for {}",
                cmd.date
            )));
        }
        if let Some(open) = self.open_record() {
            return Err(DomainError::invariant(format!(
                "treasury day {} is still open",
                open.date
            )));
        }
        if let Some(latest) = self.records.keys().next_back() {
            if cmd.date < *latest {
                return Err(DomainError::validation(format!(
                    "a new treasury day must be later than {latest}"
                )));
            }
        }

        Ok(vec![TreasuryEvent::DayOpened(DayOpened {
            book_id: cmd.book_id,
            name: cmd.name.clone(),
            date: cmd.date,
            employee: cmd.employee,
            opening_balance: self.next_opening_balance(),
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<TreasuryEvent>, DomainError> {
        self.ensure_created(cmd.book_id)?;
        self.open_record_for(cmd.date)?;

        let draft = &cmd.transaction;
        if !draft.amount.is_positive() {
            return Err(DomainError::validation("transaction amount must be positive"));
        }
        if draft.description.trim().is_empty() {
            return Err(DomainError::validation("transaction description is required"));
        }
        if self.find_transaction(draft.transaction_id).is_some() {
            return Err(DomainError::conflict(format!(
                "transaction {} already exists",
                draft.transaction_id
            )));
        }

        let status = if cmd.confirmed {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Draft
        };

        Ok(vec![TreasuryEvent::TransactionRecorded(TransactionRecorded {
            book_id: cmd.book_id,
            date: cmd.date,
            transaction: Transaction::from_draft(draft, status),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(
        &self,
        cmd: &TransactionTransition,
        to: TransactionStatus,
    ) -> Result<Vec<TreasuryEvent>, DomainError> {
        self.ensure_created(cmd.book_id)?;

        let (date, tx) = self
            .find_transaction(cmd.transaction_id)
            .ok_or_else(|| DomainError::missing(format!("transaction {}", cmd.transaction_id)))?;
        self.open_record_for(date)?;
        if let Some(reference) = tx.reference.as_ref().filter(|_| !cmd.by_owner) {
            return Err(DomainError::transition(format!(
                "transaction {} belongs to {} and only changes with it",
                tx.name, reference.document
            )));
        }

        let allowed = match to {
            TransactionStatus::Confirmed => tx.status == TransactionStatus::Draft,
            TransactionStatus::Cancel => tx.status != TransactionStatus::Cancel,
            TransactionStatus::Draft => tx.status == TransactionStatus::Cancel,
        };
        if !allowed {
            return Err(DomainError::transition(format!(
                "transaction {} cannot go from {:?} to {:?}",
                tx.name, tx.status, to
            )));
        }

        Ok(vec![TreasuryEvent::TransactionStatusChanged(
            TransactionStatusChanged {
                book_id: cmd.book_id,
                date,
                transaction_id: cmd.transaction_id,
                status: to,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_post(&self, cmd: &PostDocumentTotal) -> Result<Vec<TreasuryEvent>, DomainError> {
        self.ensure_created(cmd.book_id)?;

        if cmd.amount.is_zero() {
            return Ok(vec![]);
        }
        if self.records.get(&cmd.date).is_some_and(|r| !r.is_open()) {
            return Err(DomainError::transition(format!(
                "treasury day {} is closed; {} cannot be posted",
                cmd.date, cmd.document
            )));
        }

        let after = self.document_totals(cmd.date).posted(cmd.kind, cmd.amount);
        if after.sales.is_negative() || after.purchases.is_negative() {
            return Err(DomainError::invariant(format!(
                "reversing {} would leave negative document totals for {}",
                cmd.document, cmd.date
            )));
        }

        Ok(vec![TreasuryEvent::DocumentTotalPosted(DocumentTotalPosted {
            book_id: cmd.book_id,
            date: cmd.date,
            kind: cmd.kind,
            amount: cmd.amount,
            document: cmd.document.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseDay) -> Result<Vec<TreasuryEvent>, DomainError> {
        self.ensure_created(cmd.book_id)?;
        let record = self.open_record_for(cmd.date)?;

        if cmd.counted_cash.is_some_and(|c| c.is_negative()) {
            return Err(DomainError::validation("counted cash cannot be negative"));
        }
        if self.find_transaction(cmd.closing_transaction_id).is_some() {
            return Err(DomainError::conflict("closing transaction id already used"));
        }

        let totals = record.totals(self.document_totals(cmd.date));
        let difference = cmd
            .counted_cash
            .map(|counted| counted - totals.closing_balance)
            .unwrap_or(Money::ZERO);

        let closing_transaction = Transaction {
            id: cmd.closing_transaction_id,
            name: format!("{}/CLOSE", record.name),
            at: cmd.occurred_at,
            kind: TransactionKind::Transfer,
            category: None,
            amount: totals.closing_balance,
            description: format!("closing of {}", record.name),
            employee: record.employee,
            payment_method: PaymentMethod::Cash,
            reference: Some(TransactionReference::new(
                ReferenceKind::Closing,
                record.name.clone(),
            )),
            status: TransactionStatus::Confirmed,
            notes: None,
        };

        Ok(vec![TreasuryEvent::DayClosed(DayClosed {
            book_id: cmd.book_id,
            date: cmd.date,
            closing: Closing {
                totals,
                counted_cash: cmd.counted_cash,
                difference,
                closed_at: cmd.occurred_at,
            },
            closing_transaction,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reopen(&self, cmd: &ReopenDay) -> Result<Vec<TreasuryEvent>, DomainError> {
        self.ensure_created(cmd.book_id)?;
        let record = self.existing_record(cmd.date)?;

        if record.is_open() {
            return Err(DomainError::transition(format!(
                "treasury day {} is already open",
                cmd.date
            )));
        }
        if let Some(newer) = self.records.keys().find(|d| **d > cmd.date) {
            return Err(DomainError::invariant(format!(
                "treasury day {} cannot be reopened: {newer} is newer",
                cmd.date
            )));
        }

        Ok(vec![TreasuryEvent::DayReopened(DayReopened {
            book_id: cmd.book_id,
            date: cmd.date,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn run(book: &mut TreasuryBook, cmd: TreasuryCommand) -> Result<(), DomainError> {
        let events = book.handle(&cmd)?;
        book.apply_all(&events);
        Ok(())
    }

    fn book() -> TreasuryBook {
        let id = TreasuryBookId::generate();
        let mut book = TreasuryBook::empty(id);
        run(
            &mut book,
            TreasuryCommand::OpenBook(OpenBook {
                book_id: id,
                store: StoreId::generate(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        book
    }

    fn open(book: &mut TreasuryBook, date: NaiveDate) -> Result<(), DomainError> {
        let id = book.id_typed();
        run(
            book,
            TreasuryCommand::OpenDay(OpenDay {
                book_id: id,
                name: format!("TRS/{date}"),
                date,
                employee: None,
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn record(
        book: &mut TreasuryBook,
        date: NaiveDate,
        kind: TransactionKind,
        amount: i64,
        confirmed: bool,
    ) -> Result<TransactionId, DomainError> {
        let id = book.id_typed();
        let transaction_id = TransactionId::generate();
        run(
            book,
            TreasuryCommand::RecordTransaction(RecordTransaction {
                book_id: id,
                date,
                transaction: TransactionDraft {
                    transaction_id,
                    name: "TRX".into(),
                    at: Utc::now(),
                    kind,
                    category: None,
                    amount: Money::from_minor(amount),
                    description: "counter".into(),
                    employee: None,
                    payment_method: PaymentMethod::Cash,
                    reference: None,
                    notes: None,
                },
                confirmed,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(transaction_id)
    }

    fn post(
        book: &mut TreasuryBook,
        date: NaiveDate,
        kind: DocumentKind,
        amount: i64,
    ) -> Result<(), DomainError> {
        let id = book.id_typed();
        run(
            book,
            TreasuryCommand::PostDocumentTotal(PostDocumentTotal {
                book_id: id,
                date,
                kind,
                amount: Money::from_minor(amount),
                document: "SALE/00001".into(),
                occurred_at: Utc::now(),
            }),
        )
    }

    fn close(
        book: &mut TreasuryBook,
        date: NaiveDate,
        counted: Option<i64>,
    ) -> Result<(), DomainError> {
        let id = book.id_typed();
        run(
            book,
            TreasuryCommand::CloseDay(CloseDay {
                book_id: id,
                date,
                counted_cash: counted.map(Money::from_minor),
                closing_transaction_id: TransactionId::generate(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn opening_balance_rolls_over_from_last_closed_day() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        record(&mut book, day(1), TransactionKind::Income, 5_000, true).unwrap();
        record(&mut book, day(1), TransactionKind::Expense, 1_200, true).unwrap();
        post(&mut book, day(1), DocumentKind::Sale, 10_000).unwrap();
        post(&mut book, day(1), DocumentKind::Purchase, 3_000).unwrap();
        close(&mut book, day(1), None).unwrap();

        let closed = book.totals(day(1)).unwrap();
        assert_eq!(closed.total_income, Money::from_minor(15_000));
        assert_eq!(closed.total_expense, Money::from_minor(4_200));
        assert_eq!(closed.closing_balance, Money::from_minor(10_800));

        open(&mut book, day(2)).unwrap();
        assert_eq!(
            book.record(day(2)).unwrap().opening_balance,
            Money::from_minor(10_800)
        );
    }

    #[test]
    fn first_day_opens_at_zero() {
        let mut book = book();
        open(&mut book, day(3)).unwrap();
        assert_eq!(book.record(day(3)).unwrap().opening_balance, Money::ZERO);
    }

    #[test]
    fn only_one_day_open_at_a_time() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        let err = open(&mut book, day(2)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn duplicate_day_is_a_conflict() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        close(&mut book, day(1), None).unwrap();
        let err = open(&mut book, day(1)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn closed_day_rejects_postings_and_transactions() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        close(&mut book, day(1), None).unwrap();

        let err = post(&mut book, day(1), DocumentKind::Sale, 100).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        let err = record(&mut book, day(1), TransactionKind::Income, 100, true).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn reopen_is_refused_when_a_newer_day_exists() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        close(&mut book, day(1), None).unwrap();
        open(&mut book, day(2)).unwrap();

        let id = book.id_typed();
        let err = book
            .handle(&TreasuryCommand::ReopenDay(ReopenDay {
                book_id: id,
                date: day(1),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn reopen_voids_the_closing_transfer() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        post(&mut book, day(1), DocumentKind::Sale, 700).unwrap();
        close(&mut book, day(1), None).unwrap();

        let id = book.id_typed();
        run(
            &mut book,
            TreasuryCommand::ReopenDay(ReopenDay {
                book_id: id,
                date: day(1),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let record = book.record(day(1)).unwrap();
        assert!(record.is_open());
        assert!(record.closing.is_none());
        assert!(
            record
                .transactions
                .iter()
                .all(|t| t.kind != TransactionKind::Transfer || !t.is_confirmed())
        );
    }

    #[test]
    fn posted_transactions_only_change_through_their_owner() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        let id = book.id_typed();
        let transaction_id = TransactionId::generate();
        run(
            &mut book,
            TreasuryCommand::RecordTransaction(RecordTransaction {
                book_id: id,
                date: day(1),
                transaction: TransactionDraft {
                    transaction_id,
                    name: "TRX".into(),
                    at: Utc::now(),
                    kind: TransactionKind::Income,
                    category: None,
                    amount: Money::from_minor(4_000),
                    description: "customer payment".into(),
                    employee: None,
                    payment_method: PaymentMethod::Cash,
                    reference: Some(TransactionReference::new(ReferenceKind::Payment, "PAY/00001")),
                    notes: None,
                },
                confirmed: true,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let cancel = |by_owner| {
            TreasuryCommand::CancelTransaction(TransactionTransition {
                book_id: id,
                transaction_id,
                by_owner,
                occurred_at: Utc::now(),
            })
        };
        let err = book.handle(&cancel(false)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(book.totals(day(1)).unwrap().total_income, Money::from_minor(4_000));

        run(&mut book, cancel(true)).unwrap();
        assert_eq!(book.totals(day(1)).unwrap().total_income, Money::ZERO);
    }

    #[test]
    fn counted_cash_yields_difference() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        post(&mut book, day(1), DocumentKind::Sale, 10_000).unwrap();
        close(&mut book, day(1), Some(9_500)).unwrap();
        assert_eq!(book.record(day(1)).unwrap().difference(), Money::from_minor(-500));
    }

    #[test]
    fn draft_transactions_do_not_count_until_confirmed() {
        let mut book = book();
        open(&mut book, day(1)).unwrap();
        let tx = record(&mut book, day(1), TransactionKind::Income, 400, false).unwrap();
        assert_eq!(book.totals(day(1)).unwrap().total_income, Money::ZERO);

        let id = book.id_typed();
        run(
            &mut book,
            TreasuryCommand::ConfirmTransaction(TransactionTransition {
                book_id: id,
                transaction_id: tx,
                by_owner: false,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(book.totals(day(1)).unwrap().total_income, Money::from_minor(400));
    }

    #[test]
    fn reversal_cannot_go_below_zero() {
        let mut book = book();
        post(&mut book, day(1), DocumentKind::Sale, 100).unwrap();
        let err = post(&mut book, day(1), DocumentKind::Sale, -200).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        post(&mut book, day(1), DocumentKind::Sale, -100).unwrap();
        assert_eq!(book.document_totals(day(1)).sales, Money::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any mix of transactions and postings, the closing
        /// balance is opening + income - expense.
        #[test]
        fn closing_balance_formula_holds(
            first_day in prop::collection::vec((0u8..3, 1i64..50_000, any::<bool>()), 0..12),
            second_day in prop::collection::vec((0u8..3, 1i64..50_000, any::<bool>()), 0..12),
            sales in 0i64..500_000,
            purchases in 0i64..500_000,
        ) {
            let mut book = book();
            let mut previous_closing = Money::ZERO;

            for (date, txs) in [(day(1), &first_day), (day(2), &second_day)] {
                open(&mut book, date).unwrap();
                prop_assert_eq!(book.record(date).unwrap().opening_balance, previous_closing);

                let mut income = Money::from_minor(sales);
                let mut expense = Money::from_minor(purchases);
                for (kind, amount, confirmed) in txs.iter() {
                    let kind = match kind {
                        0 => TransactionKind::Income,
                        1 => TransactionKind::Expense,
                        _ => TransactionKind::Transfer,
                    };
                    record(&mut book, date, kind, *amount, *confirmed).unwrap();
                    if *confirmed {
                        match kind {
                            TransactionKind::Income => income += Money::from_minor(*amount),
                            TransactionKind::Expense => expense += Money::from_minor(*amount),
                            TransactionKind::Transfer => {}
                        }
                    }
                }
                post(&mut book, date, DocumentKind::Sale, sales).unwrap();
                post(&mut book, date, DocumentKind::Purchase, purchases).unwrap();
                close(&mut book, date, None).unwrap();

                let totals = book.totals(date).unwrap();
                prop_assert_eq!(totals.total_income, income);
                prop_assert_eq!(totals.total_expense, expense);
                prop_assert_eq!(
                    totals.closing_balance,
                    totals.opening_balance + totals.total_income - totals.total_expense
                );
                previous_closing = totals.closing_balance;
            }
        }
    }
}
