use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateId, DomainError, Entity, Money};
use tailor_events::Event;
use tailor_hr::EmployeeId;
use tailor_parties::{PartyId, PartyKind};
use tailor_treasury::{
    CategoryKind, CloseDay, ConfirmPayment, CreateExpense, CreatePayment, Expense,
    ExpenseCategory, ExpenseCategoryId, ExpenseCommand, ExpenseId, ExpenseTransition,
    ExpenseType, OpenDay, PayExpense, Payment, PaymentCommand, PaymentId, PaymentMethod,
    PaymentTransition, PaymentType, RecordTransaction, ReferenceKind, ReopenDay,
    TransactionCategory, TransactionCategoryId, TransactionDraft, TransactionId,
    TransactionKind, TransactionReference, TransactionTransition, TreasuryBook,
    TreasuryCommand, TreasuryDay, TreasuryEvent, TreasuryRecord, TreasuryTotals,
};

use super::{Backoffice, EXPENSE, PAYMENT, State, TREASURY_BOOK, apply_to, found};
use crate::error::BackofficeResult;
use crate::journal::JournalBatch;
use crate::repository::{InMemoryRepository, Repository};
use crate::sequence::SequenceCode;

/// A manual cash movement entered into a treasury day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub category: Option<TransactionCategoryId>,
    pub amount: Money,
    pub description: String,
    pub employee: Option<EmployeeId>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub payment_type: PaymentType,
    pub party: PartyId,
    pub amount: Money,
    pub date: DateTime<Utc>,
    /// Name of the invoice being settled, if any.
    pub document: Option<String>,
    /// Day the payment is booked into; confirming then posts a transaction.
    pub treasury_day: Option<TreasuryDay>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub category: ExpenseCategoryId,
    /// Defaults to the category's type.
    pub expense_type: Option<ExpenseType>,
    pub amount: Money,
    pub date: NaiveDate,
    pub store: Option<StoreId>,
    pub treasury_day: Option<TreasuryDay>,
    pub employee: Option<EmployeeId>,
    pub description: String,
    pub method: PaymentMethod,
    pub notes: Option<String>,
}

/// A confirmed transaction decided into a store's book, not yet applied.
struct Posting {
    store: StoreId,
    transaction_id: TransactionId,
    events: Vec<TreasuryEvent>,
}

impl State {
    fn book_command(
        &mut self,
        store: StoreId,
        command: impl FnOnce(&TreasuryBook) -> TreasuryCommand,
    ) -> BackofficeResult<Vec<TreasuryEvent>> {
        let command = command(self.require_book(store)?);
        self.execute(|s| &mut s.books, &store, TREASURY_BOOK, &command)
    }

    fn check_transaction_refs(
        &self,
        kind: TransactionKind,
        category: Option<TransactionCategoryId>,
        employee: Option<EmployeeId>,
    ) -> BackofficeResult<()> {
        if let Some(category) = category {
            let category = found(&self.transaction_categories, &category, "transaction category")?;
            if !category.active {
                return Err(DomainError::invariant(format!(
                    "transaction category {} is inactive",
                    category.name
                ))
                .into());
            }
            let matches = matches!(
                (kind, category.kind),
                (TransactionKind::Income, CategoryKind::Income)
                    | (TransactionKind::Expense, CategoryKind::Expense)
            );
            if !matches {
                return Err(DomainError::validation(format!(
                    "category {} does not fit a {kind:?} transaction",
                    category.name
                ))
                .into());
            }
        }
        if let Some(employee) = employee {
            self.require_employee(employee)?;
        }
        Ok(())
    }

    fn require_treasury_day(&self, day: TreasuryDay) -> BackofficeResult<()> {
        self.require_store(day.store)?;
        let book = self.require_book(day.store)?;
        if book.record(day.date).is_none() {
            return Err(DomainError::missing(format!("treasury day {}", day.date)).into());
        }
        Ok(())
    }

    /// Draft of a transaction posted on behalf of a payment or expense. The
    /// name is peeked; the caller advances the counter once it is applied.
    fn posting_draft(
        &self,
        kind: TransactionKind,
        amount: Money,
        description: String,
        payment_method: PaymentMethod,
        reference: TransactionReference,
    ) -> TransactionDraft {
        TransactionDraft {
            transaction_id: TransactionId::generate(),
            name: self.sequences.peek(SequenceCode::Transaction),
            at: Utc::now(),
            kind,
            category: None,
            amount,
            description,
            employee: None,
            payment_method,
            reference: Some(reference),
            notes: None,
        }
    }

    fn decide_posting(
        &self,
        day: TreasuryDay,
        transaction: TransactionDraft,
        occurred_at: DateTime<Utc>,
    ) -> BackofficeResult<Posting> {
        let book = self.require_book(day.store)?;
        let transaction_id = transaction.transaction_id;
        let events = book.handle(&TreasuryCommand::RecordTransaction(RecordTransaction {
            book_id: book.id_typed(),
            date: day.date,
            transaction,
            confirmed: true,
            occurred_at,
        }))?;
        Ok(Posting {
            store: day.store,
            transaction_id,
            events,
        })
    }

    fn decide_void(
        &self,
        day: Option<TreasuryDay>,
        transaction: Option<TransactionId>,
        occurred_at: DateTime<Utc>,
    ) -> BackofficeResult<Option<(StoreId, Vec<TreasuryEvent>)>> {
        let (Some(day), Some(transaction_id)) = (day, transaction) else {
            return Ok(None);
        };
        let book = self.require_book(day.store)?;
        let events = book.handle(&TreasuryCommand::CancelTransaction(TransactionTransition {
            book_id: book.id_typed(),
            transaction_id,
            by_owner: true,
            occurred_at,
        }))?;
        Ok(Some((day.store, events)))
    }

    /// Stage and apply a document's events together with its book events.
    fn commit_with_book<K, A>(
        &mut self,
        repo: fn(&mut State) -> &mut InMemoryRepository<K, A>,
        key: &K,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        events: &[A::Event],
        book: Option<(StoreId, Vec<TreasuryEvent>)>,
    ) -> BackofficeResult<()>
    where
        K: Ord + Display,
        A: Aggregate,
        A::Event: Event + Serialize,
    {
        let mut batch = JournalBatch::new();
        self.stage(&mut batch, aggregate_id, aggregate_type, events)?;
        if let Some((store, book_events)) = &book {
            let book_id = self.require_book(*store)?.id_typed();
            self.stage(&mut batch, book_id, TREASURY_BOOK, book_events)?;
        }

        apply_to(repo(self), key, events)?;
        if let Some((store, book_events)) = book {
            apply_to(&mut self.books, &store, &book_events)?;
        }
        self.journal.commit(batch);
        Ok(())
    }

    fn confirm_payment(&mut self, payment_id: PaymentId) -> BackofficeResult<()> {
        let now = Utc::now();
        let payment = found(&self.payments, &payment_id, "payment")?;
        let posting = match payment.treasury_day() {
            Some(day) => {
                let draft = self.posting_draft(
                    payment.payment_type().transaction_kind(),
                    payment.amount(),
                    format!("payment {}", payment.name()),
                    payment.method(),
                    TransactionReference::new(ReferenceKind::Payment, payment.name()),
                );
                Some(self.decide_posting(day, draft, now)?)
            }
            None => None,
        };
        let events = payment.handle(&PaymentCommand::Confirm(ConfirmPayment {
            payment_id,
            posted_transaction: posting.as_ref().map(|p| p.transaction_id),
            occurred_at: now,
        }))?;

        let posted = posting.is_some();
        self.commit_with_book(
            |s| &mut s.payments,
            &payment_id,
            payment_id.into(),
            PAYMENT,
            &events,
            posting.map(|p| (p.store, p.events)),
        )?;
        if posted {
            self.sequences.next(SequenceCode::Transaction);
        }
        info!(payment = %payment_id, posted, "payment confirmed");
        Ok(())
    }

    fn cancel_payment(&mut self, payment_id: PaymentId) -> BackofficeResult<()> {
        let now = Utc::now();
        let payment = found(&self.payments, &payment_id, "payment")?;
        let events = payment.handle(&PaymentCommand::Cancel(PaymentTransition {
            payment_id,
            occurred_at: now,
        }))?;
        let void = self.decide_void(payment.treasury_day(), payment.posted_transaction(), now)?;

        self.commit_with_book(
            |s| &mut s.payments,
            &payment_id,
            payment_id.into(),
            PAYMENT,
            &events,
            void,
        )?;
        info!(payment = %payment_id, "payment cancelled");
        Ok(())
    }

    /// The transaction category booked for an expense: the active expense
    /// category of the same name, if there is one.
    fn category_for_expense(&self, expense: &Expense) -> Option<TransactionCategoryId> {
        let name = &self.expense_categories.get(&expense.category()?)?.name;
        self.transaction_categories
            .values()
            .find(|c| c.active && c.kind == CategoryKind::Expense && c.is_named(name))
            .map(|c| c.id)
    }

    fn pay_expense(&mut self, expense_id: ExpenseId) -> BackofficeResult<()> {
        let now = Utc::now();
        let expense = found(&self.expenses, &expense_id, "expense")?;
        let posting = match expense.treasury_day() {
            Some(day) => {
                let mut draft = self.posting_draft(
                    TransactionKind::Expense,
                    expense.amount(),
                    expense.description().to_string(),
                    expense.method(),
                    TransactionReference::new(ReferenceKind::Expense, expense.name()),
                );
                draft.category = self.category_for_expense(expense);
                draft.employee = expense.employee();
                Some(self.decide_posting(day, draft, now)?)
            }
            None => None,
        };
        let events = expense.handle(&ExpenseCommand::Pay(PayExpense {
            expense_id,
            paid_transaction: posting.as_ref().map(|p| p.transaction_id),
            occurred_at: now,
        }))?;

        let posted = posting.is_some();
        self.commit_with_book(
            |s| &mut s.expenses,
            &expense_id,
            expense_id.into(),
            EXPENSE,
            &events,
            posting.map(|p| (p.store, p.events)),
        )?;
        if posted {
            self.sequences.next(SequenceCode::Transaction);
        }
        info!(expense = %expense_id, posted, "expense paid");
        Ok(())
    }
}

impl Backoffice {
    /// Open a store's treasury day, inheriting the last closing balance.
    /// Returns the record's name.
    pub fn open_treasury_day(
        &self,
        store: StoreId,
        date: NaiveDate,
        employee: Option<EmployeeId>,
        notes: Option<String>,
    ) -> BackofficeResult<String> {
        self.write(|s| {
            if let Some(employee) = employee {
                s.require_employee(employee)?;
            }
            let name = s.sequences.peek(SequenceCode::Treasury);
            s.book_command(store, |book| {
                TreasuryCommand::OpenDay(OpenDay {
                    book_id: book.id_typed(),
                    name: name.clone(),
                    date,
                    employee,
                    notes,
                    occurred_at: Utc::now(),
                })
            })?;
            s.sequences.next(SequenceCode::Treasury);
            info!(%store, %date, %name, "treasury day opened");
            Ok(name)
        })
    }

    /// Close a day, optionally against the cash actually counted.
    pub fn close_treasury_day(
        &self,
        store: StoreId,
        date: NaiveDate,
        counted_cash: Option<Money>,
    ) -> BackofficeResult<TreasuryTotals> {
        self.write(|s| {
            let events = s.book_command(store, |book| {
                TreasuryCommand::CloseDay(CloseDay {
                    book_id: book.id_typed(),
                    date,
                    counted_cash,
                    closing_transaction_id: TransactionId::generate(),
                    occurred_at: Utc::now(),
                })
            })?;
            let closing = events
                .iter()
                .find_map(|e| match e {
                    TreasuryEvent::DayClosed(closed) => Some(closed.closing),
                    _ => None,
                })
                .ok_or_else(|| DomainError::invariant("treasury day was not closed"))?;
            info!(
                %store,
                %date,
                closing_balance = %closing.totals.closing_balance,
                difference = %closing.difference,
                "treasury day closed"
            );
            Ok(closing.totals)
        })
    }

    /// Reopen the latest closed day of a store.
    pub fn reopen_treasury_day(&self, store: StoreId, date: NaiveDate) -> BackofficeResult<()> {
        self.write(|s| {
            s.book_command(store, |book| {
                TreasuryCommand::ReopenDay(ReopenDay {
                    book_id: book.id_typed(),
                    date,
                    occurred_at: Utc::now(),
                })
            })?;
            info!(%store, %date, "treasury day reopened");
            Ok(())
        })
        .inspect_err(|err| warn!(%store, %date, error = %err, "treasury day reopen rejected"))
    }

    pub fn treasury_record(
        &self,
        store: StoreId,
        date: NaiveDate,
    ) -> BackofficeResult<Option<TreasuryRecord>> {
        self.read(|s| s.books.get(&store).and_then(|b| b.record(date)).cloned())
    }

    /// Live totals of a day (closed days report their snapshot inputs).
    pub fn treasury_totals(
        &self,
        store: StoreId,
        date: NaiveDate,
    ) -> BackofficeResult<Option<TreasuryTotals>> {
        self.read(|s| s.books.get(&store).and_then(|b| b.totals(date)))
    }

    pub fn treasury_book(&self, store: StoreId) -> BackofficeResult<Option<TreasuryBook>> {
        self.read(|s| s.books.get(&store).cloned())
    }

    /// Enter a draft transaction into an open day.
    pub fn record_transaction(
        &self,
        store: StoreId,
        date: NaiveDate,
        transaction: NewTransaction,
    ) -> BackofficeResult<TransactionId> {
        self.write(|s| {
            s.check_transaction_refs(
                transaction.kind,
                transaction.category,
                transaction.employee,
            )?;
            let transaction_id = TransactionId::generate();
            let name = s.sequences.peek(SequenceCode::Transaction);
            s.book_command(store, |book| {
                TreasuryCommand::RecordTransaction(RecordTransaction {
                    book_id: book.id_typed(),
                    date,
                    transaction: TransactionDraft {
                        transaction_id,
                        name,
                        at: Utc::now(),
                        kind: transaction.kind,
                        category: transaction.category,
                        amount: transaction.amount,
                        description: transaction.description,
                        employee: transaction.employee,
                        payment_method: transaction.payment_method,
                        reference: None,
                        notes: transaction.notes,
                    },
                    confirmed: false,
                    occurred_at: Utc::now(),
                })
            })?;
            s.sequences.next(SequenceCode::Transaction);
            Ok(transaction_id)
        })
    }

    pub fn confirm_transaction(
        &self,
        store: StoreId,
        transaction_id: TransactionId,
    ) -> BackofficeResult<()> {
        self.transaction_transition(store, transaction_id, TreasuryCommand::ConfirmTransaction)
    }

    pub fn cancel_transaction(
        &self,
        store: StoreId,
        transaction_id: TransactionId,
    ) -> BackofficeResult<()> {
        self.transaction_transition(store, transaction_id, TreasuryCommand::CancelTransaction)
    }

    pub fn reset_transaction(
        &self,
        store: StoreId,
        transaction_id: TransactionId,
    ) -> BackofficeResult<()> {
        self.transaction_transition(store, transaction_id, TreasuryCommand::ResetTransaction)
    }

    fn transaction_transition(
        &self,
        store: StoreId,
        transaction_id: TransactionId,
        command: fn(TransactionTransition) -> TreasuryCommand,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.book_command(store, |book| {
                command(TransactionTransition {
                    book_id: book.id_typed(),
                    transaction_id,
                    by_owner: false,
                    occurred_at: Utc::now(),
                })
            })?;
            Ok(())
        })
    }

    pub fn create_transaction_category(
        &self,
        name: &str,
        code: Option<String>,
        kind: CategoryKind,
    ) -> BackofficeResult<TransactionCategoryId> {
        self.write(|s| {
            let id = TransactionCategoryId::generate();
            let category = TransactionCategory::new(id, name, code, kind)?;
            if s
                .transaction_categories
                .values()
                .any(|c| c.kind == kind && c.is_named(&category.name))
            {
                return Err(DomainError::conflict(format!(
                    "transaction category {} already exists",
                    category.name
                ))
                .into());
            }
            s.transaction_categories.upsert(id, category);
            Ok(id)
        })
    }

    pub fn set_transaction_category_active(
        &self,
        id: TransactionCategoryId,
        active: bool,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            let category = s
                .transaction_categories
                .get_mut(&id)
                .ok_or_else(|| DomainError::missing(format!("transaction category {id}")))?;
            category.active = active;
            Ok(())
        })
    }

    pub fn transaction_categories(&self) -> BackofficeResult<Vec<TransactionCategory>> {
        self.read(|s| s.transaction_categories.values().cloned().collect())
    }

    pub fn create_expense_category(
        &self,
        name: &str,
        code: Option<String>,
        expense_type: ExpenseType,
    ) -> BackofficeResult<ExpenseCategoryId> {
        self.write(|s| {
            let id = ExpenseCategoryId::generate();
            let category = ExpenseCategory::new(id, name, code, expense_type)?;
            if s
                .expense_categories
                .values()
                .any(|c| c.is_named(&category.name))
            {
                return Err(DomainError::conflict(format!(
                    "expense category {} already exists",
                    category.name
                ))
                .into());
            }
            s.expense_categories.upsert(id, category);
            Ok(id)
        })
    }

    pub fn set_expense_category_active(
        &self,
        id: ExpenseCategoryId,
        active: bool,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            let category = s
                .expense_categories
                .get_mut(&id)
                .ok_or_else(|| DomainError::missing(format!("expense category {id}")))?;
            category.active = active;
            Ok(())
        })
    }

    pub fn expense_categories(&self) -> BackofficeResult<Vec<ExpenseCategory>> {
        self.read(|s| s.expense_categories.values().cloned().collect())
    }

    pub fn create_payment(&self, payment: NewPayment) -> BackofficeResult<PaymentId> {
        self.write(|s| {
            let kind = match payment.payment_type {
                PaymentType::Customer => PartyKind::Customer,
                PaymentType::Supplier => PartyKind::Supplier,
            };
            s.require_party(payment.party, kind)?;
            if let Some(day) = payment.treasury_day {
                s.require_treasury_day(day)?;
            }

            let payment_id = PaymentId::generate();
            let name = s.sequences.peek(SequenceCode::Payment);
            s.create(
                |s| &mut s.payments,
                payment_id,
                Payment::empty(payment_id),
                PAYMENT,
                &PaymentCommand::CreatePayment(CreatePayment {
                    payment_id,
                    name: name.clone(),
                    payment_type: payment.payment_type,
                    party: payment.party,
                    amount: payment.amount,
                    date: payment.date,
                    document: payment.document,
                    treasury_day: payment.treasury_day,
                    method: payment.method,
                    reference: payment.reference,
                    notes: payment.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::Payment);
            info!(payment = %payment_id, %name, "payment created");
            Ok(payment_id)
        })
    }

    /// Confirm a payment; one linked to a treasury day books a confirmed
    /// transaction into it.
    pub fn confirm_payment(&self, payment_id: PaymentId) -> BackofficeResult<()> {
        self.write(|s| s.confirm_payment(payment_id)).inspect_err(|err| {
            warn!(payment = %payment_id, error = %err, "payment confirmation rejected")
        })
    }

    /// Cancel a payment and void the transaction it posted.
    pub fn cancel_payment(&self, payment_id: PaymentId) -> BackofficeResult<()> {
        self.write(|s| s.cancel_payment(payment_id))
    }

    pub fn reset_payment_to_draft(&self, payment_id: PaymentId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.payments,
                &payment_id,
                PAYMENT,
                &PaymentCommand::ResetToDraft(PaymentTransition {
                    payment_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn payment(&self, payment_id: PaymentId) -> BackofficeResult<Option<Payment>> {
        self.read(|s| s.payments.get(&payment_id).cloned())
    }

    pub fn payments(&self) -> BackofficeResult<Vec<Payment>> {
        self.read(|s| s.payments.values().cloned().collect())
    }

    pub fn create_expense(&self, expense: NewExpense) -> BackofficeResult<ExpenseId> {
        self.write(|s| {
            let category = found(&s.expense_categories, &expense.category, "expense category")?;
            if !category.active {
                return Err(DomainError::invariant(format!(
                    "expense category {} is inactive",
                    category.name
                ))
                .into());
            }
            let expense_type = expense.expense_type.unwrap_or(category.expense_type);
            if let Some(store) = expense.store {
                s.require_store(store)?;
            }
            if let Some(day) = expense.treasury_day {
                s.require_treasury_day(day)?;
            }
            if let Some(employee) = expense.employee {
                s.require_employee(employee)?;
            }

            let expense_id = ExpenseId::generate();
            let name = s.sequences.peek(SequenceCode::Expense);
            s.create(
                |s| &mut s.expenses,
                expense_id,
                Expense::empty(expense_id),
                EXPENSE,
                &ExpenseCommand::CreateExpense(CreateExpense {
                    expense_id,
                    name: name.clone(),
                    expense_type,
                    category: expense.category,
                    amount: expense.amount,
                    date: expense.date,
                    store: expense.store,
                    treasury_day: expense.treasury_day,
                    employee: expense.employee,
                    description: expense.description,
                    method: expense.method,
                    notes: expense.notes,
                    occurred_at: Utc::now(),
                }),
            )?;
            s.sequences.next(SequenceCode::Expense);
            info!(expense = %expense_id, %name, "expense created");
            Ok(expense_id)
        })
    }

    pub fn confirm_expense(&self, expense_id: ExpenseId) -> BackofficeResult<()> {
        self.expense_transition(expense_id, ExpenseCommand::Confirm)
    }

    /// Pay a confirmed expense; one linked to a treasury day books an
    /// expense transaction into it.
    pub fn pay_expense(&self, expense_id: ExpenseId) -> BackofficeResult<()> {
        self.write(|s| s.pay_expense(expense_id)).inspect_err(|err| {
            warn!(expense = %expense_id, error = %err, "expense payment rejected")
        })
    }

    pub fn cancel_expense(&self, expense_id: ExpenseId) -> BackofficeResult<()> {
        self.expense_transition(expense_id, ExpenseCommand::Cancel)
    }

    pub fn reset_expense_to_draft(&self, expense_id: ExpenseId) -> BackofficeResult<()> {
        self.expense_transition(expense_id, ExpenseCommand::ResetToDraft)
    }

    fn expense_transition(
        &self,
        expense_id: ExpenseId,
        command: fn(ExpenseTransition) -> ExpenseCommand,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.expenses,
                &expense_id,
                EXPENSE,
                &command(ExpenseTransition {
                    expense_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn expense(&self, expense_id: ExpenseId) -> BackofficeResult<Option<Expense>> {
        self.read(|s| s.expenses.get(&expense_id).cloned())
    }

    pub fn expenses(&self) -> BackofficeResult<Vec<Expense>> {
        self.read(|s| s.expenses.values().cloned().collect())
    }
}
