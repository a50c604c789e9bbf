use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use tailor_events::Event;
use tailor_hr::EmployeeId;

use crate::book::{PaymentMethod, TransactionId};
use crate::category::{ExpenseCategoryId, ExpenseType};
use crate::payment::TreasuryDay;

typed_id!(
    /// Operating expense identifier.
    ExpenseId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Draft,
    Confirmed,
    Paid,
    Cancel,
}

/// Aggregate root: Expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    name: String,
    expense_type: ExpenseType,
    category: Option<ExpenseCategoryId>,
    amount: Money,
    date: Option<NaiveDate>,
    store: Option<StoreId>,
    treasury_day: Option<TreasuryDay>,
    employee: Option<EmployeeId>,
    description: String,
    method: PaymentMethod,
    notes: Option<String>,
    status: ExpenseStatus,
    paid_transaction: Option<TransactionId>,
    version: u64,
    created: bool,
}

impl Expense {
    pub fn empty(id: ExpenseId) -> Self {
        Self {
            id,
            name: String::new(),
            expense_type: ExpenseType::Variable,
            category: None,
            amount: Money::ZERO,
            date: None,
            store: None,
            treasury_day: None,
            employee: None,
            description: String::new(),
            method: PaymentMethod::Cash,
            notes: None,
            status: ExpenseStatus::Draft,
            paid_transaction: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ExpenseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expense_type(&self) -> ExpenseType {
        self.expense_type
    }

    pub fn category(&self) -> Option<ExpenseCategoryId> {
        self.category
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn treasury_day(&self) -> Option<TreasuryDay> {
        self.treasury_day
    }

    pub fn employee(&self) -> Option<EmployeeId> {
        self.employee
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn is_paid(&self) -> bool {
        self.status == ExpenseStatus::Paid
    }

    pub fn paid_transaction(&self) -> Option<TransactionId> {
        self.paid_transaction
    }
}

impl AggregateRoot for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateExpense {
    pub expense_id: ExpenseId,
    pub name: String,
    pub expense_type: ExpenseType,
    pub category: ExpenseCategoryId,
    pub amount: Money,
    pub date: NaiveDate,
    pub store: Option<StoreId>,
    pub treasury_day: Option<TreasuryDay>,
    pub employee: Option<EmployeeId>,
    pub description: String,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayExpense {
    pub expense_id: ExpenseId,
    /// Treasury transaction booked for the payment, when linked to a day.
    pub paid_transaction: Option<TransactionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseTransition {
    pub expense_id: ExpenseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCommand {
    CreateExpense(CreateExpense),
    Confirm(ExpenseTransition),
    Pay(PayExpense),
    Cancel(ExpenseTransition),
    ResetToDraft(ExpenseTransition),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseCreated {
    pub expense_id: ExpenseId,
    pub name: String,
    pub expense_type: ExpenseType,
    pub category: ExpenseCategoryId,
    pub amount: Money,
    pub date: NaiveDate,
    pub store: Option<StoreId>,
    pub treasury_day: Option<TreasuryDay>,
    pub employee: Option<EmployeeId>,
    pub description: String,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseStatusChanged {
    pub expense_id: ExpenseId,
    pub status: ExpenseStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpensePaid {
    pub expense_id: ExpenseId,
    pub paid_transaction: Option<TransactionId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    ExpenseCreated(ExpenseCreated),
    StatusChanged(ExpenseStatusChanged),
    ExpensePaid(ExpensePaid),
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseCreated(_) => "treasury.expense.created",
            ExpenseEvent::StatusChanged(e) => match e.status {
                ExpenseStatus::Draft => "treasury.expense.reset_to_draft",
                ExpenseStatus::Confirmed => "treasury.expense.confirmed",
                ExpenseStatus::Paid => "treasury.expense.paid",
                ExpenseStatus::Cancel => "treasury.expense.cancelled",
            },
            ExpenseEvent::ExpensePaid(_) => "treasury.expense.paid",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseCreated(e) => e.occurred_at,
            ExpenseEvent::StatusChanged(e) => e.occurred_at,
            ExpenseEvent::ExpensePaid(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Expense {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::ExpenseCreated(e) => {
                self.id = e.expense_id;
                self.name = e.name.clone();
                self.expense_type = e.expense_type;
                self.category = Some(e.category);
                self.amount = e.amount;
                self.date = Some(e.date);
                self.store = e.store;
                self.treasury_day = e.treasury_day;
                self.employee = e.employee;
                self.description = e.description.clone();
                self.method = e.method;
                self.notes = e.notes.clone();
                self.status = ExpenseStatus::Draft;
                self.created = true;
            }
            ExpenseEvent::StatusChanged(e) => {
                self.status = e.status;
            }
            ExpenseEvent::ExpensePaid(e) => {
                self.status = ExpenseStatus::Paid;
                self.paid_transaction = e.paid_transaction;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::CreateExpense(cmd) => self.handle_create(cmd),
            ExpenseCommand::Confirm(cmd) => {
                self.ensure_created(cmd.expense_id)?;
                if self.status != ExpenseStatus::Draft {
                    return Err(DomainError::transition(format!(
                        "expense {} is not a draft",
                        self.name
                    )));
                }
                Ok(self.status_changed(cmd, ExpenseStatus::Confirmed))
            }
            ExpenseCommand::Pay(cmd) => {
                self.ensure_created(cmd.expense_id)?;
                if self.status != ExpenseStatus::Confirmed {
                    return Err(DomainError::transition(
                        "the expense must be confirmed before it is paid",
                    ));
                }
                if self.treasury_day.is_some() != cmd.paid_transaction.is_some() {
                    return Err(DomainError::invariant(
                        "an expense linked to a treasury day needs a posting, and only then",
                    ));
                }
                Ok(vec![ExpenseEvent::ExpensePaid(ExpensePaid {
                    expense_id: cmd.expense_id,
                    paid_transaction: cmd.paid_transaction,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ExpenseCommand::Cancel(cmd) => {
                self.ensure_created(cmd.expense_id)?;
                match self.status {
                    ExpenseStatus::Paid => {
                        Err(DomainError::transition("a paid expense cannot be cancelled"))
                    }
                    ExpenseStatus::Cancel => {
                        Err(DomainError::transition("expense is already cancelled"))
                    }
                    ExpenseStatus::Draft | ExpenseStatus::Confirmed => {
                        Ok(self.status_changed(cmd, ExpenseStatus::Cancel))
                    }
                }
            }
            ExpenseCommand::ResetToDraft(cmd) => {
                self.ensure_created(cmd.expense_id)?;
                if self.status != ExpenseStatus::Cancel {
                    return Err(DomainError::transition(
                        "only cancelled expenses can be reset to draft",
                    ));
                }
                Ok(self.status_changed(cmd, ExpenseStatus::Draft))
            }
        }
    }
}

impl Expense {
    fn ensure_created(&self, expense_id: ExpenseId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("expense {expense_id}")));
        }
        if self.id != expense_id {
            return Err(DomainError::invariant("expense_id mismatch"));
        }
        Ok(())
    }

    fn status_changed(&self, cmd: &ExpenseTransition, status: ExpenseStatus) -> Vec<ExpenseEvent> {
        vec![ExpenseEvent::StatusChanged(ExpenseStatusChanged {
            expense_id: cmd.expense_id,
            status,
            occurred_at: cmd.occurred_at,
        })]
    }

    fn handle_create(&self, cmd: &CreateExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("expense already exists"));
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation("expense amount must be positive"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("expense description is required"));
        }
        if let Some(day) = cmd.treasury_day {
            if cmd.store.is_some_and(|s| s != day.store) {
                return Err(DomainError::validation(
                    "the treasury day belongs to another store",
                ));
            }
        }

        Ok(vec![ExpenseEvent::ExpenseCreated(ExpenseCreated {
            expense_id: cmd.expense_id,
            name: cmd.name.clone(),
            expense_type: cmd.expense_type,
            category: cmd.category,
            amount: cmd.amount,
            date: cmd.date,
            store: cmd.store.or(cmd.treasury_day.map(|d| d.store)),
            treasury_day: cmd.treasury_day,
            employee: cmd.employee,
            description: cmd.description.clone(),
            method: cmd.method,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
