//! Back office for a multi-branch clothing retailer.
//!
//! [`Backoffice`] owns every aggregate (catalog, stock ledger, parties,
//! sales, returns, purchases, treasury books, staff) and runs each operation
//! as one all-or-nothing unit. Read models for the dashboard and reports are
//! computed on demand from the same state.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod journal;
pub mod notify;
pub mod reports;
pub mod repository;
pub mod sequence;

mod engine;

pub use config::{BackofficeConfig, ConfigError, Settings};
pub use engine::{
    Backoffice, EmployeeUpdate, NewCustomer, NewEmployee, NewExpense, NewPayment, NewProduct,
    NewPurchase, NewReturn, NewSale, NewSupplier, NewTransaction, NewTransfer, PartyUpdate,
    SaleTerms,
};
pub use error::{BackofficeError, BackofficeResult};
pub use journal::JournalEntry;
pub use notify::{InMemoryOutbox, Notifier, NotifyError, OutboundMessage, TracingNotifier};
pub use sequence::SequenceCode;

/// Install process-wide logging in the configured format.
pub fn init_logging(config: &BackofficeConfig) {
    tailor_observability::init(config.log_format);
}
