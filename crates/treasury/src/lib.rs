//! Treasury module: per-store daily cash records, their transactions,
//! customer / supplier payments and operating expenses.

pub mod book;
pub mod category;
pub mod expense;
pub mod payment;

pub use book::{
    BookOpened, CloseDay, Closing, DayClosed, DayOpened, DayReopened, DocumentKind,
    DocumentTotalPosted, DocumentTotals, OpenBook, OpenDay, PaymentMethod, PostDocumentTotal,
    RecordStatus, RecordTransaction, ReferenceKind, ReopenDay, Transaction, TransactionDraft,
    TransactionId, TransactionKind, TransactionRecorded, TransactionReference,
    TransactionStatus, TransactionStatusChanged, TransactionTransition, TreasuryBook,
    TreasuryBookId, TreasuryCommand, TreasuryEvent, TreasuryRecord, TreasuryTotals,
};
pub use category::{
    CategoryKind, ExpenseCategory, ExpenseCategoryId, ExpenseType, TransactionCategory,
    TransactionCategoryId,
};
pub use expense::{
    CreateExpense, Expense, ExpenseCommand, ExpenseCreated, ExpenseEvent, ExpenseId,
    ExpensePaid, ExpenseStatus, ExpenseStatusChanged, ExpenseTransition, PayExpense,
};
pub use payment::{
    ConfirmPayment, CreatePayment, Payment, PaymentCancelled, PaymentCommand, PaymentConfirmed,
    PaymentCreated, PaymentEvent, PaymentId, PaymentResetToDraft, PaymentStatus,
    PaymentTransition, PaymentType, TreasuryDay,
};
