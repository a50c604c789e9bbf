//! Sales domain module: point-of-sale invoices and the returns / exchanges
//! raised against them.
//!
//! Deterministic domain logic only (no IO, no storage). Stock and loyalty side
//! effects are described by the documents and carried out by the back office.

pub mod returns;
pub mod sale;

pub use returns::{
    AddExchangeLine, ApproveReturn, CreateReturn, DEFAULT_RETURN_WINDOW_DAYS, ExchangeLine,
    ExchangeLineAdded, ExchangeLineRemoved, RemoveExchangeLine, ReturnAmounts, ReturnCommand,
    ReturnCreated, ReturnEvent, ReturnId, ReturnLine, ReturnQuantitySet, ReturnReason,
    ReturnStatus, ReturnStatusChanged, ReturnTransition, ReturnType, SaleReturn,
    SetReturnQuantity, SoldLines,
};
pub use sale::{
    AddSaleLine, CancelSale, ConfirmSale, CreateSale, Discount, RemoveSaleLine,
    ResetSaleToDraft, Sale, SaleCancelled, SaleCommand, SaleConfirmed, SaleCreated, SaleEvent,
    SaleId, SaleLine, SaleLineAdded, SaleLineRemoved, SaleResetToDraft, SaleStatus,
    SaleTermsUpdated, SaleTotals, UpdateSaleTerms,
};
