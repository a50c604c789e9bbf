//! Stock module: per-branch quantities, inter-store transfers, physical
//! counts and low-stock alert rules.
//!
//! Every quantity change goes through [`StockLedger`]; the documents here only
//! describe the movements they need.

pub mod alert;
pub mod count;
pub mod ledger;
pub mod transfer;

pub use alert::{AlertRuleId, StockAlert, StockAlertRule, StockAlertRules};
pub use count::{
    AddCountLine, CountCommand, CountEvent, CountId, CountLine, CountStatus, CountTransition,
    CreateCount, InventoryCount, RecordCount, StartCount,
};
pub use ledger::{
    ApplyMovements, DEFAULT_MIN_QUANTITY, LedgerId, MovementReference, MovementSource,
    SetDefaultMinQuantity, SetMinQuantity, SetQuantities, StockCommand, StockEvent, StockKey,
    StockLedger, StockMovement, StockRecord, StockState, Variant,
};
pub use transfer::{
    AddTransferLine, CreateTransfer, RemoveTransferLine, Transfer, TransferCommand,
    TransferEvent, TransferId, TransferLine, TransferStatus, TransferTransition,
};
