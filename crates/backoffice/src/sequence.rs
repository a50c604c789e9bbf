//! Document and master-record numbering (`SALE/00001`, `CUST/00042`, ...).

use std::collections::HashMap;

/// Numbered record families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceCode {
    Sale,
    Purchase,
    Return,
    Transfer,
    InventoryCount,
    Treasury,
    Transaction,
    Payment,
    Expense,
    Customer,
    Supplier,
    Employee,
}

impl SequenceCode {
    pub fn prefix(self) -> &'static str {
        match self {
            SequenceCode::Sale => "SALE",
            SequenceCode::Purchase => "PUR",
            SequenceCode::Return => "RET",
            SequenceCode::Transfer => "TRF",
            SequenceCode::InventoryCount => "INV",
            SequenceCode::Treasury => "TRS",
            SequenceCode::Transaction => "TRX",
            SequenceCode::Payment => "PAY",
            SequenceCode::Expense => "EXP",
            SequenceCode::Customer => "CUST",
            SequenceCode::Supplier => "SUPP",
            SequenceCode::Employee => "EMP",
        }
    }
}

/// Monotonic counters, one per [`SequenceCode`].
#[derive(Debug, Default)]
pub struct SequenceService {
    counters: HashMap<SequenceCode, u64>,
}

impl SequenceService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the next record of `code`. Numbers are never reused.
    pub fn next(&mut self, code: SequenceCode) -> String {
        let counter = self.counters.entry(code).or_insert(0);
        *counter += 1;
        format!("{}/{:05}", code.prefix(), counter)
    }

    /// Name `next` would hand out, without consuming it.
    pub fn peek(&self, code: SequenceCode) -> String {
        format!("{}/{:05}", code.prefix(), self.current(code) + 1)
    }

    /// Last number handed out for `code` (0 when none).
    pub fn current(&self, code: SequenceCode) -> u64 {
        self.counters.get(&code).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_padded_and_independent() {
        let mut seq = SequenceService::new();
        assert_eq!(seq.next(SequenceCode::Sale), "SALE/00001");
        assert_eq!(seq.next(SequenceCode::Sale), "SALE/00002");
        assert_eq!(seq.next(SequenceCode::Customer), "CUST/00001");
        assert_eq!(seq.current(SequenceCode::Sale), 2);
        assert_eq!(seq.current(SequenceCode::Payment), 0);
        assert_eq!(seq.peek(SequenceCode::Sale), "SALE/00003");
        assert_eq!(seq.next(SequenceCode::Sale), "SALE/00003");
    }
}
