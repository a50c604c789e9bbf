//! Classification records for treasury transactions and expenses.

use serde::{Deserialize, Serialize};

use tailor_core::{DomainError, DomainResult, Entity, typed_id};

typed_id!(
    /// Transaction category identifier.
    TransactionCategoryId
);

typed_id!(
    /// Expense category identifier.
    ExpenseCategoryId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

/// Fixed (rent, salaries) or variable (supplies, repairs) spending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseType {
    Fixed,
    #[default]
    Variable,
}

fn required_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("category name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCategory {
    pub id: TransactionCategoryId,
    pub name: String,
    pub code: Option<String>,
    pub kind: CategoryKind,
    pub active: bool,
    pub notes: Option<String>,
}

impl TransactionCategory {
    pub fn new(
        id: TransactionCategoryId,
        name: &str,
        code: Option<String>,
        kind: CategoryKind,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required_name(name)?,
            code,
            kind,
            active: true,
            notes: None,
        })
    }
}

impl Entity for TransactionCategory {
    type Id = TransactionCategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub id: ExpenseCategoryId,
    pub name: String,
    pub code: Option<String>,
    pub expense_type: ExpenseType,
    pub active: bool,
    pub notes: Option<String>,
}

impl ExpenseCategory {
    pub fn new(
        id: ExpenseCategoryId,
        name: &str,
        code: Option<String>,
        expense_type: ExpenseType,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required_name(name)?,
            code,
            expense_type,
            active: true,
            notes: None,
        })
    }
}

impl Entity for ExpenseCategory {
    type Id = ExpenseCategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        let err =
            ExpenseCategory::new(ExpenseCategoryId::generate(), "  ", None, ExpenseType::Fixed)
                .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn new_categories_start_active() {
        let category = TransactionCategory::new(
            TransactionCategoryId::generate(),
            " Rent ",
            Some("RENT".into()),
            CategoryKind::Expense,
        )
        .unwrap();
        assert!(category.active);
        assert_eq!(category.name, "Rent");
    }
}
