//! Report data: the figures the back-office reports print.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tailor_catalog::StoreId;
use tailor_core::{DomainError, Money};
use tailor_hr::EmployeeId;
use tailor_parties::{Party, PartyId, PartyKind};
use tailor_treasury::{ExpenseCategoryId, PaymentType, RecordStatus};

use crate::engine::{Backoffice, State, found};
use crate::error::BackofficeResult;
use crate::repository::Repository;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// `None` covers every store.
    pub store: Option<StoreId>,
    pub total_sales: Money,
    pub total_purchases: Money,
    pub gross_profit: Money,
    /// Paid expenses only.
    pub total_expenses: Money,
    pub net_profit: Money,
    /// Net profit over sales, in percent; zero without sales.
    pub profit_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryMovement {
    pub store: StoreId,
    pub name: String,
    pub date: NaiveDate,
    pub opening_balance: Money,
    pub total_income: Money,
    pub total_expense: Money,
    pub closing_balance: Money,
    pub status: RecordStatus,
}

/// What a party owes (customer) or is owed (supplier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDebt {
    pub party: PartyId,
    pub name: String,
    pub phone: Option<String>,
    /// Confirmed sales (customers) or purchases (suppliers).
    pub total_documents: Money,
    pub total_payments: Money,
    pub debt: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebtReport {
    pub customer_debts: Vec<PartyDebt>,
    pub supplier_debts: Vec<PartyDebt>,
    pub total_customer_debts: Money,
    pub total_supplier_debts: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryExpenses {
    pub category: ExpenseCategoryId,
    pub name: String,
    pub count: usize,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub party: PartyId,
    pub sale_count: usize,
    pub total_sales: Money,
    pub total_payments: Money,
    pub debt: Money,
    pub loyalty_points: i64,
    pub return_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierSummary {
    pub party: PartyId,
    pub purchase_count: usize,
    pub total_purchases: Money,
    pub total_payments: Money,
    pub debt: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeStats {
    pub employee: EmployeeId,
    pub sale_count: usize,
    pub total_sales: Money,
    pub commission: Money,
    pub worked_minutes: i64,
}

fn within(day: Option<NaiveDate>, from: NaiveDate, to: NaiveDate) -> bool {
    day.is_some_and(|day| day >= from && day <= to)
}

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<(), DomainError> {
    if from > to {
        return Err(DomainError::validation(format!(
            "report range starts after it ends ({from} > {to})"
        )));
    }
    Ok(())
}

impl State {
    /// Confirmed document total and confirmed payments of one party.
    fn party_balance(&self, party: &Party) -> (usize, Money, Money) {
        let id = party.id_typed();
        let (count, documents) = match party.kind() {
            PartyKind::Customer => self
                .sales
                .values()
                .filter(|s| s.is_confirmed() && s.customer() == Some(id))
                .fold((0, Money::ZERO), |(n, total), s| (n + 1, total + s.amount_total())),
            PartyKind::Supplier => self
                .purchases
                .values()
                .filter(|p| p.is_confirmed() && p.supplier() == Some(id))
                .fold((0, Money::ZERO), |(n, total), p| (n + 1, total + p.amount_total())),
        };
        let payment_type = match party.kind() {
            PartyKind::Customer => PaymentType::Customer,
            PartyKind::Supplier => PaymentType::Supplier,
        };
        let payments = self
            .payments
            .values()
            .filter(|p| p.is_confirmed() && p.payment_type() == payment_type)
            .filter(|p| p.party() == Some(id))
            .map(|p| p.amount())
            .sum();
        (count, documents, payments)
    }

    fn debts_of(&self, kind: PartyKind) -> Vec<PartyDebt> {
        self.parties
            .values()
            .filter(|p| p.kind() == kind)
            .filter_map(|party| {
                let (_, total_documents, total_payments) = self.party_balance(party);
                let debt = total_documents - total_payments;
                debt.is_positive().then(|| PartyDebt {
                    party: party.id_typed(),
                    name: party.name().to_string(),
                    phone: party
                        .contact()
                        .phone
                        .clone()
                        .or_else(|| party.contact().mobile.clone()),
                    total_documents,
                    total_payments,
                    debt,
                })
            })
            .collect()
    }
}

impl Backoffice {
    pub fn profit_and_loss(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        store: Option<StoreId>,
    ) -> BackofficeResult<ProfitAndLoss> {
        check_range(from, to)?;
        self.read(|s| {
            let in_store = |doc_store: Option<StoreId>| store.is_none() || doc_store == store;
            let total_sales: Money = s
                .confirmed_sales_between(from, to)
                .filter(|sale| in_store(sale.store()))
                .map(|sale| sale.amount_total())
                .sum();
            let total_purchases: Money = s
                .purchases
                .values()
                .filter(|p| p.is_confirmed() && within(p.day(), from, to) && in_store(p.store()))
                .map(|p| p.amount_total())
                .sum();
            let total_expenses: Money = s
                .expenses
                .values()
                .filter(|e| e.is_paid() && within(e.date(), from, to) && in_store(e.store()))
                .map(|e| e.amount())
                .sum();

            let gross_profit = total_sales - total_purchases;
            let net_profit = gross_profit - total_expenses;
            let profit_margin = if total_sales.is_positive() {
                net_profit.minor() as f64 / total_sales.minor() as f64 * 100.0
            } else {
                0.0
            };
            ProfitAndLoss {
                from,
                to,
                store,
                total_sales,
                total_purchases,
                gross_profit,
                total_expenses,
                net_profit,
                profit_margin,
            }
        })
    }

    /// Treasury days in the range, by store then date. Closed days report
    /// their closing snapshot, open days their live totals.
    pub fn treasury_movements(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        store: Option<StoreId>,
    ) -> BackofficeResult<Vec<TreasuryMovement>> {
        check_range(from, to)?;
        self.read(|s| {
            let mut rows = Vec::new();
            for book in s.books.values() {
                let Some(book_store) = book.store() else {
                    continue;
                };
                if store.is_some_and(|wanted| wanted != book_store) {
                    continue;
                }
                for record in book.records().filter(|r| r.date >= from && r.date <= to) {
                    let totals = record.totals(book.document_totals(record.date));
                    rows.push(TreasuryMovement {
                        store: book_store,
                        name: record.name.clone(),
                        date: record.date,
                        opening_balance: totals.opening_balance,
                        total_income: totals.total_income,
                        total_expense: totals.total_expense,
                        closing_balance: totals.closing_balance,
                        status: record.status,
                    });
                }
            }
            rows
        })
    }

    /// Parties with a positive balance: confirmed documents minus confirmed
    /// payments.
    pub fn debts(&self) -> BackofficeResult<DebtReport> {
        self.read(|s| {
            let customer_debts = s.debts_of(PartyKind::Customer);
            let supplier_debts = s.debts_of(PartyKind::Supplier);
            DebtReport {
                total_customer_debts: customer_debts.iter().map(|d| d.debt).sum(),
                total_supplier_debts: supplier_debts.iter().map(|d| d.debt).sum(),
                customer_debts,
                supplier_debts,
            }
        })
    }

    /// Paid expenses in the range grouped by category, largest first.
    pub fn expenses_by_category(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        store: Option<StoreId>,
    ) -> BackofficeResult<Vec<CategoryExpenses>> {
        check_range(from, to)?;
        self.read(|s| {
            let mut groups: BTreeMap<ExpenseCategoryId, (usize, Money)> = BTreeMap::new();
            for expense in s.expenses.values().filter(|e| {
                e.is_paid()
                    && within(e.date(), from, to)
                    && (store.is_none() || e.store() == store)
            }) {
                if let Some(category) = expense.category() {
                    let entry = groups.entry(category).or_default();
                    entry.0 += 1;
                    entry.1 += expense.amount();
                }
            }

            let mut rows: Vec<CategoryExpenses> = groups
                .into_iter()
                .map(|(category, (count, total))| CategoryExpenses {
                    category,
                    name: s
                        .expense_categories
                        .get(&category)
                        .map(|c| c.name.clone())
                        .unwrap_or_default(),
                    count,
                    total,
                })
                .collect();
            rows.sort_by(|a, b| b.total.cmp(&a.total));
            rows
        })
    }

    pub fn customer_summary(&self, party_id: PartyId) -> BackofficeResult<CustomerSummary> {
        self.read(|s| {
            let party = found(&s.parties, &party_id, "customer")?;
            if party.kind() != PartyKind::Customer {
                return Err(DomainError::validation(format!(
                    "{} is not a customer",
                    party.name()
                )));
            }
            let (sale_count, total_sales, total_payments) = s.party_balance(party);
            Ok(CustomerSummary {
                party: party_id,
                sale_count,
                total_sales,
                total_payments,
                debt: total_sales - total_payments,
                loyalty_points: party.loyalty_points(),
                return_count: s
                    .returns
                    .values()
                    .filter(|r| r.customer() == Some(party_id))
                    .count(),
            })
        })?
        .map_err(Into::into)
    }

    pub fn supplier_summary(&self, party_id: PartyId) -> BackofficeResult<SupplierSummary> {
        self.read(|s| {
            let party = found(&s.parties, &party_id, "supplier")?;
            if party.kind() != PartyKind::Supplier {
                return Err(DomainError::validation(format!(
                    "{} is not a supplier",
                    party.name()
                )));
            }
            let (purchase_count, total_purchases, total_payments) = s.party_balance(party);
            Ok(SupplierSummary {
                party: party_id,
                purchase_count,
                total_purchases,
                total_payments,
                debt: total_purchases - total_payments,
            })
        })?
        .map_err(Into::into)
    }

    /// Confirmed sales, commission and attended time of an employee over a range.
    pub fn employee_stats(
        &self,
        employee_id: EmployeeId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BackofficeResult<EmployeeStats> {
        check_range(from, to)?;
        self.read(|s| {
            let employee = found(&s.employees, &employee_id, "employee")?;
            let (sale_count, total_sales) = s
                .confirmed_sales_between(from, to)
                .filter(|sale| sale.employee() == Some(employee_id))
                .fold((0, Money::ZERO), |(n, total), sale| {
                    (n + 1, total + sale.amount_total())
                });
            let worked_minutes = s
                .attendances
                .values()
                .filter(|a| a.employee() == Some(employee_id))
                .filter(|a| within(a.check_in().map(|at| at.date_naive()), from, to))
                .map(|a| a.worked_minutes())
                .sum();
            Ok::<_, DomainError>(EmployeeStats {
                employee: employee_id,
                sale_count,
                total_sales,
                commission: employee.commission_on(total_sales),
                worked_minutes,
            })
        })?
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_ranges_are_rejected() {
        let from = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(matches!(check_range(from, to), Err(DomainError::Validation(_))));
        assert!(check_range(to, from).is_ok());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let from = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert!(within(Some(from), from, to));
        assert!(within(Some(to), from, to));
        assert!(!within(None, from, to));
    }
}
