//! Dashboard read model, computed on demand as of a given day.
//!
//! Windows are inclusive calendar days: "last 7 days" is the given day and
//! the six before it, "month to date" runs from the 1st to the given day.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use tailor_catalog::{ProductId, StoreId};
use tailor_core::Money;
use tailor_parties::PartyKind;
use tailor_sales::{ReturnStatus, Sale};
use tailor_stock::StockState;

use crate::engine::{Backoffice, State};
use crate::error::BackofficeResult;
use crate::repository::Repository;

/// Count and amount of confirmed sales over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SalesFigure {
    pub count: usize,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub as_of: NaiveDate,
    pub today: SalesFigure,
    pub yesterday: SalesFigure,
    pub last_7_days: SalesFigure,
    pub month_to_date: SalesFigure,
    /// Today against yesterday, in percent.
    pub sales_growth: f64,
    pub low_stock_records: usize,
    pub out_of_stock_records: usize,
    pub total_customers: usize,
    pub new_customers_today: usize,
    pub returns_today: usize,
    pub returns_last_7_days: usize,
    pub alerts: Vec<DashboardAlert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    OutOfStock,
    PendingReturns,
    NewCustomers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

impl AlertKind {
    pub fn severity(self) -> Severity {
        match self {
            AlertKind::LowStock => Severity::Warning,
            AlertKind::OutOfStock => Severity::Danger,
            AlertKind::PendingReturns => Severity::Info,
            AlertKind::NewCustomers => Severity::Success,
        }
    }
}

/// Something needing attention; only produced when `count > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardAlert {
    pub kind: AlertKind,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    pub product: ProductId,
    pub name: String,
    pub quantity: i64,
    /// Sum of line subtotals, before document discounts.
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePerformance {
    pub store: StoreId,
    pub name: String,
    pub sales_count: usize,
    pub total_amount: Money,
}

/// Growth in percent; 100 when there was nothing to grow from.
pub fn growth_percent(current: Money, previous: Money) -> f64 {
    if previous.is_positive() {
        (current - previous).minor() as f64 / previous.minor() as f64 * 100.0
    } else if current.is_positive() {
        100.0
    } else {
        0.0
    }
}

fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

impl State {
    pub(crate) fn confirmed_sales_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &Sale> {
        self.sales.values().filter(move |s| {
            s.is_confirmed() && s.day().is_some_and(|day| day >= from && day <= to)
        })
    }

    fn sales_figure(&self, from: NaiveDate, to: NaiveDate) -> SalesFigure {
        self.confirmed_sales_between(from, to)
            .fold(SalesFigure::default(), |acc, sale| SalesFigure {
                count: acc.count + 1,
                amount: acc.amount + sale.amount_total(),
            })
    }

    fn returns_between(&self, from: NaiveDate, to: NaiveDate) -> usize {
        self.returns
            .values()
            .filter(|r| {
                r.date()
                    .map(|d| d.date_naive())
                    .is_some_and(|day| day >= from && day <= to)
            })
            .count()
    }

    fn new_customers_on(&self, day: NaiveDate) -> usize {
        self.parties
            .values()
            .filter(|p| p.kind() == PartyKind::Customer)
            .filter(|p| p.registered_at().is_some_and(|at| at.date_naive() == day))
            .count()
    }

    fn dashboard_alerts(&self, as_of: NaiveDate) -> Vec<DashboardAlert> {
        let pending_returns = self
            .returns
            .values()
            .filter(|r| r.status() == ReturnStatus::Approved)
            .count();
        [
            (AlertKind::LowStock, self.ledger.count_in_state(StockState::Low)),
            (AlertKind::OutOfStock, self.ledger.count_in_state(StockState::Out)),
            (AlertKind::PendingReturns, pending_returns),
            (AlertKind::NewCustomers, self.new_customers_on(as_of)),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(kind, count)| DashboardAlert { kind, count })
        .collect()
    }

    fn dashboard(&self, as_of: NaiveDate) -> Dashboard {
        let yesterday = as_of - Duration::days(1);
        let week_start = as_of - Duration::days(6);
        let today = self.sales_figure(as_of, as_of);
        let previous = self.sales_figure(yesterday, yesterday);

        Dashboard {
            as_of,
            today,
            yesterday: previous,
            last_7_days: self.sales_figure(week_start, as_of),
            month_to_date: self.sales_figure(month_start(as_of), as_of),
            sales_growth: growth_percent(today.amount, previous.amount),
            low_stock_records: self.ledger.count_in_state(StockState::Low),
            out_of_stock_records: self.ledger.count_in_state(StockState::Out),
            total_customers: self
                .parties
                .values()
                .filter(|p| p.kind() == PartyKind::Customer)
                .count(),
            new_customers_today: self.new_customers_on(as_of),
            returns_today: self.returns_between(as_of, as_of),
            returns_last_7_days: self.returns_between(week_start, as_of),
            alerts: self.dashboard_alerts(as_of),
        }
    }
}

impl Backoffice {
    pub fn dashboard(&self, as_of: NaiveDate) -> BackofficeResult<Dashboard> {
        self.read(|s| s.dashboard(as_of))
    }

    /// Confirmed sales per day for the `days` days ending at `as_of`, oldest first.
    pub fn sales_chart(&self, as_of: NaiveDate, days: u32) -> BackofficeResult<Vec<DailySales>> {
        self.read(|s| {
            (0..i64::from(days))
                .rev()
                .map(|back| {
                    let date = as_of - Duration::days(back);
                    DailySales {
                        date,
                        amount: s.sales_figure(date, date).amount,
                    }
                })
                .collect()
        })
    }

    /// Best-selling products of the month by line amount.
    pub fn top_products(
        &self,
        as_of: NaiveDate,
        limit: usize,
    ) -> BackofficeResult<Vec<TopProduct>> {
        self.read(|s| {
            let mut totals: BTreeMap<ProductId, (i64, Money)> = BTreeMap::new();
            for sale in s.confirmed_sales_between(month_start(as_of), as_of) {
                for line in sale.lines() {
                    let entry = totals.entry(line.variant.product).or_default();
                    entry.0 += line.quantity;
                    entry.1 += line.subtotal();
                }
            }

            let mut top: Vec<TopProduct> = totals
                .into_iter()
                .map(|(product, (quantity, amount))| TopProduct {
                    product,
                    name: s
                        .products
                        .get(&product)
                        .map(|p| p.name().to_string())
                        .unwrap_or_default(),
                    quantity,
                    amount,
                })
                .collect();
            top.sort_by(|a, b| b.amount.cmp(&a.amount).then(b.quantity.cmp(&a.quantity)));
            top.truncate(limit);
            top
        })
    }

    /// Month-to-date confirmed sales per store, best first.
    pub fn store_performance(
        &self,
        as_of: NaiveDate,
    ) -> BackofficeResult<Vec<StorePerformance>> {
        self.read(|s| {
            let from = month_start(as_of);
            let mut rows: Vec<StorePerformance> = s
                .stores
                .values()
                .map(|store| {
                    let (sales_count, total_amount) = s
                        .confirmed_sales_between(from, as_of)
                        .filter(|sale| sale.store() == Some(store.id))
                        .fold((0, Money::ZERO), |(count, amount), sale| {
                            (count + 1, amount + sale.amount_total())
                        });
                    StorePerformance {
                        store: store.id,
                        name: store.name.clone(),
                        sales_count,
                        total_amount,
                    }
                })
                .collect();
            rows.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
            rows
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_from_nothing_is_full_or_zero() {
        assert_eq!(growth_percent(Money::from_major(50), Money::ZERO), 100.0);
        assert_eq!(growth_percent(Money::ZERO, Money::ZERO), 0.0);
    }

    #[test]
    fn growth_is_relative_to_yesterday() {
        assert_eq!(growth_percent(Money::from_major(150), Money::from_major(100)), 50.0);
        assert_eq!(growth_percent(Money::from_major(50), Money::from_major(100)), -50.0);
    }

    #[test]
    fn alert_severities() {
        assert_eq!(AlertKind::OutOfStock.severity(), Severity::Danger);
        assert_eq!(AlertKind::NewCustomers.severity(), Severity::Success);
    }

    #[test]
    fn month_starts_on_the_first() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(month_start(day), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
