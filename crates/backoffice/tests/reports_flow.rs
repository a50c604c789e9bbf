mod common;

use chrono::Duration;

use tailor_backoffice::{NewEmployee, NewExpense, NewPayment, NewPurchase, NewSale, NewSupplier};
use tailor_core::{Money, Rate};
use tailor_hr::{EmployeeDetails, EmployeeRole};
use tailor_parties::PartyId;
use tailor_treasury::{ExpenseType, PaymentMethod, PaymentType};

use common::{Shop, now, today};

fn supplier(shop: &Shop) -> PartyId {
    shop.backoffice
        .register_supplier(NewSupplier::named("Cotton Mills"))
        .unwrap()
}

fn buy(shop: &Shop, supplier: PartyId, quantity: i64, unit_price: i64) {
    let purchase = shop
        .backoffice
        .create_purchase(NewPurchase {
            supplier,
            store: shop.store,
            date: now(),
            notes: None,
        })
        .unwrap();
    shop.backoffice
        .add_purchase_line(purchase, shop.medium(), quantity, Money::from_major(unit_price))
        .unwrap();
    shop.backoffice.confirm_purchase(purchase).unwrap();
}

fn pay(shop: &Shop, payment_type: PaymentType, party: PartyId, amount: i64) {
    let payment = shop
        .backoffice
        .create_payment(NewPayment {
            payment_type,
            party,
            amount: Money::from_major(amount),
            date: now(),
            document: None,
            treasury_day: None,
            method: PaymentMethod::Cash,
            reference: None,
            notes: None,
        })
        .unwrap();
    shop.backoffice.confirm_payment(payment).unwrap();
}

fn paid_expense(shop: &Shop, amount: i64) {
    let category = shop
        .backoffice
        .create_expense_category("Utilities", None, ExpenseType::Variable)
        .unwrap();
    let expense = shop
        .backoffice
        .create_expense(NewExpense {
            category,
            expense_type: None,
            amount: Money::from_major(amount),
            date: today(),
            store: Some(shop.store),
            treasury_day: None,
            employee: None,
            description: "Electricity".to_string(),
            method: PaymentMethod::Bank,
            notes: None,
        })
        .unwrap();
    shop.backoffice.confirm_expense(expense).unwrap();
    shop.backoffice.pay_expense(expense).unwrap();
}

#[test]
fn profit_and_loss_over_a_day() {
    let shop = Shop::open();
    let mills = supplier(&shop);
    buy(&shop, mills, 4, 20);
    shop.sell(Some(shop.customer("Rania")), shop.medium(), 3);
    paid_expense(&shop, 30);

    let report = shop
        .backoffice
        .profit_and_loss(today(), today(), Some(shop.store))
        .unwrap();
    assert_eq!(report.total_sales, Money::from_major(150));
    assert_eq!(report.total_purchases, Money::from_major(80));
    assert_eq!(report.gross_profit, Money::from_major(70));
    assert_eq!(report.total_expenses, Money::from_major(30));
    assert_eq!(report.net_profit, Money::from_major(40));
    assert!((report.profit_margin - 26.67).abs() < 0.01);

    let last_week = today() - Duration::days(7);
    let empty = shop
        .backoffice
        .profit_and_loss(last_week, last_week, None)
        .unwrap();
    assert_eq!(empty.total_sales, Money::ZERO);
    assert_eq!(empty.profit_margin, 0.0);

    assert!(shop
        .backoffice
        .profit_and_loss(today(), last_week, None)
        .is_err());
}

#[test]
fn debts_are_documents_minus_payments() {
    let shop = Shop::open();
    let mills = supplier(&shop);
    let customer = shop.customer("Youssef");
    buy(&shop, mills, 4, 20);
    shop.sell(Some(customer), shop.medium(), 3);
    pay(&shop, PaymentType::Customer, customer, 50);
    pay(&shop, PaymentType::Supplier, mills, 80);

    let debts = shop.backoffice.debts().unwrap();
    assert_eq!(debts.customer_debts.len(), 1);
    assert_eq!(debts.customer_debts[0].debt, Money::from_major(100));
    assert_eq!(debts.total_customer_debts, Money::from_major(100));
    // settled in full
    assert!(debts.supplier_debts.is_empty());

    let summary = shop.backoffice.customer_summary(customer).unwrap();
    assert_eq!(summary.sale_count, 1);
    assert_eq!(summary.total_payments, Money::from_major(50));
    assert_eq!(summary.loyalty_points, 1);

    let summary = shop.backoffice.supplier_summary(mills).unwrap();
    assert_eq!(summary.purchase_count, 1);
    assert_eq!(summary.debt, Money::ZERO);
    assert!(shop.backoffice.supplier_summary(customer).is_err());
}

#[test]
fn expenses_group_by_category() {
    let shop = Shop::open();
    paid_expense(&shop, 30);

    let rows = shop
        .backoffice
        .expenses_by_category(today(), today(), None)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Utilities");
    assert_eq!(rows[0].count, 1);
    assert_eq!(rows[0].total, Money::from_major(30));
}

#[test]
fn employee_commission_follows_confirmed_sales() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    let employee = shop
        .backoffice
        .hire_employee(NewEmployee {
            name: "Omar".to_string(),
            store: shop.store,
            role: EmployeeRole::Cashier,
            hire_date: today(),
            salary: Money::from_major(4_000),
            commission: Rate::from_percent(10).unwrap(),
            details: EmployeeDetails::default(),
        })
        .unwrap();

    let sale = shop
        .backoffice
        .create_sale(NewSale {
            employee: Some(employee),
            ..NewSale::walk_in(shop.store, now())
        })
        .unwrap();
    shop.backoffice
        .add_sale_line(sale, shop.medium(), 4, None)
        .unwrap();
    shop.backoffice.confirm_sale(sale).unwrap();

    let stats = shop
        .backoffice
        .employee_stats(employee, today(), today())
        .unwrap();
    assert_eq!(stats.sale_count, 1);
    assert_eq!(stats.total_sales, Money::from_major(200));
    assert_eq!(stats.commission, Money::from_major(20));
}

#[test]
fn treasury_movements_list_each_day() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();
    shop.sell(None, shop.medium(), 1);

    let rows = shop
        .backoffice
        .treasury_movements(today(), today(), None)
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].total_income, Money::from_major(50));
    assert_eq!(rows[0].closing_balance, Money::from_major(50));
}
