mod common;

use chrono::Duration;

use tailor_backoffice::{NewExpense, NewPayment, NewTransaction};
use tailor_core::{DomainError, Money};
use tailor_parties::PartyId;
use tailor_treasury::{
    CategoryKind, ExpenseType, PaymentMethod, PaymentType, RecordStatus, ReferenceKind,
    TransactionKind, TreasuryDay,
};

use common::{Shop, now, today};

fn income(amount: i64, description: &str) -> NewTransaction {
    NewTransaction {
        kind: TransactionKind::Income,
        category: None,
        amount: Money::from_major(amount),
        description: description.to_string(),
        employee: None,
        payment_method: PaymentMethod::Cash,
        notes: None,
    }
}

fn customer_payment(shop: &Shop, party: PartyId, amount: i64) -> NewPayment {
    NewPayment {
        payment_type: PaymentType::Customer,
        party,
        amount: Money::from_major(amount),
        date: now(),
        document: None,
        treasury_day: Some(TreasuryDay {
            store: shop.store,
            date: today(),
        }),
        method: PaymentMethod::Cash,
        reference: None,
        notes: None,
    }
}

#[test]
fn a_new_day_opens_with_the_previous_closing_balance() {
    let shop = Shop::open();
    let yesterday = today() - Duration::days(1);

    shop.backoffice
        .open_treasury_day(shop.store, yesterday, None, None)
        .unwrap();
    let tx = shop
        .backoffice
        .record_transaction(shop.store, yesterday, income(200, "float top-up"))
        .unwrap();
    shop.backoffice.confirm_transaction(shop.store, tx).unwrap();
    let closed = shop
        .backoffice
        .close_treasury_day(shop.store, yesterday, None)
        .unwrap();
    assert_eq!(closed.closing_balance, Money::from_major(200));

    let name = shop
        .backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();
    assert_eq!(name, "TRS/00002");
    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.opening_balance, Money::from_major(200));
}

#[test]
fn only_one_day_may_be_open_per_store() {
    let shop = Shop::open();
    let yesterday = today() - Duration::days(1);
    shop.backoffice
        .open_treasury_day(shop.store, yesterday, None, None)
        .unwrap();

    assert!(shop
        .backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .is_err());
}

#[test]
fn draft_transactions_do_not_count() {
    let shop = Shop::open();
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();
    shop.backoffice
        .record_transaction(shop.store, today(), income(40, "tailoring fee"))
        .unwrap();

    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.total_income, Money::ZERO);
}

#[test]
fn confirmed_sales_feed_the_open_day() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();

    shop.sell(None, shop.medium(), 2);

    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.total_sales, Money::from_major(100));
    assert_eq!(totals.closing_balance, Money::from_major(100));
}

#[test]
fn a_closed_day_refuses_new_sales() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();
    shop.backoffice
        .close_treasury_day(shop.store, today(), None)
        .unwrap();

    let sale = shop.draft_sale(None, shop.medium(), 1);
    assert!(shop.backoffice.confirm_sale(sale).is_err());
    assert_eq!(shop.available(shop.medium()), 10);

    shop.backoffice
        .reopen_treasury_day(shop.store, today())
        .unwrap();
    shop.backoffice.confirm_sale(sale).unwrap();
    assert_eq!(shop.available(shop.medium()), 9);
}

#[test]
fn counted_cash_shortfall_is_recorded_on_close() {
    let shop = Shop::open();
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();
    let tx = shop
        .backoffice
        .record_transaction(shop.store, today(), income(100, "alteration"))
        .unwrap();
    shop.backoffice.confirm_transaction(shop.store, tx).unwrap();

    let totals = shop
        .backoffice
        .close_treasury_day(shop.store, today(), Some(Money::from_major(90)))
        .unwrap();
    assert_eq!(totals.closing_balance, Money::from_major(100));

    let record = shop
        .backoffice
        .treasury_record(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Closed);
    assert_eq!(record.difference(), Money::from_major(-10));
}

#[test]
fn customer_payment_posts_income_and_cancelling_voids_it() {
    let shop = Shop::open();
    let customer = shop.customer("Layla");
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();

    let payment = shop
        .backoffice
        .create_payment(customer_payment(&shop, customer, 80))
        .unwrap();
    shop.backoffice.confirm_payment(payment).unwrap();
    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.total_income, Money::from_major(80));

    shop.backoffice.cancel_payment(payment).unwrap();
    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.total_income, Money::ZERO);
}

#[test]
fn a_payment_posting_cannot_be_cancelled_on_its_own() {
    let shop = Shop::open();
    let customer = shop.customer("Samir");
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();
    let payment = shop
        .backoffice
        .create_payment(customer_payment(&shop, customer, 40))
        .unwrap();
    shop.backoffice.confirm_payment(payment).unwrap();

    let record = shop
        .backoffice
        .treasury_record(shop.store, today())
        .unwrap()
        .unwrap();
    let posted = record
        .transactions
        .iter()
        .find(|t| t.reference.as_ref().is_some_and(|r| r.kind == ReferenceKind::Payment))
        .unwrap()
        .id;

    let err = shop
        .backoffice
        .cancel_transaction(shop.store, posted)
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::InvalidTransition(_))));
    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.total_income, Money::from_major(40));

    shop.backoffice.cancel_payment(payment).unwrap();
    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.total_income, Money::ZERO);
}

#[test]
fn an_older_day_cannot_be_reopened_once_a_newer_one_exists() {
    let shop = Shop::open();
    let yesterday = today() - Duration::days(1);
    shop.backoffice
        .open_treasury_day(shop.store, yesterday, None, None)
        .unwrap();
    shop.backoffice
        .close_treasury_day(shop.store, yesterday, None)
        .unwrap();
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();

    let err = shop
        .backoffice
        .reopen_treasury_day(shop.store, yesterday)
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::InvariantViolation(_))));
    let record = shop
        .backoffice
        .treasury_record(shop.store, yesterday)
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RecordStatus::Closed);
}

#[test]
fn payment_party_must_match_the_payment_type() {
    let shop = Shop::open();
    let customer = shop.customer("Karim");

    let mut payment = customer_payment(&shop, customer, 10);
    payment.payment_type = PaymentType::Supplier;
    payment.treasury_day = None;
    assert!(shop.backoffice.create_payment(payment).is_err());
}

#[test]
fn paid_expense_is_booked_under_its_category() {
    let shop = Shop::open();
    let rent = shop
        .backoffice
        .create_expense_category("Rent", None, ExpenseType::Fixed)
        .unwrap();
    let rent_tx = shop
        .backoffice
        .create_transaction_category("Rent", None, CategoryKind::Expense)
        .unwrap();
    shop.backoffice
        .open_treasury_day(shop.store, today(), None, None)
        .unwrap();

    let expense = shop
        .backoffice
        .create_expense(NewExpense {
            category: rent,
            expense_type: None,
            amount: Money::from_major(300),
            date: today(),
            store: Some(shop.store),
            treasury_day: Some(TreasuryDay {
                store: shop.store,
                date: today(),
            }),
            employee: None,
            description: "Shop rent".to_string(),
            method: PaymentMethod::Bank,
            notes: None,
        })
        .unwrap();
    assert!(shop.backoffice.pay_expense(expense).is_err());
    shop.backoffice.confirm_expense(expense).unwrap();
    shop.backoffice.pay_expense(expense).unwrap();

    let stored = shop.backoffice.expense(expense).unwrap().unwrap();
    assert!(stored.is_paid());
    assert_eq!(stored.expense_type(), ExpenseType::Fixed);

    let record = shop
        .backoffice
        .treasury_record(shop.store, today())
        .unwrap()
        .unwrap();
    let posted = record
        .transactions
        .iter()
        .find(|t| t.reference.as_ref().is_some_and(|r| r.kind == ReferenceKind::Expense))
        .unwrap();
    assert_eq!(posted.category, Some(rent_tx));
    assert_eq!(posted.amount, Money::from_major(300));

    let totals = shop
        .backoffice
        .treasury_totals(shop.store, today())
        .unwrap()
        .unwrap();
    assert_eq!(totals.total_expense, Money::from_major(300));
}
