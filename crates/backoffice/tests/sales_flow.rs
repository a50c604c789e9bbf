mod common;

use std::sync::Arc;
use std::thread;

use tailor_backoffice::NewSale;
use tailor_core::{DomainError, Money};
use tailor_sales::SaleStatus;
use tailor_stock::StockState;

use common::{Shop, now, today};

#[test]
fn selling_the_last_units_empties_the_record_and_blocks_further_sales() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 5);

    shop.sell(None, shop.medium(), 5);

    let record = shop
        .backoffice
        .stock_record(shop.key(shop.medium()))
        .unwrap()
        .unwrap();
    assert_eq!(record.quantity, 0);
    assert_eq!(record.state, StockState::Out);

    let next = shop.draft_sale(None, shop.medium(), 1);
    let err = shop.backoffice.confirm_sale(next).unwrap_err();
    assert!(err.is_insufficient_stock());
    let sale = shop.backoffice.sale(next).unwrap().unwrap();
    assert_eq!(sale.status(), SaleStatus::Draft);
}

#[test]
fn failed_confirmation_changes_nothing() {
    let shop = Shop::open();
    let customer = shop.customer("Nour");
    shop.stock(shop.medium(), 5);
    shop.stock(shop.large(), 1);

    let sale = shop.draft_sale(Some(customer), shop.medium(), 2);
    shop.backoffice
        .add_sale_line(sale, shop.large(), 3, None)
        .unwrap();
    let journal_before = shop.backoffice.journal().unwrap().len();

    let err = shop.backoffice.confirm_sale(sale).unwrap_err();
    assert!(matches!(
        err.domain(),
        Some(DomainError::InsufficientStock { available: 1, requested: 3, .. })
    ));

    assert_eq!(shop.available(shop.medium()), 5);
    assert_eq!(shop.available(shop.large()), 1);
    let party = shop.backoffice.party(customer).unwrap().unwrap();
    assert_eq!(party.loyalty_points(), 0);
    let book = shop.backoffice.treasury_book(shop.store).unwrap().unwrap();
    assert_eq!(book.document_totals(today()).sales, Money::ZERO);
    assert_eq!(shop.backoffice.journal().unwrap().len(), journal_before);
}

#[test]
fn confirmed_sale_earns_loyalty_and_cancellation_gives_everything_back() {
    let shop = Shop::open();
    let customer = shop.customer("Mona");
    shop.stock(shop.medium(), 10);

    // 3 x 50.00 = 150.00, one point per 100.00
    let sale = shop.sell(Some(customer), shop.medium(), 3);
    assert_eq!(shop.available(shop.medium()), 7);
    let party = shop.backoffice.party(customer).unwrap().unwrap();
    assert_eq!(party.loyalty_points(), 1);
    let book = shop.backoffice.treasury_book(shop.store).unwrap().unwrap();
    assert_eq!(book.document_totals(today()).sales, Money::from_major(150));

    shop.backoffice.cancel_sale(sale).unwrap();
    assert_eq!(shop.available(shop.medium()), 10);
    let party = shop.backoffice.party(customer).unwrap().unwrap();
    assert_eq!(party.loyalty_points(), 0);
    let book = shop.backoffice.treasury_book(shop.store).unwrap().unwrap();
    assert_eq!(book.document_totals(today()).sales, Money::ZERO);

    shop.backoffice.reset_sale_to_draft(sale).unwrap();
    let sale = shop.backoffice.sale(sale).unwrap().unwrap();
    assert_eq!(sale.status(), SaleStatus::Draft);
}

#[test]
fn points_used_cannot_exceed_the_balance() {
    let shop = Shop::open();
    let customer = shop.customer("Hana");
    shop.stock(shop.medium(), 10);

    let sale = shop
        .backoffice
        .create_sale(NewSale {
            customer: Some(customer),
            loyalty_points_used: 5,
            ..NewSale::walk_in(shop.store, now())
        })
        .unwrap();
    shop.backoffice
        .add_sale_line(sale, shop.medium(), 1, None)
        .unwrap();

    assert!(shop.backoffice.confirm_sale(sale).is_err());
    assert_eq!(shop.available(shop.medium()), 10);
}

#[test]
fn sale_names_follow_the_sequence_without_gaps() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);

    let first = shop.draft_sale(None, shop.medium(), 1);
    let second = shop.draft_sale(None, shop.medium(), 1);

    let name = |id| shop.backoffice.sale(id).unwrap().unwrap().name().to_string();
    assert_eq!(name(first), "SALE/00001");
    assert_eq!(name(second), "SALE/00002");
}

#[test]
fn concurrent_sales_never_oversell() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 5);
    let shop = Arc::new(shop);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let shop = Arc::clone(&shop);
            thread::spawn(move || {
                let sale = shop.draft_sale(None, shop.medium(), 1);
                shop.backoffice.confirm_sale(sale).is_ok()
            })
        })
        .collect();
    let confirmed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(confirmed, 5);
    assert_eq!(shop.available(shop.medium()), 0);
}

#[test]
fn dashboard_counts_todays_sales() {
    let shop = Shop::open();
    let customer = shop.customer("Salma");
    shop.stock(shop.medium(), 20);
    shop.sell(Some(customer), shop.medium(), 3);
    shop.sell(None, shop.medium(), 1);

    let dashboard = shop.backoffice.dashboard(today()).unwrap();
    assert_eq!(dashboard.today.count, 2);
    assert_eq!(dashboard.today.amount, Money::from_major(200));
    assert_eq!(dashboard.sales_growth, 100.0);
    assert_eq!(dashboard.total_customers, 1);
    assert_eq!(dashboard.new_customers_today, 1);

    let top = shop.backoffice.top_products(today(), 5).unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].quantity, 4);

    let chart = shop.backoffice.sales_chart(today(), 7).unwrap();
    assert_eq!(chart.len(), 7);
    assert_eq!(chart.last().map(|d| d.amount), Some(Money::from_major(200)));
}

#[test]
fn oversized_quantities_are_refused_instead_of_overflowing() {
    let shop = Shop::open();
    shop.stock(shop.medium(), i64::MAX);
    let err = shop
        .backoffice
        .adjust_stock(shop.key(shop.medium()), 1)
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::InvariantViolation(_))));
    assert_eq!(shop.available(shop.medium()), i64::MAX);

    let sale = shop
        .backoffice
        .create_sale(NewSale::walk_in(shop.store, now()))
        .unwrap();
    let err = shop
        .backoffice
        .add_sale_line(sale, shop.medium(), i64::MAX / 100, None)
        .unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::InvariantViolation(_))));
    let sale = shop.backoffice.sale(sale).unwrap().unwrap();
    assert!(sale.lines().is_empty());
    assert_eq!(sale.amount_total(), Money::ZERO);
}
