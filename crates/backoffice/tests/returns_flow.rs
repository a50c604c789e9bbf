mod common;

use tailor_backoffice::NewReturn;
use tailor_core::DomainError;
use tailor_sales::{ReturnReason, ReturnStatus, ReturnType, SaleId};

use common::{Shop, days_ago, now};

fn new_return(sale: SaleId, return_type: ReturnType) -> NewReturn {
    NewReturn {
        sale,
        date: now(),
        return_type,
        reason: ReturnReason::WrongSize,
        reason_details: None,
        notes: None,
    }
}

#[test]
fn completed_return_puts_goods_back() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    let sale = shop.sell(None, shop.medium(), 3);
    let line = shop.backoffice.sale(sale).unwrap().unwrap().lines()[0].line_no;

    let ret = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Return))
        .unwrap();
    shop.backoffice.set_return_quantity(ret, line, 2).unwrap();
    shop.backoffice.approve_return(ret).unwrap();
    shop.backoffice.complete_return(ret).unwrap();

    assert_eq!(shop.available(shop.medium()), 9);
    let ret = shop.backoffice.sale_return(ret).unwrap().unwrap();
    assert_eq!(ret.status(), ReturnStatus::Done);
    assert!(shop.backoffice.has_returns(sale).unwrap());
}

#[test]
fn returned_quantity_is_bounded_by_what_was_sold() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    let sale = shop.sell(None, shop.medium(), 3);
    let line = shop.backoffice.sale(sale).unwrap().unwrap().lines()[0].line_no;

    let ret = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Return))
        .unwrap();
    let err = shop.backoffice.set_return_quantity(ret, line, 4).unwrap_err();
    assert!(matches!(err.domain(), Some(DomainError::Validation(_))));
}

#[test]
fn a_second_return_only_gets_what_is_left() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    let sale = shop.sell(None, shop.medium(), 3);
    let line = shop.backoffice.sale(sale).unwrap().unwrap().lines()[0].line_no;

    let first = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Return))
        .unwrap();
    shop.backoffice.set_return_quantity(first, line, 2).unwrap();
    shop.backoffice.approve_return(first).unwrap();

    let second = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Return))
        .unwrap();
    shop.backoffice.set_return_quantity(second, line, 2).unwrap();
    assert!(shop.backoffice.approve_return(second).is_err());

    shop.backoffice.set_return_quantity(second, line, 1).unwrap();
    shop.backoffice.approve_return(second).unwrap();
    assert_eq!(shop.backoffice.return_count(sale).unwrap(), 2);
}

#[test]
fn returns_outside_the_window_are_refused() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    let sale = shop.draft_sale_at(None, shop.medium(), 1, days_ago(10));
    shop.backoffice.confirm_sale(sale).unwrap();
    let line = shop.backoffice.sale(sale).unwrap().unwrap().lines()[0].line_no;

    let ret = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Return))
        .unwrap();
    shop.backoffice.set_return_quantity(ret, line, 1).unwrap();

    let err = shop.backoffice.approve_return(ret).unwrap_err();
    assert!(matches!(
        err.domain(),
        Some(DomainError::ReturnWindowExpired { window: 7, .. })
    ));
}

#[test]
fn a_sale_with_an_open_return_cannot_be_cancelled() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    let sale = shop.sell(None, shop.medium(), 2);

    let ret = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Return))
        .unwrap();
    assert!(shop.backoffice.cancel_sale(sale).is_err());
    assert_eq!(shop.available(shop.medium()), 8);

    shop.backoffice.cancel_return(ret).unwrap();
    shop.backoffice.cancel_sale(sale).unwrap();
    assert_eq!(shop.available(shop.medium()), 10);
}

#[test]
fn exchange_swaps_goods_in_one_step() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 5);
    shop.stock(shop.large(), 2);
    let sale = shop.sell(None, shop.medium(), 1);
    let line = shop.backoffice.sale(sale).unwrap().unwrap().lines()[0].line_no;

    let ret = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Exchange))
        .unwrap();
    shop.backoffice.set_return_quantity(ret, line, 1).unwrap();
    shop.backoffice
        .add_exchange_line(ret, shop.large(), 1, None)
        .unwrap();
    shop.backoffice.approve_return(ret).unwrap();
    shop.backoffice.complete_return(ret).unwrap();

    assert_eq!(shop.available(shop.medium()), 5);
    assert_eq!(shop.available(shop.large()), 1);
}

#[test]
fn exchange_without_replacement_stock_leaves_everything_untouched() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 5);
    let sale = shop.sell(None, shop.medium(), 1);
    let line = shop.backoffice.sale(sale).unwrap().unwrap().lines()[0].line_no;

    let ret = shop
        .backoffice
        .create_return(new_return(sale, ReturnType::Exchange))
        .unwrap();
    shop.backoffice.set_return_quantity(ret, line, 1).unwrap();
    shop.backoffice
        .add_exchange_line(ret, shop.large(), 1, None)
        .unwrap();
    shop.backoffice.approve_return(ret).unwrap();

    let err = shop.backoffice.complete_return(ret).unwrap_err();
    assert!(err.is_insufficient_stock());
    assert_eq!(shop.available(shop.medium()), 4);
    let ret = shop.backoffice.sale_return(ret).unwrap().unwrap();
    assert_eq!(ret.status(), ReturnStatus::Approved);
}
