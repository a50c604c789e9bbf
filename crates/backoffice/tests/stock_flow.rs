mod common;

use tailor_backoffice::NewTransfer;
use tailor_stock::{CountStatus, TransferStatus};

use common::{Shop, today};

#[test]
fn transfer_leaves_the_source_on_confirm_and_reaches_the_destination_on_completion() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    let uptown = shop
        .backoffice
        .create_store("Uptown", None, None)
        .unwrap();
    let at_uptown = shop.medium().at(uptown);

    let transfer = shop
        .backoffice
        .create_transfer(NewTransfer {
            store_from: shop.store,
            store_to: uptown,
            date: today(),
            notes: None,
        })
        .unwrap();
    shop.backoffice
        .add_transfer_line(transfer, shop.medium(), 4)
        .unwrap();

    shop.backoffice.confirm_transfer(transfer).unwrap();
    assert_eq!(shop.available(shop.medium()), 6);
    assert_eq!(shop.backoffice.available(at_uptown).unwrap(), 0);

    shop.backoffice.complete_transfer(transfer).unwrap();
    assert_eq!(shop.available(shop.medium()), 6);
    assert_eq!(shop.backoffice.available(at_uptown).unwrap(), 4);
    let transfer = shop.backoffice.transfer(transfer).unwrap().unwrap();
    assert_eq!(transfer.status(), TransferStatus::Done);
}

#[test]
fn validated_count_overwrites_the_counted_quantities() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 10);
    shop.stock(shop.large(), 3);

    let count = shop
        .backoffice
        .create_count(shop.store, today(), None)
        .unwrap();
    shop.backoffice.start_count(count).unwrap();
    let line = shop
        .backoffice
        .count(count)
        .unwrap()
        .unwrap()
        .lines()
        .iter()
        .find(|l| l.variant == shop.medium())
        .map(|l| l.line_no)
        .unwrap();
    shop.backoffice.record_count(count, line, 7).unwrap();

    shop.backoffice.validate_count(count).unwrap();
    assert_eq!(shop.available(shop.medium()), 7);
    assert_eq!(shop.available(shop.large()), 3);
    let count = shop.backoffice.count(count).unwrap().unwrap();
    assert_eq!(count.status(), CountStatus::Done);
}

#[test]
fn low_stock_alert_goes_out_through_the_notifier() {
    let shop = Shop::open();
    shop.stock(shop.medium(), 3);
    let rule = shop
        .backoffice
        .add_stock_alert(shop.product, shop.store, 5)
        .unwrap();

    let alerts = shop.backoffice.check_stock_alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].quantity, 3);
    let sent = shop.outbox.sent().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].address, "stock-alerts");
    assert!(sent[0].subject.contains("Linen shirt"));
    assert!(sent[0].subject.contains("Downtown"));

    shop.backoffice.set_stock_alert_active(rule, false).unwrap();
    assert!(shop.backoffice.check_stock_alerts().unwrap().is_empty());

    shop.backoffice.set_stock_alert_active(rule, true).unwrap();
    shop.stock(shop.large(), 2);
    assert!(shop.backoffice.check_stock_alerts().unwrap().is_empty());
    assert_eq!(shop.outbox.sent().unwrap().len(), 1);
}
