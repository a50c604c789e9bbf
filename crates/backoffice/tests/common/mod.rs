#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use tailor_backoffice::{
    Backoffice, BackofficeConfig, InMemoryOutbox, NewCustomer, NewProduct, NewSale,
};
use tailor_catalog::{ColorId, ProductId, SizeId, StoreId};
use tailor_core::Money;
use tailor_parties::PartyId;
use tailor_sales::SaleId;
use tailor_stock::{StockKey, Variant};

/// One store selling one shirt in two sizes, both red, at 50.00.
pub struct Shop {
    pub backoffice: Arc<Backoffice>,
    pub outbox: Arc<InMemoryOutbox>,
    pub store: StoreId,
    pub product: ProductId,
    pub medium: SizeId,
    pub large: SizeId,
    pub red: ColorId,
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

impl Shop {
    pub fn open() -> Self {
        let outbox = Arc::new(InMemoryOutbox::new());
        let backoffice =
            Backoffice::new(&BackofficeConfig::default(), outbox.clone()).expect("back office");
        let store = backoffice
            .create_store("Downtown", Some("DT".to_string()), None)
            .expect("store");
        let medium = backoffice.create_size("M", None).expect("size M");
        let large = backoffice.create_size("L", None).expect("size L");
        let red = backoffice.create_color("Red", None).expect("color");
        let product = backoffice
            .create_product(NewProduct {
                code: Some("SH-001".to_string()),
                name: "Linen shirt".to_string(),
                price: Money::from_major(50),
                description: None,
            })
            .expect("product");

        Self {
            backoffice: Arc::new(backoffice),
            outbox,
            store,
            product,
            medium,
            large,
            red,
        }
    }

    pub fn medium(&self) -> Variant {
        Variant::new(self.product, self.medium, self.red)
    }

    pub fn large(&self) -> Variant {
        Variant::new(self.product, self.large, self.red)
    }

    pub fn key(&self, variant: Variant) -> StockKey {
        variant.at(self.store)
    }

    pub fn stock(&self, variant: Variant, quantity: i64) {
        self.backoffice
            .adjust_stock(self.key(variant), quantity)
            .expect("stock adjustment");
    }

    pub fn available(&self, variant: Variant) -> i64 {
        self.backoffice.available(self.key(variant)).expect("available")
    }

    pub fn customer(&self, name: &str) -> PartyId {
        self.backoffice
            .register_customer(NewCustomer::named(name))
            .expect("customer")
    }

    /// Draft sale with one line at list price.
    pub fn draft_sale(&self, customer: Option<PartyId>, variant: Variant, quantity: i64) -> SaleId {
        self.draft_sale_at(customer, variant, quantity, now())
    }

    pub fn draft_sale_at(
        &self,
        customer: Option<PartyId>,
        variant: Variant,
        quantity: i64,
        date: DateTime<Utc>,
    ) -> SaleId {
        let sale = self
            .backoffice
            .create_sale(NewSale {
                customer,
                ..NewSale::walk_in(self.store, date)
            })
            .expect("sale");
        self.backoffice
            .add_sale_line(sale, variant, quantity, None)
            .expect("sale line");
        sale
    }

    pub fn sell(&self, customer: Option<PartyId>, variant: Variant, quantity: i64) -> SaleId {
        let sale = self.draft_sale(customer, variant, quantity);
        self.backoffice.confirm_sale(sale).expect("confirm sale");
        sale
    }
}
