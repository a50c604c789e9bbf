use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use tailor_catalog::{
    ArchiveProduct, Color, ColorId, CreateProduct, Product, ProductCommand, ProductId,
    ReactivateProduct, Size, SizeId, Store, StoreId, UpdateProduct,
};
use tailor_core::{DomainError, Entity, Money};
use tailor_treasury::{OpenBook, TreasuryBook, TreasuryBookId, TreasuryCommand};

use super::{Backoffice, PRODUCT, TREASURY_BOOK};
use crate::error::BackofficeResult;
use crate::repository::Repository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub code: Option<String>,
    pub name: String,
    /// List price, used when a line gives no unit price.
    pub price: Money,
    pub description: Option<String>,
}

impl Backoffice {
    /// Register a branch and open its treasury book.
    pub fn create_store(
        &self,
        name: &str,
        code: Option<String>,
        address: Option<String>,
    ) -> BackofficeResult<StoreId> {
        self.write(|s| {
            let id = StoreId::generate();
            let store = Store::new(id, name, code, address)?;
            if s.stores.values().any(|other| other.is_named(&store.name)) {
                return Err(
                    DomainError::conflict(format!("store {} already exists", store.name)).into(),
                );
            }

            let book_id = TreasuryBookId::generate();
            s.create(
                |s| &mut s.books,
                id,
                TreasuryBook::empty(book_id),
                TREASURY_BOOK,
                &TreasuryCommand::OpenBook(OpenBook {
                    book_id,
                    store: id,
                    occurred_at: Utc::now(),
                }),
            )?;

            info!(store = %id, name = %store.name, "store created");
            s.stores.upsert(id, store);
            Ok(id)
        })
    }

    pub fn create_size(&self, name: &str, code: Option<String>) -> BackofficeResult<SizeId> {
        self.write(|s| {
            let id = SizeId::generate();
            let size = Size::new(id, name, code)?;
            if s.sizes.values().any(|other| other.is_named(&size.name)) {
                return Err(
                    DomainError::conflict(format!("size {} already exists", size.name)).into(),
                );
            }
            s.sizes.upsert(id, size);
            Ok(id)
        })
    }

    pub fn create_color(&self, name: &str, code: Option<String>) -> BackofficeResult<ColorId> {
        self.write(|s| {
            let id = ColorId::generate();
            let color = Color::new(id, name, code)?;
            if s.colors.values().any(|other| other.is_named(&color.name)) {
                return Err(
                    DomainError::conflict(format!("color {} already exists", color.name)).into(),
                );
            }
            s.colors.upsert(id, color);
            Ok(id)
        })
    }

    pub fn create_product(&self, product: NewProduct) -> BackofficeResult<ProductId> {
        self.write(|s| {
            if let Some(code) = product.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                if s.products.values().any(|p| p.code() == Some(code)) {
                    return Err(
                        DomainError::conflict(format!("product code {code} is taken")).into(),
                    );
                }
            }

            let product_id = ProductId::generate();
            s.create(
                |s| &mut s.products,
                product_id,
                Product::empty(product_id),
                PRODUCT,
                &ProductCommand::CreateProduct(CreateProduct {
                    product_id,
                    code: product.code,
                    name: product.name,
                    price: product.price,
                    description: product.description,
                    occurred_at: Utc::now(),
                }),
            )?;
            info!(product = %product_id, "product created");
            Ok(product_id)
        })
    }

    pub fn update_product(
        &self,
        product_id: ProductId,
        name: Option<String>,
        price: Option<Money>,
        description: Option<String>,
    ) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.products,
                &product_id,
                PRODUCT,
                &ProductCommand::UpdateProduct(UpdateProduct {
                    product_id,
                    name,
                    price,
                    description,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    /// Archived products stay in history but cannot be put on new lines.
    pub fn archive_product(&self, product_id: ProductId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.products,
                &product_id,
                PRODUCT,
                &ProductCommand::ArchiveProduct(ArchiveProduct {
                    product_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            info!(product = %product_id, "product archived");
            Ok(())
        })
    }

    pub fn reactivate_product(&self, product_id: ProductId) -> BackofficeResult<()> {
        self.write(|s| {
            s.execute(
                |s| &mut s.products,
                &product_id,
                PRODUCT,
                &ProductCommand::ReactivateProduct(ReactivateProduct {
                    product_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })
    }

    pub fn product(&self, product_id: ProductId) -> BackofficeResult<Option<Product>> {
        self.read(|s| s.products.get(&product_id).cloned())
    }

    pub fn products(&self) -> BackofficeResult<Vec<Product>> {
        self.read(|s| s.products.values().cloned().collect())
    }

    pub fn store(&self, store_id: StoreId) -> BackofficeResult<Option<Store>> {
        self.read(|s| s.stores.get(&store_id).cloned())
    }

    pub fn stores(&self) -> BackofficeResult<Vec<Store>> {
        self.read(|s| s.stores.values().cloned().collect())
    }

    pub fn sizes(&self) -> BackofficeResult<Vec<Size>> {
        self.read(|s| s.sizes.values().cloned().collect())
    }

    pub fn colors(&self) -> BackofficeResult<Vec<Color>> {
        self.read(|s| s.colors.values().cloned().collect())
    }
}
