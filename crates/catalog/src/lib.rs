//! Catalog module: products and the size / color / store reference records.
//!
//! Pure domain logic only: no IO, no persistence concerns.

pub mod product;
pub mod reference;

pub use product::{
    ArchiveProduct, CreateProduct, Product, ProductArchived, ProductCommand, ProductCreated,
    ProductEvent, ProductId, ProductReactivated, ProductStatus, ProductUpdated, ReactivateProduct,
    UpdateProduct,
};
pub use reference::{Color, ColorId, Size, SizeId, Store, StoreId};
