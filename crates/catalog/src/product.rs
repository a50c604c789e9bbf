use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tailor_core::{Aggregate, AggregateRoot, DomainError, Money, typed_id};
use tailor_events::Event;

typed_id!(
    /// Product identifier. Variants (size/color) are not separate products.
    ProductId
);

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    code: Option<String>,
    name: String,
    /// List price, used as the default unit price on new document lines.
    price: Money,
    description: Option<String>,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            code: None,
            name: String::new(),
            price: Money::ZERO,
            description: None,
            status: ProductStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Archived products stay on existing documents but cannot be sold or bought again.
    pub fn can_be_traded(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub code: Option<String>,
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct. `None` fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub name: Option<String>,
    pub price: Option<Money>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReactivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    ArchiveProduct(ArchiveProduct),
    ReactivateProduct(ReactivateProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub code: Option<String>,
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated (full new values, not a patch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductReactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReactivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductArchived(ProductArchived),
    ProductReactivated(ProductReactivated),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductUpdated(_) => "catalog.product.updated",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
            ProductEvent::ProductReactivated(_) => "catalog.product.reactivated",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
            ProductEvent::ProductReactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.price = e.price;
                self.description = e.description.clone();
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.name = e.name.clone();
                self.price = e.price;
                self.description = e.description.clone();
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
            ProductEvent::ProductReactivated(_) => {
                self.status = ProductStatus::Active;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
            ProductCommand::ReactivateProduct(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Product {
    fn ensure_created(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::missing(format!("product {product_id}")));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn validate_price(price: Money) -> Result<(), DomainError> {
        if price.is_negative() {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        Self::validate_price(cmd.price)?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            code: cmd.code.as_ref().map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            name: name.to_string(),
            price: cmd.price,
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_created(cmd.product_id)?;

        let name = match &cmd.name {
            Some(n) if n.trim().is_empty() => {
                return Err(DomainError::validation("product name cannot be empty"));
            }
            Some(n) => n.trim().to_string(),
            None => self.name.clone(),
        };
        let price = cmd.price.unwrap_or(self.price);
        Self::validate_price(price)?;

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            name,
            price,
            description: cmd.description.clone().or_else(|| self.description.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_created(cmd.product_id)?;
        if self.status == ProductStatus::Archived {
            return Err(DomainError::transition("product is already archived"));
        }
        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(
        &self,
        cmd: &ReactivateProduct,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_created(cmd.product_id)?;
        if self.status == ProductStatus::Active {
            return Err(DomainError::transition("product is already active"));
        }
        Ok(vec![ProductEvent::ProductReactivated(ProductReactivated {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_product() -> Product {
        let id = ProductId::generate();
        let mut product = Product::empty(id);
        let events = product
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                code: Some(" TS-01 ".into()),
                name: "Linen shirt".into(),
                price: Money::from_major(450),
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        product.apply_all(&events);
        product
    }

    #[test]
    fn create_trims_code_and_starts_active() {
        let product = created_product();
        assert_eq!(product.code(), Some("TS-01"));
        assert_eq!(product.status(), ProductStatus::Active);
        assert!(product.can_be_traded());
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn create_rejects_negative_price() {
        let id = ProductId::generate();
        let err = Product::empty(id)
            .handle(&ProductCommand::CreateProduct(CreateProduct {
                product_id: id,
                code: None,
                name: "Scarf".into(),
                price: Money::from_minor(-1),
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_keeps_unspecified_fields() {
        let mut product = created_product();
        let events = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: product.id_typed(),
                name: None,
                price: Some(Money::from_major(500)),
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        product.apply_all(&events);
        assert_eq!(product.name(), "Linen shirt");
        assert_eq!(product.price(), Money::from_major(500));
    }

    #[test]
    fn archived_product_cannot_be_traded_until_reactivated() {
        let mut product = created_product();
        let id = product.id_typed();
        let events = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        product.apply_all(&events);
        assert!(!product.can_be_traded());

        let err = product
            .handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        let events = product
            .handle(&ProductCommand::ReactivateProduct(ReactivateProduct {
                product_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        product.apply_all(&events);
        assert!(product.can_be_traded());
    }

    #[test]
    fn update_on_missing_product_is_a_missing_reference() {
        let id = ProductId::generate();
        let err = Product::empty(id)
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: id,
                name: Some("x".into()),
                price: None,
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::MissingReference(_)));
    }
}
