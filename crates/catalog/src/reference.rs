//! Static reference records: stores (branches), sizes and colors.

use serde::{Deserialize, Serialize};

use tailor_core::{DomainError, DomainResult, Entity, typed_id};

typed_id!(
    /// Branch identifier.
    StoreId
);

typed_id!(
    /// Size identifier (S, M, L, 42, ...).
    SizeId
);

typed_id!(
    /// Color identifier.
    ColorId
);

fn required_name(kind: &str, name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{kind} name cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A branch that holds stock and runs its own treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub code: Option<String>,
    pub address: Option<String>,
}

impl Store {
    pub fn new(
        id: StoreId,
        name: &str,
        code: Option<String>,
        address: Option<String>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required_name("store", name)?,
            code: optional_text(code),
            address: optional_text(address),
        })
    }
}

impl Entity for Store {
    type Id = StoreId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: SizeId,
    pub name: String,
    pub code: Option<String>,
}

impl Size {
    pub fn new(id: SizeId, name: &str, code: Option<String>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required_name("size", name)?,
            code: optional_text(code),
        })
    }
}

impl Entity for Size {
    type Id = SizeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub id: ColorId,
    pub name: String,
    pub code: Option<String>,
}

impl Color {
    pub fn new(id: ColorId, name: &str, code: Option<String>) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: required_name("color", name)?,
            code: optional_text(code),
        })
    }
}

impl Entity for Color {
    type Id = ColorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
