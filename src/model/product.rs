use serde::{Deserialize, Serialize};

use crate::model::{Category, FieldError, Id};

/// Product entity as stored and served. `category` is a resolved relation,
/// populated on reads and omitted from JSON while unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub id: Id,
    pub name: String,
    pub price: f64,
    pub category_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// Request body for POST /Products and PUT /Products/{id}. The id is
/// optional: omitted on create it is identity-assigned by the store; on
/// update the path id wins and any body id is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProductInput {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    pub price: f64,
    pub category_id: Id,
}

impl ProductInput {
    /// Field-level validation for POST/PUT bodies. CategoryId existence is
    /// deliberately not checked: dangling references are accepted.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("Name", "must not be empty"));
        }
        if !self.price.is_finite() {
            errors.push(FieldError::new("Price", "must be a finite number"));
        } else if self.price < 0.0 {
            errors.push(FieldError::new("Price", "must not be negative"));
        }
        errors
    }

    pub fn into_product(self, id: Id) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            category_id: self.category_id,
            category: None,
        }
    }
}
