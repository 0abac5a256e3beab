use serde::{Deserialize, Serialize};

use crate::model::{Id, Product};

/// Category entity. Read-only in this service: seeded at startup, no
/// create/update/delete endpoints exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Category {
    pub id: Id,
    pub name: String,
    /// Reverse of `Product.CategoryId`. Embedded on category reads; the
    /// embedded products carry no `Category` of their own to keep the
    /// serialization acyclic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
}

impl Category {
    pub fn new(id: Id, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            products: None,
        }
    }
}
