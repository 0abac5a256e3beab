use crate::model::{Category, Id, Product, ProductInput};
use anyhow::Result;
use thiserror::Error;

/// Store-level conflicts that handlers map to client errors rather than
/// 500s. Carried inside `anyhow::Error`; callers downcast to recover it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("a product with id {0} already exists")]
    DuplicateId(Id),
}

/// Product persistence contract. The in-memory implementation is synchronous
/// under the hood, but the contract is async so a real backend can be
/// substituted without touching the service layer.
#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    /// All products in insertion order, relations unresolved.
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn get_product(&self, id: Id) -> Result<Option<Product>>;
    /// Persists a new product. When the input carries no id, the store
    /// assigns the next identity value; an explicit id that is already
    /// taken fails with `StoreError::DuplicateId`.
    async fn insert_product(&self, input: ProductInput) -> Result<Product>;
    /// Overwrites Name/Price/CategoryId of an existing product. Returns
    /// whether the id existed; the id itself is never changed.
    async fn update_product(&self, id: Id, input: &ProductInput) -> Result<bool>;
    /// Removes a product. Returns whether the id existed.
    async fn delete_product(&self, id: Id) -> Result<bool>;
    /// Sets every product's price to zero in a single batch. Returns the
    /// number of products touched.
    async fn reset_prices(&self) -> Result<usize>;
}

#[async_trait::async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn get_category(&self, id: Id) -> Result<Option<Category>>;
    /// Insert-or-replace by id. Only used by seeding; categories have no
    /// write endpoints.
    async fn upsert_category(&self, category: Category) -> Result<()>;
}

pub trait Store: ProductStore + CategoryStore + Send + Sync {}
