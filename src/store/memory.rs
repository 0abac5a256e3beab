use anyhow::Result;
use parking_lot::RwLock;

use crate::model::{Category, Id, Product, ProductInput};
use crate::store::traits::{CategoryStore, ProductStore, Store, StoreError};

/// In-memory store backing the service. Plain `Vec`s preserve insertion
/// order; the `RwLock`s serialize writes while allowing concurrent reads,
/// which is all the concurrency contract this service promises.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: RwLock<Vec<Product>>,
    categories: RwLock<Vec<Category>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_product_id(products: &[Product]) -> Id {
        products.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }
}

#[async_trait::async_trait]
impl ProductStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.read().clone())
    }

    async fn get_product(&self, id: Id) -> Result<Option<Product>> {
        Ok(self.products.read().iter().find(|p| p.id == id).cloned())
    }

    async fn insert_product(&self, input: ProductInput) -> Result<Product> {
        let mut products = self.products.write();
        // Uniqueness is checked under the same write lock as the insert,
        // so concurrent creates with the same explicit id cannot race
        if let Some(id) = input.id {
            if products.iter().any(|p| p.id == id) {
                return Err(StoreError::DuplicateId(id).into());
            }
        }
        let id = input.id.unwrap_or_else(|| Self::next_product_id(&products));
        let product = input.into_product(id);
        products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: Id, input: &ProductInput) -> Result<bool> {
        let mut products = self.products.write();
        match products.iter_mut().find(|p| p.id == id) {
            Some(existing) => {
                existing.name = input.name.clone();
                existing.price = input.price;
                existing.category_id = input.category_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_product(&self, id: Id) -> Result<bool> {
        let mut products = self.products.write();
        let before = products.len();
        products.retain(|p| p.id != id);
        Ok(products.len() < before)
    }

    async fn reset_prices(&self) -> Result<usize> {
        let mut products = self.products.write();
        for product in products.iter_mut() {
            product.price = 0.0;
        }
        Ok(products.len())
    }
}

#[async_trait::async_trait]
impl CategoryStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.categories.read().clone())
    }

    async fn get_category(&self, id: Id) -> Result<Option<Category>> {
        Ok(self.categories.read().iter().find(|c| c.id == id).cloned())
    }

    async fn upsert_category(&self, category: Category) -> Result<()> {
        let mut categories = self.categories.write();
        match categories.iter_mut().find(|c| c.id == category.id) {
            Some(existing) => *existing = category,
            None => categories.push(category),
        }
        Ok(())
    }
}

impl Store for MemoryStore {}
