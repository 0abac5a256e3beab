use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::model::{Category, Id, Product, ProductInput};
use crate::store::Store;

/// Price threshold for the GetExpensiveProducts function.
const EXPENSIVE_THRESHOLD: f64 = 500.0;

/// Mediates between the HTTP handlers and the persistence store. Holds an
/// explicit store reference passed at construction; there is no runtime
/// container.
pub struct ProductService<S> {
    store: Arc<S>,
}

impl<S> Clone for ProductService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> ProductService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All products with the Category relation eagerly resolved. Filtering
    /// and paging are the query layer's responsibility, not this one's.
    pub async fn list_products(&self) -> Result<Vec<Product>> {
        let products = self.store.list_products().await?;
        self.resolve_categories(products).await
    }

    /// Absent is not an error here; the handler maps it to 404.
    pub async fn get_product(&self, id: Id) -> Result<Option<Product>> {
        match self.store.get_product(id).await? {
            Some(mut product) => {
                product.category = self.store.get_category(product.category_id).await?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    /// Persists the product. CategoryId existence is not validated, so
    /// orphaned references are accepted.
    pub async fn create_product(&self, input: ProductInput) -> Result<Product> {
        self.store.insert_product(input).await
    }

    /// Overwrites Name/Price/CategoryId when the id exists; the id itself
    /// is immutable. When the id does not exist this is a no-op that still
    /// echoes the input unchanged, and no record is created.
    pub async fn update_product(&self, id: Id, input: ProductInput) -> Result<Product> {
        self.store.update_product(id, &input).await?;
        Ok(input.into_product(id))
    }

    /// Idempotent: deleting an absent id is a silent no-op.
    pub async fn delete_product(&self, id: Id) -> Result<()> {
        self.store.delete_product(id).await?;
        Ok(())
    }

    /// Zeroes every product price in one batch write.
    pub async fn reset_prices(&self) -> Result<String> {
        self.store.reset_prices().await?;
        Ok("All prices have been reset to 0".to_string())
    }

    /// Products priced above the threshold, in store order, categories
    /// resolved. The result is still queryable by the caller.
    pub async fn expensive_products(&self) -> Result<Vec<Product>> {
        let expensive = self
            .store
            .list_products()
            .await?
            .into_iter()
            .filter(|p| p.price > EXPENSIVE_THRESHOLD)
            .collect();
        self.resolve_categories(expensive).await
    }

    async fn resolve_categories(&self, mut products: Vec<Product>) -> Result<Vec<Product>> {
        let categories: HashMap<Id, Category> = self
            .store
            .list_categories()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        for product in &mut products {
            // Dangling CategoryId resolves to nothing, by design
            product.category = categories.get(&product.category_id).cloned();
        }
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CategoryStore, MemoryStore};

    fn input(name: &str, price: f64, category_id: Id) -> ProductInput {
        ProductInput {
            id: None,
            name: name.to_string(),
            price,
            category_id,
        }
    }

    async fn seeded_service() -> ProductService<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_category(Category::new(1, "Electronics"))
            .await
            .unwrap();
        let service = ProductService::new(store);
        service.create_product(input("Laptop", 999.99, 1)).await.unwrap();
        service.create_product(input("Cable", 9.99, 1)).await.unwrap();
        service
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let service = seeded_service().await;
        let created = service.create_product(input("Mouse", 29.99, 1)).await.unwrap();

        let fetched = service.get_product(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Mouse");
        assert_eq!(fetched.price, 29.99);
        assert_eq!(fetched.category_id, 1);
        assert_eq!(fetched.category.as_ref().unwrap().name, "Electronics");
    }

    #[tokio::test]
    async fn list_resolves_categories() {
        let service = seeded_service().await;
        let products = service.list_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| p.category.is_some()));
    }

    #[tokio::test]
    async fn dangling_category_resolves_to_none() {
        let service = seeded_service().await;
        let orphan = service.create_product(input("Orphan", 1.0, 99)).await.unwrap();
        let fetched = service.get_product(orphan.id).await.unwrap().unwrap();
        assert!(fetched.category.is_none());
    }

    #[tokio::test]
    async fn update_missing_id_echoes_input_without_creating() {
        let service = seeded_service().await;
        let echoed = service.update_product(42, input("Ghost", 5.0, 1)).await.unwrap();
        assert_eq!(echoed.id, 42);
        assert_eq!(echoed.name, "Ghost");
        assert!(service.get_product(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expensive_products_applies_threshold() {
        let service = seeded_service().await;
        let expensive = service.expensive_products().await.unwrap();
        assert_eq!(expensive.len(), 1);
        assert_eq!(expensive[0].name, "Laptop");
    }

    #[tokio::test]
    async fn reset_prices_returns_status_text() {
        let service = seeded_service().await;
        let status = service.reset_prices().await.unwrap();
        assert_eq!(status, "All prices have been reset to 0");
        assert!(service
            .list_products()
            .await
            .unwrap()
            .iter()
            .all(|p| p.price == 0.0));
    }
}
