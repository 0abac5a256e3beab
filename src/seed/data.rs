use anyhow::Result;

use crate::model::{Category, Id, ProductInput};
use crate::store::Store;

fn seed_product(id: Id, name: &str, price: f64, category_id: Id) -> ProductInput {
    ProductInput {
        id: Some(id),
        name: name.to_string(),
        price,
        category_id,
    }
}

/// Seed the demo catalog: two categories and five products. Skipped when
/// the store already has categories, so restarts against a persistent
/// backend stay idempotent.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    if !store.list_categories().await?.is_empty() {
        log::info!("store already seeded, skipping");
        return Ok(());
    }

    store.upsert_category(Category::new(1, "Electronics")).await?;
    store.upsert_category(Category::new(2, "Books")).await?;

    let products = [
        seed_product(1, "Laptop", 999.99, 1),
        seed_product(2, "Smartphone", 599.99, 1),
        seed_product(3, "Tablet", 399.99, 1),
        seed_product(4, "The Pragmatic Programmer", 49.99, 2),
        seed_product(5, "Domain-Driven Design", 59.99, 2),
    ];
    for product in products {
        store.insert_product(product).await?;
    }

    log::info!("seeded 2 categories and 5 products");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CategoryStore, MemoryStore, ProductStore};

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();
        load_seed_data(&store).await.unwrap();

        assert_eq!(store.list_categories().await.unwrap().len(), 2);
        assert_eq!(store.list_products().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn electronics_has_three_products() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();

        let names: Vec<String> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.category_id == 1)
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Laptop", "Smartphone", "Tablet"]);
    }
}
