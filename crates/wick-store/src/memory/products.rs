use super::{load_all, MemoryStore};
use crate::repo::ProductRepository;
use crate::{store_key, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use wick_commerce::catalog::Product;
use wick_commerce::ids::ProductId;

fn product_key(id: &ProductId) -> String {
    store_key!("product", id)
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn get(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        self.kv.get(&product_key(id))
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self.kv.transact(|txn| load_all(txn, "product:"))?;
        products.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn upsert(&self, product: Product) -> Result<Product, StoreError> {
        self.kv.set(&product_key(&product.id), &product)?;
        Ok(product)
    }

    async fn decrement_inventory(&self, lines: &[(ProductId, i64)]) -> Result<(), StoreError> {
        self.kv.transact(|txn| {
            for (product_id, quantity) in lines {
                let key = product_key(product_id);
                let mut product: Product = txn.get(&key)?.ok_or_else(|| StoreError::NotFound {
                    entity: "product",
                    id: product_id.to_string(),
                })?;
                if !product.inventory.decrement(*quantity) {
                    return Err(StoreError::InsufficientStock(product.name));
                }
                product.updated_at = Utc::now();
                txn.put(&key, &product)?;
            }
            Ok(())
        })?;
        tracing::debug!(lines = lines.len(), "inventory decremented");
        Ok(())
    }

    async fn restock(&self, lines: &[(ProductId, i64)]) -> Result<(), StoreError> {
        self.kv.transact(|txn| {
            for (product_id, quantity) in lines {
                let key = product_key(product_id);
                let Some(mut product) = txn.get::<Product>(&key)? else {
                    continue;
                };
                product.inventory.restock(*quantity);
                product.updated_at = Utc::now();
                txn.put(&key, &product)?;
            }
            Ok(())
        })
    }
}
