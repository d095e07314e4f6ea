//! Catalog seam
//!
//! The engine reads the product -> vendor mapping and unit prices at
//! order-creation time only. Catalog management itself lives outside the
//! engine; this is the read-only dependency it consumes.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use vendra_types::{ProductId, Result, VendorId, VendraError};

/// What the engine needs to know about a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub vendor: VendorId,
    pub name: String,
    pub unit_price: Decimal,
}

/// Read-only catalog lookup
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve a product's vendor and current unit price
    async fn product(&self, id: &ProductId) -> Result<ProductInfo>;
}

/// In-memory catalog, used by tests and demos
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, ProductInfo>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product: ProductInfo) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }
}

#[async_trait::async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, id: &ProductId) -> Result<ProductInfo> {
        let products = self.products.read().await;
        products
            .get(id)
            .cloned()
            .ok_or_else(|| VendraError::ProductNotFound {
                product: id.to_string(),
            })
    }
}
