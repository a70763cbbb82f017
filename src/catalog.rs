//! Product catalog maintenance: seeding inventory and editing products.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::domain::{NewProduct, Product, ProductId, ProductPatch};
use crate::store::{Storage, StoreError};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => CatalogError::ProductNotFound(id),
            StoreError::Validation(reason) => CatalogError::Validation(reason),
            other => CatalogError::Storage(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Clone)]
pub struct ProductCatalog {
    store: Arc<dyn Storage>,
}

impl ProductCatalog {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> CatalogResult<Product> {
        if let Err(reason) = product.validate() {
            warn!(%reason, "Product rejected");
            return Err(CatalogError::Validation(reason));
        }
        let product = self.store.insert_product(product).await?;
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Applies a partial update. An empty patch is a validation error.
    #[instrument(skip(self))]
    pub async fn update_product(&self, id: ProductId, patch: ProductPatch) -> CatalogResult<Product> {
        patch.validate().map_err(CatalogError::Validation)?;
        let product = self.store.update_product(id, patch).await?;
        info!("Product updated");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> CatalogResult<Product> {
        Ok(self.store.product(id).await?)
    }

    /// All products, newest first.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> CatalogResult<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_framework::create_mock_store;
    use crate::store::StoreActor;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;

    fn spawn_catalog() -> ProductCatalog {
        let (actor, store) = StoreActor::new(16, Duration::from_secs(5));
        tokio::spawn(actor.run());
        ProductCatalog::new(Arc::new(store))
    }

    #[tokio::test]
    async fn invalid_products_are_rejected_before_the_store() {
        let (store, mut receiver) = create_mock_store(4);
        let catalog = ProductCatalog::new(Arc::new(store));

        for bad in [
            NewProduct::new("", dec!(1), 1),
            NewProduct::new("Lamp", dec!(0), 1),
            NewProduct::new("Lamp", dec!(1), -1),
        ] {
            assert!(matches!(catalog.create_product(bad).await, Err(CatalogError::Validation(_))));
        }
        assert_eq!(
            catalog.update_product(ProductId::new(), ProductPatch::default()).await,
            Err(CatalogError::Validation("no fields to update".to_string()))
        );
        assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn create_update_and_list() {
        let catalog = spawn_catalog();
        let lamp = catalog.create_product(NewProduct::new("Lamp", dec!(30), 4)).await.unwrap();
        let chair = catalog.create_product(NewProduct::new("Chair", dec!(75.50), 2)).await.unwrap();

        let patch = ProductPatch {
            price: Some(dec!(35)),
            ..Default::default()
        };
        let updated = catalog.update_product(lamp.id, patch).await.unwrap();
        assert_eq!(updated.price, dec!(35));
        assert_eq!(updated.stock, 4);
        assert!(updated.updated_at >= lamp.updated_at);

        let listed: Vec<_> = catalog.list_products().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![chair.id, lamp.id]);
    }

    #[tokio::test]
    async fn missing_product_maps_to_not_found() {
        let catalog = spawn_catalog();
        let missing = ProductId::new();
        assert_eq!(catalog.get_product(missing).await, Err(CatalogError::ProductNotFound(missing)));

        let patch = ProductPatch {
            stock: Some(3),
            ..Default::default()
        };
        assert_eq!(
            catalog.update_product(missing, patch).await,
            Err(CatalogError::ProductNotFound(missing))
        );
    }
}
