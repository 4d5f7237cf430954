//! Catalog service.

use async_trait::async_trait;
use mockall::automock;
use sankalpa::orders::StockDecrement;
use tracing::info;

use crate::{
    database::Db,
    domain::catalog::{
        errors::CatalogServiceError,
        data::NewProduct,
        records::{ProductRecord, ProductUuid},
        repository::PgCatalogRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgCatalogService {
    db: Db,
    repository: PgCatalogRepository,
}

impl PgCatalogService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCatalogRepository::new(),
        }
    }
}

#[async_trait]
impl CatalogService for PgCatalogService {
    #[tracing::instrument(
        name = "catalog.service.create_product",
        skip(self, product),
        fields(product_uuid = %product.uuid),
        err
    )]
    async fn create_product(
        &self,
        product: NewProduct,
    ) -> Result<ProductRecord, CatalogServiceError> {
        if product.name.trim().is_empty() {
            return Err(CatalogServiceError::MissingRequiredData);
        }

        let mut tx = self.db.begin().await?;

        let created = self.repository.create_product(&mut tx, product).await?;

        tx.commit().await?;

        info!(product_uuid = %created.uuid, "created product");

        Ok(created)
    }

    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let product = self.repository.get_product(&mut tx, product).await?;

        tx.commit().await?;

        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<ProductRecord>, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let products = self.repository.list_products(&mut tx).await?;

        tx.commit().await?;

        Ok(products)
    }

    #[tracing::instrument(
        name = "catalog.service.decrement_stock",
        skip(self),
        fields(product_uuid = %product),
        err
    )]
    async fn decrement_stock(
        &self,
        product: ProductUuid,
        quantity: u64,
    ) -> Result<StockDecrement, CatalogServiceError> {
        let mut tx = self.db.begin().await?;

        let decrement = self
            .repository
            .decrement_stock(&mut tx, product, quantity)
            .await?;

        tx.commit().await?;

        Ok(decrement)
    }
}

#[automock]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Creates a new product.
    async fn create_product(&self, product: NewProduct)
    -> Result<ProductRecord, CatalogServiceError>;

    /// Retrieve a single product with its live price and stock.
    async fn get_product(&self, product: ProductUuid) -> Result<ProductRecord, CatalogServiceError>;

    /// Retrieves all products.
    async fn list_products(&self) -> Result<Vec<ProductRecord>, CatalogServiceError>;

    /// Take units out of stock. Stock never goes below zero; any shortfall is reported.
    async fn decrement_stock(
        &self,
        product: ProductUuid,
        quantity: u64,
    ) -> Result<StockDecrement, CatalogServiceError>;
}
