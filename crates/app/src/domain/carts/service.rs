//! Carts service.

use async_trait::async_trait;
use mockall::automock;
use sankalpa::pricing::line_total;
use tracing::info;

use crate::{
    database::Db,
    domain::{
        carts::{
            errors::CartsServiceError,
            data::CartView,
            records::{CartLineRecord, CartLineUuid},
            repository::PgCartsRepository,
        },
        catalog::{records::ProductUuid, repository::PgCatalogRepository},
        users::records::UserUuid,
    },
};

#[derive(Debug, Clone)]
pub struct PgCartsService {
    db: Db,
    carts: PgCartsRepository,
    catalog: PgCatalogRepository,
}

impl PgCartsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            carts: PgCartsRepository::new(),
            catalog: PgCatalogRepository::new(),
        }
    }
}

#[async_trait]
impl CartsService for PgCartsService {
    #[tracing::instrument(
        name = "carts.service.add",
        skip(self),
        fields(user_uuid = %user, product_uuid = %product),
        err
    )]
    async fn add(
        &self,
        user: UserUuid,
        product: ProductUuid,
    ) -> Result<CartLineRecord, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let Some(product) = self.catalog.find_product(&mut tx, product).await? else {
            return Err(CartsServiceError::ProductNotFound);
        };

        if product.stock == 0 {
            return Err(CartsServiceError::OutOfStock);
        }

        if self
            .carts
            .find_active_line_for_product(&mut tx, user, product.uuid)
            .await?
            .is_some()
        {
            return Err(CartsServiceError::AlreadyInCart);
        }

        // A concurrent add that wins the race trips the partial unique index instead.
        let line = self
            .carts
            .create_line(&mut tx, CartLineUuid::new(), user, product.uuid)
            .await?;

        tx.commit().await?;

        info!(cart_line_uuid = %line.uuid, "added product to cart");

        Ok(line)
    }

    #[tracing::instrument(
        name = "carts.service.update_quantity",
        skip(self),
        fields(user_uuid = %user, cart_line_uuid = %line),
        err
    )]
    async fn update_quantity(
        &self,
        user: UserUuid,
        line: CartLineUuid,
        quantity: u64,
    ) -> Result<CartLineRecord, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let line = self.carts.lock_active_line(&mut tx, user, line).await?;

        if quantity < 1 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        let product = self.catalog.get_product(&mut tx, line.product).await?;

        if quantity > product.stock {
            return Err(CartsServiceError::InsufficientStock {
                requested: quantity,
                available: product.stock,
            });
        }

        let updated = self.carts.update_quantity(&mut tx, line.uuid, quantity).await?;

        tx.commit().await?;

        Ok(updated)
    }

    #[tracing::instrument(
        name = "carts.service.remove",
        skip(self),
        fields(user_uuid = %user, cart_line_uuid = %line),
        err
    )]
    async fn remove(&self, user: UserUuid, line: CartLineUuid) -> Result<(), CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let rows_affected = self.carts.delete_line(&mut tx, user, line).await?;

        if rows_affected == 0 {
            return Err(CartsServiceError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    async fn view(&self, user: UserUuid) -> Result<CartView, CartsServiceError> {
        let mut tx = self.db.begin().await?;

        let lines = self.carts.list_active_lines(&mut tx, user).await?;

        tx.commit().await?;

        let total = line_total(lines.iter().map(|line| (line.unit_price, line.quantity)))?;

        Ok(CartView { lines, total })
    }
}

#[automock]
#[async_trait]
pub trait CartsService: Send + Sync {
    /// Add one unit of a product to the user's cart.
    async fn add(
        &self,
        user: UserUuid,
        product: ProductUuid,
    ) -> Result<CartLineRecord, CartsServiceError>;

    /// Change the quantity of an active cart line.
    async fn update_quantity(
        &self,
        user: UserUuid,
        line: CartLineUuid,
        quantity: u64,
    ) -> Result<CartLineRecord, CartsServiceError>;

    /// Delete an active cart line.
    async fn remove(&self, user: UserUuid, line: CartLineUuid) -> Result<(), CartsServiceError>;

    /// Active lines priced against the live catalog.
    async fn view(&self, user: UserUuid) -> Result<CartView, CartsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::{
        TestContext,
        helpers::{create_product, create_user},
    };

    use super::*;

    #[tokio::test]
    async fn add_creates_line_with_quantity_one() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 5).await?;

        let line = ctx.carts.add(user.uuid, product.uuid).await?;

        assert_eq!(line.user, user.uuid);
        assert_eq!(line.product, product.uuid);
        assert_eq!(line.quantity, 1);
        assert!(line.active);

        Ok(())
    }

    #[tokio::test]
    async fn add_same_product_twice_returns_already_in_cart() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 5).await?;

        ctx.carts.add(user.uuid, product.uuid).await?;

        let result = ctx.carts.add(user.uuid, product.uuid).await;

        assert!(
            matches!(result, Err(CartsServiceError::AlreadyInCart)),
            "expected AlreadyInCart, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_adds_leave_one_line() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 5).await?;

        let (a, b) = tokio::join!(
            ctx.carts.add(user.uuid, product.uuid),
            ctx.carts.add(user.uuid, product.uuid)
        );

        assert!(a.is_ok() != b.is_ok(), "expected exactly one add to succeed");

        for result in [a, b] {
            if let Err(error) = result {
                assert!(
                    matches!(error, CartsServiceError::AlreadyInCart),
                    "expected AlreadyInCart, got {error:?}"
                );
            }
        }

        assert_eq!(ctx.carts.view(user.uuid).await?.lines.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn add_out_of_stock_product_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Sold Out", 100_00, 0).await?;

        let result = ctx.carts.add(user.uuid, product.uuid).await;

        assert!(
            matches!(result, Err(CartsServiceError::OutOfStock)),
            "expected OutOfStock, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn add_unknown_product_returns_product_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;

        let result = ctx.carts.add(user.uuid, ProductUuid::new()).await;

        assert!(
            matches!(result, Err(CartsServiceError::ProductNotFound)),
            "expected ProductNotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_quantity_within_stock() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 5).await?;
        let line = ctx.carts.add(user.uuid, product.uuid).await?;

        let updated = ctx.carts.update_quantity(user.uuid, line.uuid, 5).await?;

        assert_eq!(updated.quantity, 5);

        Ok(())
    }

    #[tokio::test]
    async fn update_quantity_beyond_stock_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 3).await?;
        let line = ctx.carts.add(user.uuid, product.uuid).await?;

        let result = ctx.carts.update_quantity(user.uuid, line.uuid, 4).await;

        assert!(
            matches!(
                result,
                Err(CartsServiceError::InsufficientStock {
                    requested: 4,
                    available: 3
                })
            ),
            "expected InsufficientStock, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_quantity_to_zero_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 3).await?;
        let line = ctx.carts.add(user.uuid, product.uuid).await?;

        let result = ctx.carts.update_quantity(user.uuid, line.uuid, 0).await;

        assert!(
            matches!(result, Err(CartsServiceError::InvalidQuantity)),
            "expected InvalidQuantity, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn another_users_line_is_not_found() -> TestResult {
        let ctx = TestContext::new().await;
        let owner = create_user(&ctx, "owner@example.com", 0).await?;
        let other = create_user(&ctx, "other@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 3).await?;
        let line = ctx.carts.add(owner.uuid, product.uuid).await?;

        let update = ctx.carts.update_quantity(other.uuid, line.uuid, 2).await;
        let remove = ctx.carts.remove(other.uuid, line.uuid).await;

        assert!(
            matches!(update, Err(CartsServiceError::NotFound)),
            "expected NotFound, got {update:?}"
        );
        assert!(
            matches!(remove, Err(CartsServiceError::NotFound)),
            "expected NotFound, got {remove:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn remove_deletes_line() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let product = create_product(&ctx, "Notebook", 100_00, 3).await?;
        let line = ctx.carts.add(user.uuid, product.uuid).await?;

        ctx.carts.remove(user.uuid, line.uuid).await?;

        assert!(ctx.carts.view(user.uuid).await?.lines.is_empty());

        let again = ctx.carts.remove(user.uuid, line.uuid).await;

        assert!(
            matches!(again, Err(CartsServiceError::NotFound)),
            "expected NotFound, got {again:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn view_prices_lines_live() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, "hari@example.com", 0).await?;
        let notebook = create_product(&ctx, "Notebook", 100_00, 5).await?;
        let incense = create_product(&ctx, "Incense", 25_50, 5).await?;

        let line = ctx.carts.add(user.uuid, notebook.uuid).await?;
        ctx.carts.add(user.uuid, incense.uuid).await?;
        ctx.carts.update_quantity(user.uuid, line.uuid, 2).await?;

        let cart = ctx.carts.view(user.uuid).await?;

        assert_eq!(cart.lines.len(), 2);
        assert_eq!(cart.total, 225_50);
        assert!(cart.lines.iter().any(|l| l.line_total == 200_00));

        Ok(())
    }
}
