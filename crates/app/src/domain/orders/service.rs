//! Orders service.
//!
//! Checkout turns the active cart into a `pending` order and hands back a signed gateway form.
//! A verified callback settles the order exactly once: stock, cart lines, the used discount and
//! the points award all change in the same transaction as the status. A failed or abandoned
//! payment deletes the pending order instead.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use sankalpa::{
    discounts::{DiscountCandidate, select_active_discount},
    gateway::{PaymentGateway, PaymentRequest},
    loyalty::points_awarded,
    orders::{OrderStatus, OrderToken, Settlement, VerificationFailure},
    pricing::{PriceRequest, PricingError, line_total, price},
};
use smallvec::SmallVec;
use sqlx::{Connection, Postgres, Transaction};
use tracing::{info, warn};

use crate::{
    config::SettlementConfig,
    database::{Db, is_unique_violation_on},
    domain::{
        carts::{records::CartLineUuid, repository::PgCartsRepository},
        catalog::repository::PgCatalogRepository,
        discounts::{
            records::{UserDiscountRecord, UserDiscountUuid},
            repository::PgDiscountsRepository,
        },
        orders::{
            data::{
                CheckoutOutcome, CheckoutRequest, ConfirmOutcome, NewOrder, NewOrderLine,
                OrderDetails, TokenSource,
            },
            errors::OrdersServiceError,
            records::{OrderLineUuid, OrderRecord, OrderUuid},
            repository::{ORDER_TOKEN_UNIQUE_CONSTRAINT, PgOrdersRepository},
        },
        users::{records::UserUuid, repository::PgUsersRepository},
    },
    notifications::ReceiptNotifier,
};

#[derive(Clone)]
pub struct PgOrdersService {
    db: Db,
    config: SettlementConfig,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn ReceiptNotifier>,
    token_source: TokenSource,
    orders: PgOrdersRepository,
    users: PgUsersRepository,
    carts: PgCartsRepository,
    catalog: PgCatalogRepository,
    discounts: PgDiscountsRepository,
}

impl std::fmt::Debug for PgOrdersService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgOrdersService")
            .field("db", &self.db)
            .field("config", &self.config)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

impl PgOrdersService {
    #[must_use]
    pub fn new(
        db: Db,
        config: SettlementConfig,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn ReceiptNotifier>,
    ) -> Self {
        Self {
            db,
            config,
            gateway,
            notifier,
            token_source: OrderToken::generate,
            orders: PgOrdersRepository::new(),
            users: PgUsersRepository::new(),
            carts: PgCartsRepository::new(),
            catalog: PgCatalogRepository::new(),
            discounts: PgDiscountsRepository::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_token_source(mut self, token_source: TokenSource) -> Self {
        self.token_source = token_source;
        self
    }

    /// Insert the order under a fresh token, regenerating on collision.
    async fn insert_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder,
    ) -> Result<OrderRecord, OrdersServiceError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let token = (self.token_source)();
            let mut savepoint = Connection::begin(&mut **tx).await?;

            match self.orders.create_order(&mut savepoint, order, &token).await {
                Ok(created) => {
                    savepoint.commit().await?;

                    return Ok(created);
                }
                Err(error) if is_unique_violation_on(&error, ORDER_TOKEN_UNIQUE_CONSTRAINT) => {
                    savepoint.rollback().await?;

                    warn!(attempt, "order token collision, regenerating");

                    if attempt >= self.config.order_token_attempts {
                        return Err(OrdersServiceError::TokenExhausted { attempts: attempt });
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Delete a pending order, releasing its discount and applying the cancellation policy.
    async fn cancel(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &OrderRecord,
    ) -> Result<(), OrdersServiceError> {
        self.discounts.release_discount(tx, order.uuid).await?;

        let restored = self
            .config
            .cancellation_policy
            .points_restored(order.points_redeemed);

        if restored > 0 {
            self.users.add_points(tx, order.user, restored).await?;
        }

        if self.orders.delete_order(tx, order.uuid).await? == 0 {
            return Err(OrdersServiceError::AlreadyCompleted);
        }

        info!(
            order_uuid = %order.uuid,
            points_restored = restored,
            "cancelled order"
        );

        Ok(())
    }

    async fn details(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderRecord,
    ) -> Result<OrderDetails, OrdersServiceError> {
        let lines = self.orders.list_order_lines(tx, order.uuid).await?;

        Ok(OrderDetails { order, lines })
    }

    async fn send_receipt(&self, email: &str, details: &OrderDetails) {
        let receipt = details.receipt(email);

        if let Err(error) = self.notifier.send_order_receipt(email, &receipt).await {
            warn!(
                order_uuid = %details.order.uuid,
                error = %error,
                "failed to send order receipt"
            );
        }
    }
}

fn user_not_found(error: sqlx::Error) -> OrdersServiceError {
    match error {
        sqlx::Error::RowNotFound => OrdersServiceError::UserNotFound,
        other => other.into(),
    }
}

#[async_trait]
impl OrdersService for PgOrdersService {
    #[tracing::instrument(
        name = "orders.service.checkout",
        skip(self, request),
        fields(
            user_uuid = %user,
            points_redeemed = request.points_redeemed,
            order_uuid = tracing::field::Empty
        ),
        err
    )]
    async fn checkout(
        &self,
        user: UserUuid,
        request: CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutOutcome, OrdersServiceError> {
        request.shipping_address.validate()?;

        let mut tx = self.db.begin().await?;

        let locked = self
            .users
            .lock_user(&mut tx, user)
            .await
            .map_err(user_not_found)?;

        let lines = self.carts.list_active_lines(&mut tx, user).await?;

        if lines.is_empty() {
            return Err(OrdersServiceError::EmptyCart);
        }

        let cart_total = line_total(lines.iter().map(|line| (line.unit_price, line.quantity)))?;

        let candidates: Vec<DiscountCandidate<UserDiscountUuid>> = self
            .discounts
            .lock_discount_candidates(&mut tx, user, now)
            .await?
            .iter()
            .map(UserDiscountRecord::candidate)
            .collect();

        let discount = select_active_discount(&candidates, now).copied();

        let breakdown = price(PriceRequest {
            cart_total,
            discount_percentage: discount.map(|discount| discount.percentage),
            points_balance: locked.points,
            points_redeemed: request.points_redeemed,
        })?;

        let new_order = NewOrder {
            uuid: OrderUuid::new(),
            user,
            breakdown,
            payment_method: request.payment_method,
            shipping_address: request.shipping_address,
            used_discount: discount.map(|discount| discount.key),
        };

        let order = self.insert_order(&mut tx, &new_order).await?;

        tracing::Span::current().record("order_uuid", tracing::field::display(order.uuid));

        let mut order_lines = Vec::with_capacity(lines.len());

        for (line_number, line) in (0_u32..).zip(lines) {
            let created = self
                .orders
                .create_order_line(
                    &mut tx,
                    NewOrderLine {
                        uuid: OrderLineUuid::new(),
                        order: order.uuid,
                        line_number,
                        product: line.product,
                        cart_line: line.uuid,
                        product_name: line.product_name,
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                    },
                )
                .await?;

            order_lines.push(created);
        }

        if breakdown.points_redeemed > 0 {
            self.users
                .deduct_points(&mut tx, user, breakdown.points_redeemed)
                .await
                .map_err(|error| match error {
                    sqlx::Error::RowNotFound => {
                        OrdersServiceError::Pricing(PricingError::InsufficientPoints {
                            requested: breakdown.points_redeemed,
                            available: locked.points,
                        })
                    }
                    other => OrdersServiceError::from(other),
                })?;
        }

        if let Some(discount) = discount
            && self
                .discounts
                .reserve_discount(&mut tx, discount.key, order.uuid)
                .await?
                == 0
        {
            return Err(OrdersServiceError::DiscountReserved);
        }

        let payment = self
            .gateway
            .create_signature(&PaymentRequest {
                total_amount: breakdown.final_price,
                transaction_uuid: order.token.to_string(),
                success_url: self.config.success_url(order.uuid),
                failure_url: self.config.failure_url(order.uuid),
            })
            .map_err(OrdersServiceError::Gateway)?;

        tx.commit().await?;

        info!(
            order_token = %order.token,
            final_price = order.final_price,
            "order pending payment"
        );

        Ok(CheckoutOutcome {
            order: OrderDetails {
                order,
                lines: order_lines,
            },
            payment,
        })
    }

    #[tracing::instrument(
        name = "orders.service.confirm_payment",
        skip(self, callback_data),
        fields(order_uuid = %order),
        err
    )]
    async fn confirm_payment(
        &self,
        order: OrderUuid,
        callback_data: &str,
    ) -> Result<ConfirmOutcome, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.orders.lock_order(&mut tx, order).await?;

        let verified = self
            .gateway
            .verify_signature(callback_data)
            .and_then(|callback| callback.ensure_settles(order.token.as_str(), order.final_price));

        if let Err(error) = verified {
            match self.config.signature_policy.on_failure(order.status) {
                VerificationFailure::CancelAndReject => {
                    warn!(error = %error, "payment callback rejected, cancelling order");

                    self.cancel(&mut tx, &order).await?;

                    tx.commit().await?;

                    return Err(OrdersServiceError::SignatureInvalid(error));
                }
                VerificationFailure::Reject => {
                    warn!(error = %error, "payment callback rejected for settled order");

                    return Err(OrdersServiceError::SignatureInvalid(error));
                }
                VerificationFailure::Proceed => {
                    warn!(error = %error, "payment callback failed verification, settling anyway");
                }
            }
        }

        if order.status.settlement() == Settlement::AlreadySettled {
            let details = self.details(&mut tx, order).await?;

            tx.commit().await?;

            info!("order already settled");

            return Ok(ConfirmOutcome::AlreadySettled(details));
        }

        let now = Timestamp::now();
        let lines = self.orders.list_order_lines(&mut tx, order.uuid).await?;

        for line in &lines {
            self.catalog
                .decrement_stock(&mut tx, line.product, line.quantity)
                .await?;
        }

        let cart_lines: SmallVec<[CartLineUuid; 8]> =
            lines.iter().filter_map(|line| line.cart_line).collect();

        self.carts.deactivate_lines(&mut tx, &cart_lines).await?;

        if let Some(discount) = order.used_discount {
            self.discounts.expire_discount(&mut tx, discount, now).await?;
        }

        let awarded = points_awarded(order.final_price);

        if awarded > 0 {
            self.users.add_points(&mut tx, order.user, awarded).await?;
        }

        let Some(completed) = self.orders.complete_order(&mut tx, order.uuid, now).await? else {
            return Err(OrdersServiceError::AlreadyCompleted);
        };

        let customer = self.users.get_user(&mut tx, completed.user).await?;

        tx.commit().await?;

        info!(
            order_token = %completed.token,
            points_awarded = awarded,
            "order settled"
        );

        let details = OrderDetails {
            order: completed,
            lines,
        };

        self.send_receipt(&customer.email, &details).await;

        Ok(ConfirmOutcome::Settled(details))
    }

    #[tracing::instrument(
        name = "orders.service.fail_payment",
        skip(self),
        fields(user_uuid = %user, order_uuid = %order),
        err
    )]
    async fn fail_payment(&self, user: UserUuid, order: OrderUuid) -> Result<(), OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.orders.lock_user_order(&mut tx, order, user).await?;

        if order.status == OrderStatus::Completed {
            return Err(OrdersServiceError::AlreadyCompleted);
        }

        self.cancel(&mut tx, &order).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn get_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderDetails, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let order = self.orders.get_order(&mut tx, order, user).await?;
        let details = self.details(&mut tx, order).await?;

        tx.commit().await?;

        Ok(details)
    }

    async fn list_orders(&self, user: UserUuid) -> Result<Vec<OrderRecord>, OrdersServiceError> {
        let mut tx = self.db.begin().await?;

        let orders = self.orders.list_orders(&mut tx, user).await?;

        tx.commit().await?;

        Ok(orders)
    }
}

#[automock]
#[async_trait]
pub trait OrdersService: Send + Sync {
    /// Turn the user's active cart into a pending order and sign the gateway form for it.
    ///
    /// Points are deducted and the applied discount reserved immediately. Stock and cart lines
    /// are left alone until the payment is confirmed.
    async fn checkout(
        &self,
        user: UserUuid,
        request: CheckoutRequest,
        now: Timestamp,
    ) -> Result<CheckoutOutcome, OrdersServiceError>;

    /// Settle an order from the gateway's success callback. Repeated callbacks are no-ops.
    async fn confirm_payment(
        &self,
        order: OrderUuid,
        callback_data: &str,
    ) -> Result<ConfirmOutcome, OrdersServiceError>;

    /// Cancel a pending order after a failed or abandoned payment.
    async fn fail_payment(&self, user: UserUuid, order: OrderUuid) -> Result<(), OrdersServiceError>;

    /// Retrieve one of the user's orders with its lines.
    async fn get_order(
        &self,
        user: UserUuid,
        order: OrderUuid,
    ) -> Result<OrderDetails, OrdersServiceError>;

    /// The user's orders, newest first.
    async fn list_orders(&self, user: UserUuid) -> Result<Vec<OrderRecord>, OrdersServiceError>;
}

#[cfg(test)]
mod tests {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use sankalpa::{
        gateway::{
            EsewaGateway, GatewayConfig, GatewaySecret, STATUS_COMPLETE, SignatureError,
        },
        orders::{CancellationPolicy, OrderValueError, SignaturePolicy},
    };
    use testresult::TestResult;

    use crate::{
        domain::{
            carts::CartsService,
            catalog::{CatalogService, records::ProductUuid},
            discounts::DiscountsService,
            users::UsersService,
        },
        notifications::{MockReceiptNotifier, NotificationError},
        test::{
            TestContext,
            helpers::{
                add_to_cart, checkout_request, create_product, create_user, grant_discount,
                payment_callback,
            },
        },
    };

    use super::*;

    const EMAIL: &str = "hari@example.com";

    fn fixed_token() -> OrderToken {
        OrderToken::from_stored("AAAAAAAA".to_string())
    }

    fn notifier_expecting_one_receipt() -> Arc<MockReceiptNotifier> {
        let mut notifier = MockReceiptNotifier::new();

        notifier
            .expect_send_order_receipt()
            .once()
            .withf(|recipient, receipt| *recipient == EMAIL && receipt.final_price == 170_00)
            .returning(|_, _| Ok(()));

        Arc::new(notifier)
    }

    /// Two units at 100.00, a 10% discount and 100 points: pays 170.00.
    async fn discounted_checkout(
        ctx: &TestContext,
    ) -> TestResult<(UserUuid, ProductUuid, UserDiscountUuid, CheckoutOutcome)> {
        let user = create_user(ctx, EMAIL, 100).await?;
        let product = create_product(ctx, "Brass Diyo", 100_00, 5).await?;
        let discount = grant_discount(ctx, user.uuid, 10, 30).await?;

        add_to_cart(ctx, user.uuid, product.uuid, 2).await?;

        let outcome = ctx
            .orders
            .checkout(user.uuid, checkout_request(100), Timestamp::now())
            .await?;

        Ok((user.uuid, product.uuid, discount.uuid, outcome))
    }

    #[tokio::test]
    async fn checkout_without_discount_or_points() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 2).await?;

        let outcome = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await?;

        let order = &outcome.order.order;

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price, 200_00);
        assert_eq!(order.discount_percentage, 0);
        assert_eq!(order.final_price, 200_00);
        assert!(order.used_discount.is_none());
        assert_eq!(outcome.order.lines.len(), 1);
        assert_eq!(outcome.order.lines[0].quantity, 2);
        assert_eq!(outcome.order.lines[0].unit_price, 100_00);
        assert_eq!(outcome.payment.field("total_amount"), Some("200"));
        assert_eq!(
            outcome.payment.field("transaction_uuid"),
            Some(order.token.as_str())
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_with_discount() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;
        let discount = grant_discount(&ctx, user.uuid, 10, 30).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 2).await?;

        let outcome = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await?;

        let order = &outcome.order.order;

        assert_eq!(order.discount_percentage, 10);
        assert_eq!(order.discount_amount, 20_00);
        assert_eq!(order.final_price, 180_00);
        assert_eq!(order.used_discount, Some(discount.uuid));

        let reserved = ctx.discounts.get_discount(discount.uuid).await?;

        assert_eq!(reserved.reserved_order, Some(order.uuid));

        Ok(())
    }

    #[tokio::test]
    async fn checkout_with_discount_and_points_deducts_points() -> TestResult {
        let ctx = TestContext::new().await;

        let (user, _, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        assert_eq!(order.points_redeemed, 100);
        assert_eq!(order.point_discount, 10_00);
        assert_eq!(order.final_price, 170_00);
        assert_eq!(outcome.payment.field("total_amount"), Some("170"));
        assert_eq!(ctx.users.get_user(user).await?.points, 0);

        Ok(())
    }

    #[tokio::test]
    async fn checkout_picks_latest_expiring_discount() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        grant_discount(&ctx, user.uuid, 25, 1).await?;
        let long = grant_discount(&ctx, user.uuid, 10, 10).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let outcome = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await?;

        assert_eq!(outcome.order.order.used_discount, Some(long.uuid));
        assert_eq!(outcome.order.order.discount_percentage, 10);

        Ok(())
    }

    #[tokio::test]
    async fn reserved_discount_is_not_applied_twice() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        grant_discount(&ctx, user.uuid, 10, 30).await?;
        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let first = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await?;
        let second = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await?;

        assert_eq!(first.order.order.discount_percentage, 10);
        assert_eq!(second.order.order.discount_percentage, 0);
        assert!(second.order.order.used_discount.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn checkout_empty_cart_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;

        let result = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::EmptyCart)),
            "expected EmptyCart, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_with_more_points_than_balance_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 50).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let result = ctx
            .orders
            .checkout(user.uuid, checkout_request(100), Timestamp::now())
            .await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::Pricing(PricingError::InsufficientPoints {
                    requested: 100,
                    available: 50
                }))
            ),
            "expected InsufficientPoints, got {result:?}"
        );
        assert_eq!(ctx.users.get_user(user.uuid).await?.points, 50);

        Ok(())
    }

    #[tokio::test]
    async fn checkout_with_points_worth_more_than_cart_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 2_000).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let result = ctx
            .orders
            .checkout(user.uuid, checkout_request(2_000), Timestamp::now())
            .await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::Pricing(
                    PricingError::ExcessiveRedemption { .. }
                ))
            ),
            "expected ExcessiveRedemption, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_with_blank_address_field_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let mut request = checkout_request(0);
        request.shipping_address.city = "  ".to_string();

        let result = ctx
            .orders
            .checkout(user.uuid, request, Timestamp::now())
            .await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::InvalidOrder(
                    OrderValueError::MissingAddressField("city")
                ))
            ),
            "expected MissingAddressField, got {result:?}"
        );
        assert!(ctx.orders.list_orders(user.uuid).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn checkout_unknown_user_returns_user_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx
            .orders
            .checkout(UserUuid::new(), checkout_request(0), Timestamp::now())
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::UserNotFound)),
            "expected UserNotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn checkout_gives_up_after_repeated_token_collisions() -> TestResult {
        let ctx = TestContext::new().await;
        let orders = ctx.orders.clone().with_token_source(fixed_token);
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        let first = create_user(&ctx, "first@example.com", 0).await?;
        let second = create_user(&ctx, "second@example.com", 0).await?;

        add_to_cart(&ctx, first.uuid, product.uuid, 1).await?;
        add_to_cart(&ctx, second.uuid, product.uuid, 1).await?;

        orders
            .checkout(first.uuid, checkout_request(0), Timestamp::now())
            .await?;

        let result = orders
            .checkout(second.uuid, checkout_request(0), Timestamp::now())
            .await;

        assert!(
            matches!(result, Err(OrdersServiceError::TokenExhausted { attempts: 3 })),
            "expected TokenExhausted, got {result:?}"
        );
        assert!(orders.list_orders(second.uuid).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn confirm_payment_settles_order() -> TestResult {
        let ctx =
            TestContext::with_settlement(SettlementConfig::default(), notifier_expecting_one_receipt())
                .await;

        let (user, product, discount, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback =
            payment_callback(&ctx.gateway, order.token.as_str(), 170_00, STATUS_COMPLETE)?;

        let confirmed = ctx.orders.confirm_payment(order.uuid, &callback).await?;

        assert!(
            matches!(confirmed, ConfirmOutcome::Settled(_)),
            "expected Settled, got {confirmed:?}"
        );

        let details = confirmed.order();

        assert_eq!(details.order.status, OrderStatus::Completed);
        assert!(details.order.completed_at.is_some());
        assert_eq!(ctx.catalog.get_product(product).await?.stock, 3);
        assert!(ctx.carts.view(user).await?.lines.is_empty());
        assert_eq!(ctx.users.get_user(user).await?.points, 17);

        let used = ctx.discounts.get_discount(discount).await?;

        assert!(used.valid_until <= Timestamp::now());
        assert!(
            ctx.discounts
                .list_active_discounts(user, Timestamp::now())
                .await?
                .is_empty()
        );

        Ok(())
    }

    #[tokio::test]
    async fn repeated_confirm_payment_is_a_no_op() -> TestResult {
        let ctx =
            TestContext::with_settlement(SettlementConfig::default(), notifier_expecting_one_receipt())
                .await;

        let (user, product, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback =
            payment_callback(&ctx.gateway, order.token.as_str(), 170_00, STATUS_COMPLETE)?;

        ctx.orders.confirm_payment(order.uuid, &callback).await?;

        let again = ctx.orders.confirm_payment(order.uuid, &callback).await?;

        assert!(
            matches!(again, ConfirmOutcome::AlreadySettled(_)),
            "expected AlreadySettled, got {again:?}"
        );
        assert_eq!(again.order().order.status, OrderStatus::Completed);
        assert_eq!(again.order().lines.len(), 1);
        assert_eq!(ctx.catalog.get_product(product).await?.stock, 3);
        assert_eq!(ctx.users.get_user(user).await?.points, 17);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_confirm_payment_settles_once() -> TestResult {
        let ctx =
            TestContext::with_settlement(SettlementConfig::default(), notifier_expecting_one_receipt())
                .await;

        let (user, product, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback =
            payment_callback(&ctx.gateway, order.token.as_str(), 170_00, STATUS_COMPLETE)?;

        let (first, second) = tokio::join!(
            ctx.orders.confirm_payment(order.uuid, &callback),
            ctx.orders.confirm_payment(order.uuid, &callback),
        );

        let outcomes = [first?, second?];

        let settled = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ConfirmOutcome::Settled(_)))
            .count();
        let already = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ConfirmOutcome::AlreadySettled(_)))
            .count();

        assert_eq!(settled, 1, "expected exactly one Settled, got {outcomes:?}");
        assert_eq!(already, 1, "expected exactly one AlreadySettled, got {outcomes:?}");
        assert_eq!(ctx.catalog.get_product(product).await?.stock, 3);
        assert_eq!(ctx.users.get_user(user).await?.points, 17);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_checkouts_cannot_spend_the_same_points() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 100).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        grant_discount(&ctx, user.uuid, 10, 30).await?;
        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let now = Timestamp::now();

        let (first, second) = tokio::join!(
            ctx.orders.checkout(user.uuid, checkout_request(100), now),
            ctx.orders.checkout(user.uuid, checkout_request(100), now),
        );

        let results = [first, second];

        let placed: Vec<&CheckoutOutcome> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let short = results
            .iter()
            .filter(|result| {
                matches!(
                    result,
                    Err(OrdersServiceError::Pricing(PricingError::InsufficientPoints {
                        requested: 100,
                        available: 0
                    }))
                )
            })
            .count();

        assert_eq!(placed.len(), 1, "expected one order, got {results:?}");
        assert_eq!(short, 1, "expected one InsufficientPoints, got {results:?}");
        assert_eq!(placed[0].order.order.points_redeemed, 100);
        assert_eq!(placed[0].order.order.discount_percentage, 10);
        assert_eq!(ctx.users.get_user(user.uuid).await?.points, 0);
        assert_eq!(ctx.orders.list_orders(user.uuid).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_checkouts_reserve_the_discount_once() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;
        let discount = grant_discount(&ctx, user.uuid, 10, 30).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let now = Timestamp::now();

        let (first, second) = tokio::join!(
            ctx.orders.checkout(user.uuid, checkout_request(0), now),
            ctx.orders.checkout(user.uuid, checkout_request(0), now),
        );

        let (first, second) = (first?, second?);

        let discounted: Vec<&OrderRecord> = [&first.order.order, &second.order.order]
            .into_iter()
            .filter(|order| order.used_discount == Some(discount.uuid))
            .collect();

        assert_eq!(discounted.len(), 1, "expected one order to use the discount");
        assert_eq!(discounted[0].final_price, 90_00);
        assert_eq!(
            ctx.discounts.get_discount(discount.uuid).await?.reserved_order,
            Some(discounted[0].uuid)
        );

        Ok(())
    }

    #[tokio::test]
    async fn checkout_form_signature_does_not_confirm_payment() -> TestResult {
        let ctx = TestContext::new().await;

        let (user, product, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;
        let form = &outcome.payment;

        let replayed = serde_json::json!({
            "transaction_code": "000AB12",
            "status": STATUS_COMPLETE,
            "total_amount": form.field("total_amount"),
            "transaction_uuid": form.field("transaction_uuid"),
            "product_code": form.field("product_code"),
            "signed_field_names": form.field("signed_field_names"),
            "signature": form.signature(),
        });

        let callback = STANDARD.encode(serde_json::to_vec(&replayed)?);

        let result = ctx.orders.confirm_payment(order.uuid, &callback).await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::SignatureInvalid(SignatureError::Forged))
            ),
            "expected Forged, got {result:?}"
        );
        assert!(ctx.orders.list_orders(user).await?.is_empty());
        assert_eq!(ctx.catalog.get_product(product).await?.stock, 5);
        assert_eq!(ctx.users.get_user(user).await?.points, 0);

        Ok(())
    }

    #[tokio::test]
    async fn forged_callback_cancels_pending_order() -> TestResult {
        let ctx = TestContext::new().await;

        let (user, product, discount, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let forger = EsewaGateway::new(GatewayConfig {
            secret: GatewaySecret::new("not-the-merchant-secret"),
            ..GatewayConfig::sandbox()
        });

        let callback = payment_callback(&forger, order.token.as_str(), 170_00, STATUS_COMPLETE)?;

        let result = ctx.orders.confirm_payment(order.uuid, &callback).await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::SignatureInvalid(SignatureError::Forged))
            ),
            "expected SignatureInvalid, got {result:?}"
        );

        let lookup = ctx.orders.get_order(user, order.uuid).await;

        assert!(
            matches!(lookup, Err(OrdersServiceError::NotFound)),
            "expected NotFound, got {lookup:?}"
        );
        assert_eq!(ctx.users.get_user(user).await?.points, 0);
        assert_eq!(ctx.catalog.get_product(product).await?.stock, 5);
        assert!(ctx.discounts.get_discount(discount).await?.reserved_order.is_none());
        assert_eq!(ctx.carts.view(user).await?.lines.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn underpaid_callback_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;

        let (user, _, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback = payment_callback(&ctx.gateway, order.token.as_str(), 1_00, STATUS_COMPLETE)?;

        let result = ctx.orders.confirm_payment(order.uuid, &callback).await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::SignatureInvalid(
                    SignatureError::AmountMismatch {
                        expected: 170_00,
                        actual: 1_00
                    }
                ))
            ),
            "expected AmountMismatch, got {result:?}"
        );
        assert!(ctx.orders.list_orders(user).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn cancelled_order_restores_points_when_configured() -> TestResult {
        let config = SettlementConfig {
            cancellation_policy: CancellationPolicy::Restore,
            ..SettlementConfig::default()
        };

        let ctx = TestContext::with_settlement(config, Arc::new(MockReceiptNotifier::new())).await;

        let (user, _, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let result = ctx.orders.confirm_payment(order.uuid, "bm90LWpzb24=").await;

        assert!(
            matches!(
                result,
                Err(OrdersServiceError::SignatureInvalid(
                    SignatureError::MalformedPayload
                ))
            ),
            "expected MalformedPayload, got {result:?}"
        );
        assert_eq!(ctx.users.get_user(user).await?.points, 100);

        Ok(())
    }

    #[tokio::test]
    async fn lenient_policy_settles_unverified_callback() -> TestResult {
        let config = SettlementConfig {
            signature_policy: SignaturePolicy::Lenient,
            ..SettlementConfig::default()
        };

        let ctx = TestContext::with_settlement(config, notifier_expecting_one_receipt()).await;

        let (user, _, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback = payment_callback(&ctx.gateway, order.token.as_str(), 170_00, "PENDING")?;

        let confirmed = ctx.orders.confirm_payment(order.uuid, &callback).await?;

        assert!(
            matches!(confirmed, ConfirmOutcome::Settled(_)),
            "expected Settled, got {confirmed:?}"
        );
        assert_eq!(ctx.users.get_user(user).await?.points, 17);

        Ok(())
    }

    #[tokio::test]
    async fn bad_callback_for_completed_order_leaves_it_alone() -> TestResult {
        let ctx = TestContext::new().await;

        let (user, product, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback =
            payment_callback(&ctx.gateway, order.token.as_str(), 170_00, STATUS_COMPLETE)?;

        ctx.orders.confirm_payment(order.uuid, &callback).await?;

        let result = ctx.orders.confirm_payment(order.uuid, "garbage").await;

        assert!(
            matches!(result, Err(OrdersServiceError::SignatureInvalid(_))),
            "expected SignatureInvalid, got {result:?}"
        );

        let details = ctx.orders.get_order(user, order.uuid).await?;

        assert_eq!(details.order.status, OrderStatus::Completed);
        assert_eq!(ctx.catalog.get_product(product).await?.stock, 3);

        Ok(())
    }

    #[tokio::test]
    async fn receipt_failure_does_not_undo_settlement() -> TestResult {
        let mut notifier = MockReceiptNotifier::new();

        notifier
            .expect_send_order_receipt()
            .once()
            .returning(|_, _| Err(NotificationError::Delivery("mailbox full".to_string())));

        let ctx =
            TestContext::with_settlement(SettlementConfig::default(), Arc::new(notifier)).await;

        let (user, _, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback =
            payment_callback(&ctx.gateway, order.token.as_str(), 170_00, STATUS_COMPLETE)?;

        let confirmed = ctx.orders.confirm_payment(order.uuid, &callback).await?;

        assert!(
            matches!(confirmed, ConfirmOutcome::Settled(_)),
            "expected Settled, got {confirmed:?}"
        );
        assert_eq!(
            ctx.orders.get_order(user, order.uuid).await?.order.status,
            OrderStatus::Completed
        );

        Ok(())
    }

    #[tokio::test]
    async fn confirm_payment_unknown_order_returns_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.orders.confirm_payment(OrderUuid::new(), "garbage").await;

        assert!(
            matches!(result, Err(OrdersServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn settlement_clamps_stock_at_zero() -> TestResult {
        let ctx = TestContext::new().await;
        let product = create_product(&ctx, "Last Two", 100_00, 2).await?;

        let mut tokens = Vec::new();

        for email in ["first@example.com", "second@example.com"] {
            let user = create_user(&ctx, email, 0).await?;

            add_to_cart(&ctx, user.uuid, product.uuid, 2).await?;

            let outcome = ctx
                .orders
                .checkout(user.uuid, checkout_request(0), Timestamp::now())
                .await?;

            tokens.push((outcome.order.order.uuid, outcome.order.order.token));
        }

        for (order, token) in &tokens {
            let callback = payment_callback(&ctx.gateway, token.as_str(), 200_00, STATUS_COMPLETE)?;

            let confirmed = ctx.orders.confirm_payment(*order, &callback).await?;

            assert!(
                matches!(confirmed, ConfirmOutcome::Settled(_)),
                "expected Settled, got {confirmed:?}"
            );
        }

        assert_eq!(ctx.catalog.get_product(product.uuid).await?.stock, 0);

        Ok(())
    }

    #[tokio::test]
    async fn fail_payment_cancels_pending_order() -> TestResult {
        let ctx = TestContext::new().await;

        let (user, _, discount, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        ctx.orders.fail_payment(user, order.uuid).await?;

        assert!(ctx.orders.list_orders(user).await?.is_empty());
        assert!(ctx.discounts.get_discount(discount).await?.reserved_order.is_none());
        assert_eq!(ctx.users.get_user(user).await?.points, 0);

        Ok(())
    }

    #[tokio::test]
    async fn fail_payment_on_completed_order_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;

        let (user, _, _, outcome) = discounted_checkout(&ctx).await?;
        let order = &outcome.order.order;

        let callback =
            payment_callback(&ctx.gateway, order.token.as_str(), 170_00, STATUS_COMPLETE)?;

        ctx.orders.confirm_payment(order.uuid, &callback).await?;

        let result = ctx.orders.fail_payment(user, order.uuid).await;

        assert!(
            matches!(result, Err(OrdersServiceError::AlreadyCompleted)),
            "expected AlreadyCompleted, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn fail_payment_on_another_users_order_returns_not_found() -> TestResult {
        let ctx = TestContext::new().await;

        let (owner, _, _, outcome) = discounted_checkout(&ctx).await?;
        let other = create_user(&ctx, "other@example.com", 0).await?;

        let result = ctx.orders.fail_payment(other.uuid, outcome.order.order.uuid).await;

        assert!(
            matches!(result, Err(OrdersServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
        assert_eq!(ctx.orders.list_orders(owner).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn list_orders_returns_newest_first() -> TestResult {
        let ctx = TestContext::new().await;
        let user = create_user(&ctx, EMAIL, 0).await?;
        let product = create_product(&ctx, "Brass Diyo", 100_00, 5).await?;

        add_to_cart(&ctx, user.uuid, product.uuid, 1).await?;

        let first = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await?;
        let second = ctx
            .orders
            .checkout(user.uuid, checkout_request(0), Timestamp::now())
            .await?;

        let uuids: Vec<OrderUuid> = ctx
            .orders
            .list_orders(user.uuid)
            .await?
            .into_iter()
            .map(|order| order.uuid)
            .collect();

        assert_eq!(
            uuids,
            vec![second.order.order.uuid, first.order.order.uuid]
        );

        Ok(())
    }
}
