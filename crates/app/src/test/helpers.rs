//! Test Helpers

use base64::{Engine, engine::general_purpose::STANDARD};
use jiff::{SignedDuration, Timestamp};
use sankalpa::{
    gateway::{EsewaGateway, format_amount},
    orders::{PaymentMethod, ShippingAddress},
    promotions::{PromoCode, PromoDiscount},
};
use serde_json::json;
use testresult::TestResult;

use crate::{
    domain::{
        carts::{CartsService, CartsServiceError, records::CartLineRecord},
        catalog::{
            CatalogService, CatalogServiceError,
            data::NewProduct,
            records::{ProductRecord, ProductUuid},
        },
        discounts::{
            DiscountsService, DiscountsServiceError,
            data::NewUserDiscount,
            records::{UserDiscountRecord, UserDiscountUuid},
        },
        orders::data::CheckoutRequest,
        promo_codes::{
            PromoCodesService, PromoCodesServiceError,
            data::NewPromoCode,
            records::{PromoCodeRecord, PromoCodeUuid},
        },
        users::{
            UsersService, UsersServiceError,
            data::NewUser,
            records::{UserRecord, UserUuid},
        },
    },
    test::TestContext,
};

pub(crate) async fn create_user(
    ctx: &TestContext,
    email: &str,
    points: u64,
) -> Result<UserRecord, UsersServiceError> {
    ctx.users
        .create_user(NewUser {
            uuid: UserUuid::new(),
            email: email.to_string(),
            points,
        })
        .await
}

pub(crate) async fn create_product(
    ctx: &TestContext,
    name: &str,
    price: u64,
    stock: u64,
) -> Result<ProductRecord, CatalogServiceError> {
    ctx.catalog
        .create_product(NewProduct {
            uuid: ProductUuid::new(),
            name: name.to_string(),
            price,
            stock,
        })
        .await
}

pub(crate) async fn add_to_cart(
    ctx: &TestContext,
    user: UserUuid,
    product: ProductUuid,
    quantity: u64,
) -> Result<CartLineRecord, CartsServiceError> {
    let line = ctx.carts.add(user, product).await?;

    if quantity == 1 {
        return Ok(line);
    }

    ctx.carts.update_quantity(user, line.uuid, quantity).await
}

pub(crate) async fn grant_discount(
    ctx: &TestContext,
    user: UserUuid,
    percentage: u16,
    valid_days: u32,
) -> Result<UserDiscountRecord, DiscountsServiceError> {
    ctx.discounts
        .grant_discount(NewUserDiscount {
            uuid: UserDiscountUuid::new(),
            user,
            percentage,
            reason: "test".to_string(),
            valid_days: Some(valid_days),
        })
        .await
}

/// A promo code valid from an hour ago until a day from now.
pub(crate) async fn create_promo(
    ctx: &TestContext,
    code: Option<PromoCode>,
    discount: PromoDiscount,
    max_uses: u32,
) -> Result<PromoCodeRecord, PromoCodesServiceError> {
    let now = Timestamp::now();

    ctx.promo_codes
        .create_promo_code(NewPromoCode {
            uuid: PromoCodeUuid::new(),
            code,
            discount,
            is_active: true,
            valid_from: now - SignedDuration::from_hours(1),
            valid_until: now + SignedDuration::from_hours(24),
            max_uses,
        })
        .await
}

pub(crate) fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        full_name: "Hari Bahadur".to_string(),
        phone: "9800000000".to_string(),
        address: "Thamel Marg 12".to_string(),
        city: "Kathmandu".to_string(),
    }
}

pub(crate) fn checkout_request(points_redeemed: u64) -> CheckoutRequest {
    CheckoutRequest {
        points_redeemed,
        payment_method: PaymentMethod::Esewa,
        shipping_address: shipping_address(),
    }
}

/// The base64 `data` parameter the gateway posts back after a payment.
pub(crate) fn payment_callback(
    gateway: &EsewaGateway,
    token: &str,
    amount: u64,
    status: &str,
) -> TestResult<String> {
    let total_amount = format_amount(amount);
    let names = "transaction_code,status,total_amount,transaction_uuid,product_code,signed_field_names";

    let message = format!(
        "transaction_code=000AB12,status={status},total_amount={total_amount},\
         transaction_uuid={token},product_code=EPAYTEST,signed_field_names={names}"
    );

    let body = json!({
        "transaction_code": "000AB12",
        "status": status,
        "total_amount": total_amount,
        "transaction_uuid": token,
        "product_code": "EPAYTEST",
        "signed_field_names": names,
        "signature": gateway.sign(&message)?,
    });

    Ok(STANDARD.encode(serde_json::to_vec(&body)?))
}
