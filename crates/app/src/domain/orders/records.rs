//! Order Records

use jiff::Timestamp;
use sankalpa::orders::{OrderStatus, OrderToken, PaymentMethod, ShippingAddress};
use serde::Serialize;

use crate::{
    domain::{
        carts::records::CartLineUuid, catalog::records::ProductUuid,
        discounts::records::UserDiscountUuid, users::records::UserUuid,
    },
    uuids::TypedUuid,
};

/// Order UUID
pub type OrderUuid = TypedUuid<OrderRecord>;

/// Order Line UUID
pub type OrderLineUuid = TypedUuid<OrderLineRecord>;

/// Order Record
#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    pub uuid: OrderUuid,
    pub user: UserUuid,
    pub token: OrderToken,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub total_price: u64,
    pub discount_percentage: u16,
    pub discount_amount: u64,
    pub points_redeemed: u64,
    pub point_discount: u64,
    pub final_price: u64,
    pub used_discount: Option<UserDiscountUuid>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Order Line Record
///
/// A snapshot of a cart line taken at checkout. Later price changes do not affect it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLineRecord {
    pub uuid: OrderLineUuid,
    pub order: OrderUuid,
    pub product: ProductUuid,
    pub cart_line: Option<CartLineUuid>,
    pub product_name: String,
    pub quantity: u64,
    pub unit_price: u64,
}
