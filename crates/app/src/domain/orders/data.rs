//! Orders Data

use sankalpa::{
    gateway::SignedPayment,
    orders::{OrderToken, PaymentMethod, ShippingAddress},
    pricing::PriceBreakdown,
    receipt::{OrderReceipt, ReceiptLine},
};
use serde::Serialize;

use crate::domain::{
    carts::records::CartLineUuid,
    catalog::records::ProductUuid,
    discounts::records::UserDiscountUuid,
    orders::records::{OrderLineRecord, OrderLineUuid, OrderRecord, OrderUuid},
    users::records::UserUuid,
};

/// What the customer submits at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckoutRequest {
    pub points_redeemed: u64,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
}

/// An order with its line snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub lines: Vec<OrderLineRecord>,
}

impl OrderDetails {
    /// Receipt for the customer at `email`.
    #[must_use]
    pub fn receipt(&self, email: &str) -> OrderReceipt {
        OrderReceipt {
            token: self.order.token.to_string(),
            email: email.to_string(),
            ordered_at: self.order.created_at,
            payment_method: self.order.payment_method,
            shipping_address: self.order.shipping_address.clone(),
            lines: self
                .lines
                .iter()
                .map(|line| ReceiptLine {
                    name: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            total_price: self.order.total_price,
            discount_percentage: self.order.discount_percentage,
            discount_amount: self.order.discount_amount,
            points_redeemed: self.order.points_redeemed,
            point_discount: self.order.point_discount,
            final_price: self.order.final_price,
        }
    }
}

/// A pending order and the form that hands the customer to the gateway.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: OrderDetails,
    pub payment: SignedPayment,
}

/// Result of a verified payment callback.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// This callback settled the order.
    Settled(OrderDetails),

    /// An earlier callback already settled the order; nothing changed.
    AlreadySettled(OrderDetails),
}

impl ConfirmOutcome {
    #[must_use]
    pub fn order(&self) -> &OrderDetails {
        match self {
            Self::Settled(order) | Self::AlreadySettled(order) => order,
        }
    }
}

/// Order row to insert, minus the token which is generated per attempt.
#[derive(Debug, Clone)]
pub(crate) struct NewOrder {
    pub uuid: OrderUuid,
    pub user: UserUuid,
    pub breakdown: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub used_discount: Option<UserDiscountUuid>,
}

/// Order line snapshot to insert.
#[derive(Debug, Clone)]
pub(crate) struct NewOrderLine {
    pub uuid: OrderLineUuid,
    pub order: OrderUuid,
    pub line_number: u32,
    pub product: ProductUuid,
    pub cart_line: CartLineUuid,
    pub product_name: String,
    pub quantity: u64,
    pub unit_price: u64,
}

/// Generates order tokens.
pub(crate) type TokenSource = fn() -> OrderToken;
