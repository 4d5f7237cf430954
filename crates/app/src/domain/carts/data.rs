//! Cart Data

use serde::Serialize;

use crate::domain::{carts::records::CartLineUuid, catalog::records::ProductUuid};

/// An active cart line priced against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub uuid: CartLineUuid,
    pub product: ProductUuid,
    pub product_name: String,
    pub unit_price: u64,
    pub quantity: u64,
    pub line_total: u64,
}

/// A user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: u64,
}
