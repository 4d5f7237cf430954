//! Sankalpa
//!
//! Sankalpa is the checkout and order-settlement engine behind a small storefront: it prices
//! carts against user discounts and loyalty point redemption, validates promo codes, signs and
//! verifies payment gateway payloads, and decides how a pending order is settled.
//!
//! Everything in this crate is pure. Persistence and transactions live in `sankalpa-app`.

pub mod discounts;
pub mod errors;
pub mod gateway;
pub mod loyalty;
pub mod orders;
pub mod pricing;
pub mod promotions;
pub mod receipt;
