//! Sankalpa Domain Concerns

pub mod carts;
pub mod catalog;
pub(crate) mod columns;
pub mod discounts;
pub mod loyalty;
pub mod orders;
pub mod promo_codes;
pub mod users;
