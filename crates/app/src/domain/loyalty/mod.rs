//! Loyalty

pub mod data;
pub mod errors;
pub mod service;

pub use errors::LoyaltyServiceError;
pub use service::*;
