//! Carts service errors.

use sankalpa::{errors::ErrorClass, pricing::PricingError};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CartsServiceError {
    #[error("cart line not found")]
    NotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("product is out of stock")]
    OutOfStock,

    #[error("product is already in the cart")]
    AlreadyInCart,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("only {available} in stock, {requested} requested")]
    InsufficientStock { requested: u64, available: u64 },

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("cart total is out of range")]
    Pricing(#[from] PricingError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl CartsServiceError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound | Self::ProductNotFound | Self::InvalidReference => ErrorClass::NotFound,
            Self::AlreadyInCart => ErrorClass::Conflict,
            Self::OutOfStock | Self::InsufficientStock { .. } => ErrorClass::InsufficientResource,
            Self::InvalidQuantity | Self::MissingRequiredData | Self::InvalidData => {
                ErrorClass::Validation
            }
            Self::Pricing(_) | Self::Sql(_) => ErrorClass::Internal,
        }
    }
}

impl From<Error> for CartsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            // Only the active (user, product) index can be violated by an insert.
            Some(ErrorKind::UniqueViolation) => Self::AlreadyInCart,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}
