//! Orders service errors.

use sankalpa::{
    errors::ErrorClass,
    gateway::SignatureError,
    orders::OrderValueError,
    pricing::PricingError,
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrdersServiceError {
    #[error("order not found")]
    NotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("order already exists")]
    AlreadyExists,

    #[error("cart is empty")]
    EmptyCart,

    #[error(transparent)]
    InvalidOrder(#[from] OrderValueError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("payment callback rejected: {0}")]
    SignatureInvalid(#[source] SignatureError),

    #[error("order is already completed")]
    AlreadyCompleted,

    #[error("discount is held by another order")]
    DiscountReserved,

    #[error("could not generate a unique order token after {attempts} attempts")]
    TokenExhausted { attempts: u32 },

    #[error("payment gateway failed")]
    Gateway(#[source] SignatureError),

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl OrdersServiceError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound | Self::UserNotFound | Self::InvalidReference => ErrorClass::NotFound,
            Self::AlreadyExists | Self::AlreadyCompleted => ErrorClass::Conflict,
            Self::EmptyCart
            | Self::InvalidOrder(_)
            | Self::MissingRequiredData
            | Self::InvalidData
            | Self::Pricing(
                PricingError::ExcessiveRedemption { .. } | PricingError::InvalidPercentage(_),
            ) => ErrorClass::Validation,
            Self::Pricing(PricingError::InsufficientPoints { .. }) => {
                ErrorClass::InsufficientResource
            }
            Self::SignatureInvalid(_) => ErrorClass::Unauthorized,
            Self::DiscountReserved | Self::TokenExhausted { .. } => {
                ErrorClass::PersistenceConflict
            }
            Self::Gateway(_) => ErrorClass::ExternalFailure,
            Self::Pricing(PricingError::Overflow) | Self::Sql(_) => ErrorClass::Internal,
        }
    }
}

impl From<Error> for OrdersServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}
