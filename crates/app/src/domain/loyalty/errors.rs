//! Loyalty service errors.

use sankalpa::{discounts::DiscountTermsError, errors::ErrorClass};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoyaltyServiceError {
    #[error("user not found")]
    NotFound,

    #[error("no ink bottles returned since the last claim")]
    NoInkBottleReturns,

    #[error(transparent)]
    InvalidTerms(#[from] DiscountTermsError),

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl LoyaltyServiceError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound => ErrorClass::NotFound,
            Self::NoInkBottleReturns | Self::InvalidTerms(_) | Self::InvalidData => {
                ErrorClass::Validation
            }
            Self::Sql(_) => ErrorClass::Internal,
        }
    }
}

impl From<Error> for LoyaltyServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}
