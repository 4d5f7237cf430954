//! User discounts service errors.

use sankalpa::{discounts::DiscountTermsError, errors::ErrorClass};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscountsServiceError {
    #[error("discount already exists")]
    AlreadyExists,

    #[error("discount not found")]
    NotFound,

    #[error("related resource not found")]
    InvalidReference,

    #[error(transparent)]
    InvalidTerms(#[from] DiscountTermsError),

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl DiscountsServiceError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyExists => ErrorClass::Conflict,
            Self::NotFound | Self::InvalidReference => ErrorClass::NotFound,
            Self::InvalidTerms(_) | Self::MissingRequiredData | Self::InvalidData => {
                ErrorClass::Validation
            }
            Self::Sql(_) => ErrorClass::Internal,
        }
    }
}

impl From<Error> for DiscountsServiceError {
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
