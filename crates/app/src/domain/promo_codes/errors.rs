//! Promo codes service errors.

use sankalpa::{
    errors::ErrorClass,
    pricing::PricingError,
    promotions::{PromoError, PromoRejection, PromoTermsError},
};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromoCodesServiceError {
    #[error("promo code already exists")]
    AlreadyExists,

    #[error("promo code not found")]
    NotFound,

    #[error(transparent)]
    Rejected(#[from] PromoRejection),

    #[error(transparent)]
    InvalidTerms(#[from] PromoTermsError),

    #[error("could not generate a unique promo code after {attempts} attempts")]
    CodeExhausted { attempts: u32 },

    #[error("discount is out of range")]
    Pricing(#[from] PricingError),

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl PromoCodesServiceError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyExists => ErrorClass::Conflict,
            Self::NotFound | Self::InvalidReference => ErrorClass::NotFound,
            Self::Rejected(PromoRejection::Exhausted) => ErrorClass::InsufficientResource,
            Self::Rejected(_)
            | Self::InvalidTerms(_)
            | Self::MissingRequiredData
            | Self::InvalidData => ErrorClass::Validation,
            Self::CodeExhausted { .. } => ErrorClass::PersistenceConflict,
            Self::Pricing(_) | Self::Sql(_) => ErrorClass::Internal,
        }
    }
}

impl From<PromoError> for PromoCodesServiceError {
    fn from(error: PromoError) -> Self {
        match error {
            PromoError::Rejected(rejection) => Self::Rejected(rejection),
            PromoError::Pricing(pricing) => Self::Pricing(pricing),
        }
    }
}

impl From<Error> for PromoCodesServiceError {
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
