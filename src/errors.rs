//! Error classes shared by every service boundary.

use std::fmt;

/// Coarse classification of a failure, independent of the service that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad input shape or range.
    Validation,

    /// A referenced entity does not exist (or is not visible to the caller).
    NotFound,

    /// The entity already exists or is in a state that forbids the operation.
    Conflict,

    /// Not enough stock, points or balance.
    InsufficientResource,

    /// Ownership or authenticity could not be established.
    Unauthorized,

    /// A collaborator outside the store failed.
    ExternalFailure,

    /// A uniqueness race was lost; retrying the operation can succeed.
    PersistenceConflict,

    /// Anything else.
    Internal,
}

impl ErrorClass {
    /// HTTP status a transport layer should answer with.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation | Self::InsufficientResource => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict | Self::PersistenceConflict => 409,
            Self::ExternalFailure | Self::Internal => 500,
        }
    }

    /// Whether the same request may succeed when repeated unchanged.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::PersistenceConflict)
    }

    /// Stable snake-case name, suitable for an `error` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InsufficientResource => "insufficient_resource",
            Self::Unauthorized => "unauthorized",
            Self::ExternalFailure => "external_failure",
            Self::PersistenceConflict => "persistence_conflict",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
