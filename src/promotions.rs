//! Promo Codes
//!
//! Promo codes are shared by every customer and capped by a use count. A code is usable when it
//! is active, `now` falls inside its validity window and it has uses left. Rejections are checked
//! in a fixed order so the customer always sees the same reason for the same code.

use std::{fmt, str::FromStr};

use jiff::{SignedDuration, Timestamp};
use rand::{Rng, seq::SliceRandom};
use serde::Serialize;
use thiserror::Error;

use crate::pricing::{PricingError, percent_of};

/// Length of a generated promo code.
pub const PROMO_CODE_LENGTH: usize = 8;

/// Shortest validity window a new promo code may have.
pub const MIN_PROMO_WINDOW: SignedDuration = SignedDuration::from_hours(1);

const PROMO_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Why a promo code cannot be used right now.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PromoRejection {
    /// The code has been switched off.
    #[error("promo code is not active")]
    Inactive,

    /// The validity window has not opened yet.
    #[error("promo code is not valid until {valid_from}")]
    NotYetValid {
        /// Start of the validity window.
        valid_from: Timestamp,
    },

    /// The validity window has closed.
    #[error("promo code expired at {valid_until}")]
    Expired {
        /// End of the validity window.
        valid_until: Timestamp,
    },

    /// Every allowed use has been consumed.
    #[error("promo code has reached its usage limit")]
    Exhausted,
}

/// Errors raised when applying a promo code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromoError {
    /// The code is not usable.
    #[error(transparent)]
    Rejected(#[from] PromoRejection),

    /// The discount could not be computed.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Errors raised when creating a promo code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromoTermsError {
    /// The window closes before it opens.
    #[error("valid_until must be after valid_from")]
    WindowInverted,

    /// The window is shorter than [`MIN_PROMO_WINDOW`].
    #[error("promo code must be valid for at least one hour")]
    WindowTooShort,

    /// A promo code must be usable at least once.
    #[error("max_uses must be at least 1")]
    NoUses,

    /// Percentage discounts must be in `1..=100`.
    #[error("discount percentage {0} must be between 1 and 100")]
    InvalidPercentage(u16),

    /// Fixed discounts must take something off.
    #[error("discount amount must be positive")]
    ZeroAmount,

    /// The code is not made of uppercase letters and digits.
    #[error("promo code must be {PROMO_CODE_LENGTH} uppercase letters or digits")]
    InvalidCode,
}

/// What a promo code takes off an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PromoDiscount {
    /// Percentage of the order total.
    PercentageOff(u16),

    /// Fixed amount in minor units.
    FixedAmountOff(u64),
}

impl PromoDiscount {
    /// Amount this discount takes off `total`, never more than `total` itself.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] when the percentage is out of range or the amount overflows.
    pub fn discount_on(self, total: u64) -> Result<u64, PricingError> {
        let amount = match self {
            Self::PercentageOff(percentage) => percent_of(total, percentage)?,
            Self::FixedAmountOff(amount) => amount,
        };

        Ok(amount.min(total))
    }

    fn validate(self) -> Result<(), PromoTermsError> {
        match self {
            Self::PercentageOff(percentage) if !(1..=100).contains(&percentage) => {
                Err(PromoTermsError::InvalidPercentage(percentage))
            }
            Self::FixedAmountOff(0) => Err(PromoTermsError::ZeroAmount),
            Self::PercentageOff(_) | Self::FixedAmountOff(_) => Ok(()),
        }
    }
}

/// The usable state of a promo code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoTerms {
    /// What the code takes off.
    pub discount: PromoDiscount,

    /// Whether the code is switched on.
    pub is_active: bool,

    /// Start of the validity window (inclusive).
    pub valid_from: Timestamp,

    /// End of the validity window (inclusive).
    pub valid_until: Timestamp,

    /// Number of times the code may be applied.
    pub max_uses: u32,

    /// Number of times the code has been applied.
    pub current_uses: u32,
}

/// Result of applying a promo code to an order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromoApplication {
    /// Amount taken off.
    pub discount_amount: u64,

    /// Total after the discount.
    pub final_total: u64,
}

impl PromoTerms {
    /// Check the code is usable at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first [`PromoRejection`] that applies, checking in the order inactive,
    /// not yet valid, expired, exhausted.
    pub fn validate(&self, now: Timestamp) -> Result<(), PromoRejection> {
        if !self.is_active {
            return Err(PromoRejection::Inactive);
        }

        if now < self.valid_from {
            return Err(PromoRejection::NotYetValid {
                valid_from: self.valid_from,
            });
        }

        if now > self.valid_until {
            return Err(PromoRejection::Expired {
                valid_until: self.valid_until,
            });
        }

        if self.current_uses >= self.max_uses {
            return Err(PromoRejection::Exhausted);
        }

        Ok(())
    }

    /// Validate the code and compute what it takes off `total`.
    ///
    /// This does not record the use; callers increment `current_uses` in storage.
    ///
    /// # Errors
    ///
    /// Returns [`PromoError::Rejected`] if the code is unusable, or [`PromoError::Pricing`] if
    /// the discount cannot be computed.
    pub fn apply(&self, total: u64, now: Timestamp) -> Result<PromoApplication, PromoError> {
        self.validate(now)?;

        let discount_amount = self.discount.discount_on(total)?;

        Ok(PromoApplication {
            discount_amount,
            final_total: total.saturating_sub(discount_amount),
        })
    }

    /// Uses left before the code is exhausted.
    pub fn remaining_uses(&self) -> u32 {
        self.max_uses.saturating_sub(self.current_uses)
    }
}

/// Validate the terms of a promo code about to be created.
///
/// # Errors
///
/// Returns the first [`PromoTermsError`] that applies.
pub fn validate_new_terms(
    discount: PromoDiscount,
    valid_from: Timestamp,
    valid_until: Timestamp,
    max_uses: u32,
) -> Result<(), PromoTermsError> {
    if valid_until <= valid_from {
        return Err(PromoTermsError::WindowInverted);
    }

    if valid_until.duration_since(valid_from) < MIN_PROMO_WINDOW {
        return Err(PromoTermsError::WindowTooShort);
    }

    if max_uses == 0 {
        return Err(PromoTermsError::NoUses);
    }

    discount.validate()
}

/// A promo code as typed by a customer: eight uppercase letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PromoCode(String);

impl PromoCode {
    /// Generate a random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..PROMO_CODE_LENGTH)
            .filter_map(|_| PROMO_CODE_ALPHABET.choose(&mut *rng).copied().map(char::from))
            .collect();

        Self(code)
    }

    /// The code as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PromoCode {
    type Err = PromoTermsError;

    /// Parse a customer-entered code, ignoring surrounding whitespace and letter case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim().to_ascii_uppercase();

        if code.len() != PROMO_CODE_LENGTH || !code.bytes().all(|b| PROMO_CODE_ALPHABET.contains(&b))
        {
            return Err(PromoTermsError::InvalidCode);
        }

        Ok(Self(code))
    }
}

impl fmt::Display for PromoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
