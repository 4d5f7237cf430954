//! User Discounts

use jiff::{SignedDuration, Timestamp};
use thiserror::Error;

/// Days a granted discount stays valid unless told otherwise.
pub const DEFAULT_VALID_DAYS: u32 = 30;

/// Errors raised when granting a user discount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountTermsError {
    /// Percentages must be in `1..=100`.
    #[error("discount percentage {0} must be between 1 and 100")]
    InvalidPercentage(u16),

    /// A discount must be valid for at least one day.
    #[error("discount must be valid for at least one day")]
    InvalidValidity,

    /// The expiry could not be represented.
    #[error("discount expiry is out of range")]
    Overflow,
}

/// A discount the user could apply at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountCandidate<K> {
    /// Identifier of the discount, used as the tie-breaker.
    pub key: K,

    /// Percentage off.
    pub percentage: u16,

    /// Last instant the discount can be used.
    pub valid_until: Timestamp,

    /// Whether a pending order already holds this discount.
    pub reserved: bool,
}

impl<K> DiscountCandidate<K> {
    /// Whether the discount can still be applied at `now`.
    pub fn is_available(&self, now: Timestamp) -> bool {
        !self.reserved && self.valid_until >= now
    }
}

/// Pick the discount checkout should apply: the available one expiring last, ties going to the
/// highest key.
pub fn select_active_discount<K: Ord>(
    candidates: &[DiscountCandidate<K>],
    now: Timestamp,
) -> Option<&DiscountCandidate<K>> {
    candidates
        .iter()
        .filter(|candidate| candidate.is_available(now))
        .max_by(|a, b| {
            a.valid_until
                .cmp(&b.valid_until)
                .then_with(|| a.key.cmp(&b.key))
        })
}

/// Validate the terms of a new user discount and return its expiry.
///
/// # Errors
///
/// - [`DiscountTermsError::InvalidPercentage`]: `percentage` is outside `1..=100`.
/// - [`DiscountTermsError::InvalidValidity`]: `valid_days` is zero.
/// - [`DiscountTermsError::Overflow`]: the expiry is not representable.
pub fn grant_expiry(
    percentage: u16,
    valid_days: u32,
    now: Timestamp,
) -> Result<Timestamp, DiscountTermsError> {
    if !(1..=100).contains(&percentage) {
        return Err(DiscountTermsError::InvalidPercentage(percentage));
    }

    if valid_days == 0 {
        return Err(DiscountTermsError::InvalidValidity);
    }

    now.checked_add(SignedDuration::from_hours(i64::from(valid_days) * 24))
        .map_err(|_err| DiscountTermsError::Overflow)
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use testresult::TestResult;

    use super::*;

    fn candidate(key: u32, valid_until: Timestamp) -> DiscountCandidate<u32> {
        DiscountCandidate {
            key,
            percentage: 10,
            valid_until,
            reserved: false,
        }
    }

    #[test]
    fn selects_latest_expiry() -> TestResult {
        let now = Timestamp::from_second(1_700_000_000)?;
        let soon = now.checked_add(SignedDuration::from_hours(1))?;
        let later = now.checked_add(SignedDuration::from_hours(48))?;

        let candidates = [candidate(1, later), candidate(2, soon)];

        let selected = select_active_discount(&candidates, now).map(|c| c.key);

        assert_eq!(selected, Some(1));

        Ok(())
    }

    #[test]
    fn ties_go_to_highest_key() -> TestResult {
        let now = Timestamp::from_second(1_700_000_000)?;
        let later = now.checked_add(SignedDuration::from_hours(48))?;

        let candidates = [candidate(3, later), candidate(7, later), candidate(5, later)];

        let selected = select_active_discount(&candidates, now).map(|c| c.key);

        assert_eq!(selected, Some(7));

        Ok(())
    }

    #[test]
    fn skips_expired_and_reserved() -> TestResult {
        let now = Timestamp::from_second(1_700_000_000)?;
        let earlier = now.checked_sub(SignedDuration::from_secs(1))?;
        let later = now.checked_add(SignedDuration::from_hours(48))?;

        let mut reserved = candidate(2, later);
        reserved.reserved = true;

        let candidates = [candidate(1, earlier), reserved];

        assert!(select_active_discount(&candidates, now).is_none());

        Ok(())
    }

    #[test]
    fn discount_expiring_now_is_still_available() -> TestResult {
        let now = Timestamp::from_second(1_700_000_000)?;

        assert!(candidate(1, now).is_available(now));

        Ok(())
    }

    #[test]
    fn grant_expiry_adds_whole_days() -> TestResult {
        let now = Timestamp::from_second(1_700_000_000)?;

        let expiry = grant_expiry(15, DEFAULT_VALID_DAYS, now)?;

        assert_eq!(expiry.duration_since(now), SignedDuration::from_hours(30 * 24));

        Ok(())
    }

    #[test]
    fn grant_expiry_rejects_bad_terms() -> TestResult {
        let now = Timestamp::from_second(1_700_000_000)?;

        assert_eq!(
            grant_expiry(0, 30, now),
            Err(DiscountTermsError::InvalidPercentage(0))
        );
        assert_eq!(
            grant_expiry(101, 30, now),
            Err(DiscountTermsError::InvalidPercentage(101))
        );
        assert_eq!(grant_expiry(10, 0, now), Err(DiscountTermsError::InvalidValidity));

        Ok(())
    }
}
