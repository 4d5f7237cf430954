//! User Discounts Data

use crate::domain::{discounts::records::UserDiscountUuid, users::records::UserUuid};

/// New User Discount Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserDiscount {
    pub uuid: UserDiscountUuid,
    pub user: UserUuid,
    pub percentage: u16,
    pub reason: String,

    /// Days until expiry. Defaults to [`sankalpa::discounts::DEFAULT_VALID_DAYS`].
    pub valid_days: Option<u32>,
}
