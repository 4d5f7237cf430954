//! Promo Codes Data

use jiff::Timestamp;
use sankalpa::promotions::{PromoCode, PromoDiscount};

use crate::domain::promo_codes::records::PromoCodeUuid;

/// New Promo Code Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromoCode {
    pub uuid: PromoCodeUuid,

    /// Code to use. A random one is generated when `None`.
    pub code: Option<PromoCode>,

    pub discount: PromoDiscount,
    pub is_active: bool,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
    pub max_uses: u32,
}
