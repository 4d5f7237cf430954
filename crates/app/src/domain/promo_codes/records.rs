//! Promo Code Records

use jiff::Timestamp;
use sankalpa::promotions::{PromoCode, PromoDiscount, PromoTerms};
use serde::Serialize;

use crate::uuids::TypedUuid;

/// Promo Code UUID
pub type PromoCodeUuid = TypedUuid<PromoCodeRecord>;

/// Promo Code Record
#[derive(Debug, Clone, Serialize)]
pub struct PromoCodeRecord {
    pub uuid: PromoCodeUuid,
    pub code: PromoCode,
    pub discount: PromoDiscount,
    pub is_active: bool,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
    pub max_uses: u32,
    pub current_uses: u32,
    pub created_at: Timestamp,
}

impl PromoCodeRecord {
    #[must_use]
    pub fn terms(&self) -> PromoTerms {
        PromoTerms {
            discount: self.discount,
            is_active: self.is_active,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            max_uses: self.max_uses,
            current_uses: self.current_uses,
        }
    }
}
