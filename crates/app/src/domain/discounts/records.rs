//! User Discount Records

use jiff::Timestamp;
use sankalpa::discounts::DiscountCandidate;
use serde::Serialize;

use crate::{
    domain::{orders::records::OrderUuid, users::records::UserUuid},
    uuids::TypedUuid,
};

/// User Discount UUID
pub type UserDiscountUuid = TypedUuid<UserDiscountRecord>;

/// User Discount Record
#[derive(Debug, Clone, Serialize)]
pub struct UserDiscountRecord {
    pub uuid: UserDiscountUuid,
    pub user: UserUuid,
    pub discount_percentage: u16,
    pub reason: String,
    pub valid_until: Timestamp,
    pub reserved_order: Option<OrderUuid>,
    pub created_at: Timestamp,
}

impl UserDiscountRecord {
    #[must_use]
    pub fn candidate(&self) -> DiscountCandidate<UserDiscountUuid> {
        DiscountCandidate {
            key: self.uuid,
            percentage: self.discount_percentage,
            valid_until: self.valid_until,
            reserved: self.reserved_order.is_some(),
        }
    }
}
