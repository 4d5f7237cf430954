//! Cart Records

use jiff::Timestamp;
use serde::Serialize;

use crate::{
    domain::{catalog::records::ProductUuid, users::records::UserUuid},
    uuids::TypedUuid,
};

/// Cart Line UUID
pub type CartLineUuid = TypedUuid<CartLineRecord>;

/// Cart Line Record
#[derive(Debug, Clone, Serialize)]
pub struct CartLineRecord {
    pub uuid: CartLineUuid,
    pub user: UserUuid,
    pub product: ProductUuid,
    pub quantity: u64,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
