//! User Records

use jiff::Timestamp;
use serde::Serialize;

use crate::uuids::TypedUuid;

/// User UUID
pub type UserUuid = TypedUuid<UserRecord>;

/// User Record
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub uuid: UserUuid,
    pub email: String,
    pub points: u64,
    pub login_streak: u32,

    /// Ink bottles returned since the last reward claim.
    pub ink_bottle_returns: u32,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
