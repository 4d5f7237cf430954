//! Loyalty Data

use serde::Serialize;

use crate::domain::users::records::UserRecord;

/// Result of recording a login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginSummary {
    pub user: UserRecord,

    /// Points credited by this login; non-zero only when a streak completed.
    pub bonus_points: u64,
}
