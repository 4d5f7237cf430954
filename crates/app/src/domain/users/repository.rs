//! Users Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};

use crate::domain::{
    columns::{encode_amount, encode_count, try_get_amount, try_get_count},
    users::{data::NewUser, records::UserRecord, records::UserUuid},
};

const CREATE_USER_SQL: &str = include_str!("sql/create_user.sql");
const GET_USER_SQL: &str = include_str!("sql/get_user.sql");
const LOCK_USER_SQL: &str = include_str!("sql/lock_user.sql");
const ADD_POINTS_SQL: &str = include_str!("sql/add_points.sql");
const DEDUCT_POINTS_SQL: &str = include_str!("sql/deduct_points.sql");
const RECORD_LOGIN_SQL: &str = include_str!("sql/record_login.sql");
const RECORD_INK_BOTTLE_RETURNS_SQL: &str = include_str!("sql/record_ink_bottle_returns.sql");
const RESET_INK_BOTTLE_RETURNS_SQL: &str = include_str!("sql/reset_ink_bottle_returns.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgUsersRepository;

impl PgUsersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: NewUser,
    ) -> Result<UserRecord, sqlx::Error> {
        query_as::<Postgres, UserRecord>(CREATE_USER_SQL)
            .bind(user.uuid.into_uuid())
            .bind(user.email)
            .bind(encode_amount("points", user.points)?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<UserRecord, sqlx::Error> {
        query_as::<Postgres, UserRecord>(GET_USER_SQL)
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Fetch the user and hold a row lock until the transaction ends.
    pub(crate) async fn lock_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<UserRecord, sqlx::Error> {
        query_as::<Postgres, UserRecord>(LOCK_USER_SQL)
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Credit points, returning the new balance.
    pub(crate) async fn add_points(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        points: u64,
    ) -> Result<u64, sqlx::Error> {
        let balance: i64 = query_scalar(ADD_POINTS_SQL)
            .bind(user.into_uuid())
            .bind(encode_amount("points", points)?)
            .fetch_one(&mut **tx)
            .await?;

        decode_balance(balance)
    }

    /// Debit points, returning the new balance. `RowNotFound` if the balance is too low.
    pub(crate) async fn deduct_points(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        points: u64,
    ) -> Result<u64, sqlx::Error> {
        let balance: i64 = query_scalar(DEDUCT_POINTS_SQL)
            .bind(user.into_uuid())
            .bind(encode_amount("points", points)?)
            .fetch_one(&mut **tx)
            .await?;

        decode_balance(balance)
    }

    pub(crate) async fn record_login(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        streak: u32,
        at: Timestamp,
        bonus_points: u64,
    ) -> Result<UserRecord, sqlx::Error> {
        query_as::<Postgres, UserRecord>(RECORD_LOGIN_SQL)
            .bind(user.into_uuid())
            .bind(encode_count("login_streak", streak)?)
            .bind(SqlxTimestamp::from(at))
            .bind(encode_amount("points", bonus_points)?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn record_ink_bottle_returns(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        bottles: u32,
    ) -> Result<UserRecord, sqlx::Error> {
        query_as::<Postgres, UserRecord>(RECORD_INK_BOTTLE_RETURNS_SQL)
            .bind(user.into_uuid())
            .bind(encode_count("ink_bottle_returns", bottles)?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn reset_ink_bottle_returns(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<u64, sqlx::Error> {
        let result = query(RESET_INK_BOTTLE_RETURNS_SQL)
            .bind(user.into_uuid())
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }
}

fn decode_balance(balance: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(balance).map_err(|e| sqlx::Error::ColumnDecode {
        index: "points".to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for UserRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: UserUuid::from_uuid(row.try_get("uuid")?),
            email: row.try_get("email")?,
            points: try_get_amount(row, "points")?,
            login_streak: try_get_count(row, "login_streak")?,
            ink_bottle_returns: try_get_count(row, "ink_bottle_returns")?,
            last_login_at: row
                .try_get::<Option<SqlxTimestamp>, _>("last_login_at")?
                .map(SqlxTimestamp::to_jiff),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
