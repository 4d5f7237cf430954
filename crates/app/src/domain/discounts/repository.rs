//! User Discounts Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{
    columns::{encode_percentage, try_get_percentage},
    discounts::records::{UserDiscountRecord, UserDiscountUuid},
    orders::records::OrderUuid,
    users::records::UserUuid,
};

const CREATE_DISCOUNT_SQL: &str = include_str!("sql/create_discount.sql");
const GET_DISCOUNT_SQL: &str = include_str!("sql/get_discount.sql");
const LIST_ACTIVE_DISCOUNTS_SQL: &str = include_str!("sql/list_active_discounts.sql");
const LOCK_DISCOUNT_CANDIDATES_SQL: &str = include_str!("sql/lock_discount_candidates.sql");
const RESERVE_DISCOUNT_SQL: &str = include_str!("sql/reserve_discount.sql");
const RELEASE_DISCOUNT_SQL: &str = include_str!("sql/release_discount.sql");
const EXPIRE_DISCOUNT_SQL: &str = include_str!("sql/expire_discount.sql");
const DELETE_DISCOUNT_SQL: &str = include_str!("sql/delete_discount.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgDiscountsRepository;

impl PgDiscountsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: UserDiscountUuid,
        user: UserUuid,
        percentage: u16,
        reason: &str,
        valid_until: Timestamp,
    ) -> Result<UserDiscountRecord, sqlx::Error> {
        query_as::<Postgres, UserDiscountRecord>(CREATE_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .bind(user.into_uuid())
            .bind(encode_percentage("discount_percentage", percentage)?)
            .bind(reason)
            .bind(SqlxTimestamp::from(valid_until))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: UserDiscountUuid,
    ) -> Result<UserDiscountRecord, sqlx::Error> {
        query_as::<Postgres, UserDiscountRecord>(GET_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Unexpired discounts, latest expiry first.
    pub(crate) async fn list_active_discounts(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<UserDiscountRecord>, sqlx::Error> {
        query_as::<Postgres, UserDiscountRecord>(LIST_ACTIVE_DISCOUNTS_SQL)
            .bind(user.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_all(&mut **tx)
            .await
    }

    /// Lock every unexpired, unreserved discount of `user`.
    pub(crate) async fn lock_discount_candidates(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<UserDiscountRecord>, sqlx::Error> {
        query_as::<Postgres, UserDiscountRecord>(LOCK_DISCOUNT_CANDIDATES_SQL)
            .bind(user.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_all(&mut **tx)
            .await
    }

    /// Hold `discount` for `order`. Zero rows when another order already holds it.
    pub(crate) async fn reserve_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: UserDiscountUuid,
        order: OrderUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(RESERVE_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .bind(order.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Drop any reservation held by `order`.
    pub(crate) async fn release_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(RELEASE_DISCOUNT_SQL)
            .bind(order.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn expire_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: UserDiscountUuid,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(EXPIRE_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn delete_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: UserDiscountUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for UserDiscountRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: UserDiscountUuid::from_uuid(row.try_get("uuid")?),
            user: UserUuid::from_uuid(row.try_get("user_uuid")?),
            discount_percentage: try_get_percentage(row, "discount_percentage")?,
            reason: row.try_get("reason")?,
            valid_until: row.try_get::<SqlxTimestamp, _>("valid_until")?.to_jiff(),
            reserved_order: row
                .try_get::<Option<Uuid>, _>("reserved_order_uuid")?
                .map(OrderUuid::from_uuid),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
