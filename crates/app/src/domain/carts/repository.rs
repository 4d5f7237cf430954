//! Carts Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{
    carts::{
        data::CartLineView,
        records::{CartLineRecord, CartLineUuid},
    },
    catalog::records::ProductUuid,
    columns::{encode_amount, try_get_amount},
    users::records::UserUuid,
};

const CREATE_LINE_SQL: &str = include_str!("sql/create_line.sql");
const FIND_ACTIVE_LINE_FOR_PRODUCT_SQL: &str = include_str!("sql/find_active_line_for_product.sql");
const LOCK_ACTIVE_LINE_SQL: &str = include_str!("sql/lock_active_line.sql");
const UPDATE_QUANTITY_SQL: &str = include_str!("sql/update_quantity.sql");
const DELETE_LINE_SQL: &str = include_str!("sql/delete_line.sql");
const LIST_ACTIVE_LINES_SQL: &str = include_str!("sql/list_active_lines.sql");
const DEACTIVATE_LINES_SQL: &str = include_str!("sql/deactivate_lines.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCartsRepository;

impl PgCartsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        line: CartLineUuid,
        user: UserUuid,
        product: ProductUuid,
    ) -> Result<CartLineRecord, sqlx::Error> {
        query_as::<Postgres, CartLineRecord>(CREATE_LINE_SQL)
            .bind(line.into_uuid())
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn find_active_line_for_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        product: ProductUuid,
    ) -> Result<Option<CartLineRecord>, sqlx::Error> {
        query_as::<Postgres, CartLineRecord>(FIND_ACTIVE_LINE_FOR_PRODUCT_SQL)
            .bind(user.into_uuid())
            .bind(product.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Fetch an active line owned by `user` and lock it.
    pub(crate) async fn lock_active_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        line: CartLineUuid,
    ) -> Result<CartLineRecord, sqlx::Error> {
        query_as::<Postgres, CartLineRecord>(LOCK_ACTIVE_LINE_SQL)
            .bind(line.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn update_quantity(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        line: CartLineUuid,
        quantity: u64,
    ) -> Result<CartLineRecord, sqlx::Error> {
        query_as::<Postgres, CartLineRecord>(UPDATE_QUANTITY_SQL)
            .bind(line.into_uuid())
            .bind(encode_amount("quantity", quantity)?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn delete_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        line: CartLineUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_LINE_SQL)
            .bind(line.into_uuid())
            .bind(user.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Active lines joined with live catalog prices, oldest first.
    pub(crate) async fn list_active_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Vec<CartLineView>, sqlx::Error> {
        query_as::<Postgres, CartLineView>(LIST_ACTIVE_LINES_SQL)
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn deactivate_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        lines: &[CartLineUuid],
    ) -> Result<u64, sqlx::Error> {
        let uuids: Vec<Uuid> = lines.iter().map(|line| line.into_uuid()).collect();

        let rows_affected = query(DEACTIVATE_LINES_SQL)
            .bind(uuids)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for CartLineRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: CartLineUuid::from_uuid(row.try_get("uuid")?),
            user: UserUuid::from_uuid(row.try_get("user_uuid")?),
            product: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            quantity: try_get_amount(row, "quantity")?,
            active: row.try_get("active")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CartLineView {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let unit_price = try_get_amount(row, "unit_price")?;
        let quantity = try_get_amount(row, "quantity")?;

        let line_total =
            unit_price
                .checked_mul(quantity)
                .ok_or_else(|| sqlx::Error::ColumnDecode {
                    index: "unit_price".to_string(),
                    source: "line total overflows".into(),
                })?;

        Ok(Self {
            uuid: CartLineUuid::from_uuid(row.try_get("uuid")?),
            product: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            product_name: row.try_get("product_name")?,
            unit_price,
            quantity,
            line_total,
        })
    }
}
