//! Orders Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sankalpa::orders::{OrderStatus, OrderToken, PaymentMethod, ShippingAddress};
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as};
use uuid::Uuid;

use crate::domain::{
    carts::records::CartLineUuid,
    catalog::records::ProductUuid,
    columns::{encode_amount, encode_count, encode_percentage, try_get_amount, try_get_percentage},
    discounts::records::UserDiscountUuid,
    orders::{
        data::{NewOrder, NewOrderLine},
        records::{OrderLineRecord, OrderLineUuid, OrderRecord, OrderUuid},
    },
    users::records::UserUuid,
};

const CREATE_ORDER_SQL: &str = include_str!("sql/create_order.sql");
const CREATE_ORDER_LINE_SQL: &str = include_str!("sql/create_order_line.sql");
const GET_ORDER_SQL: &str = include_str!("sql/get_order.sql");
const LOCK_ORDER_SQL: &str = include_str!("sql/lock_order.sql");
const LOCK_USER_ORDER_SQL: &str = include_str!("sql/lock_user_order.sql");
const LIST_ORDERS_SQL: &str = include_str!("sql/list_orders.sql");
const LIST_ORDER_LINES_SQL: &str = include_str!("sql/list_order_lines.sql");
const COMPLETE_ORDER_SQL: &str = include_str!("sql/complete_order.sql");
const DELETE_ORDER_SQL: &str = include_str!("sql/delete_order.sql");

/// Unique constraint on `orders.token`.
pub(crate) const ORDER_TOKEN_UNIQUE_CONSTRAINT: &str = "orders_token_key";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgOrdersRepository;

impl PgOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &NewOrder,
        token: &OrderToken,
    ) -> Result<OrderRecord, sqlx::Error> {
        let breakdown = &order.breakdown;

        query_as::<Postgres, OrderRecord>(CREATE_ORDER_SQL)
            .bind(order.uuid.into_uuid())
            .bind(order.user.into_uuid())
            .bind(token.as_str())
            .bind(encode_amount("total_price", breakdown.total_price)?)
            .bind(encode_percentage(
                "discount_percentage",
                breakdown.discount_percentage,
            )?)
            .bind(encode_amount("discount_amount", breakdown.discount_amount)?)
            .bind(encode_amount("points_redeemed", breakdown.points_redeemed)?)
            .bind(encode_amount("point_discount", breakdown.point_discount)?)
            .bind(encode_amount("final_price", breakdown.final_price)?)
            .bind(order.payment_method.as_str())
            .bind(order.shipping_address.full_name.trim())
            .bind(order.shipping_address.phone.trim())
            .bind(order.shipping_address.address.trim())
            .bind(order.shipping_address.city.trim())
            .bind(order.used_discount.map(UserDiscountUuid::into_uuid))
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn create_order_line(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        line: NewOrderLine,
    ) -> Result<OrderLineRecord, sqlx::Error> {
        query_as::<Postgres, OrderLineRecord>(CREATE_ORDER_LINE_SQL)
            .bind(line.uuid.into_uuid())
            .bind(line.order.into_uuid())
            .bind(encode_count("line_number", line.line_number)?)
            .bind(line.product.into_uuid())
            .bind(line.cart_line.into_uuid())
            .bind(line.product_name)
            .bind(encode_amount("quantity", line.quantity)?)
            .bind(encode_amount("unit_price", line.unit_price)?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        user: UserUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(GET_ORDER_SQL)
            .bind(order.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Fetch any user's order and hold a row lock until the transaction ends.
    pub(crate) async fn lock_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(LOCK_ORDER_SQL)
            .bind(order.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Fetch an order owned by `user` and hold a row lock until the transaction ends.
    pub(crate) async fn lock_user_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        user: UserUuid,
    ) -> Result<OrderRecord, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(LOCK_USER_ORDER_SQL)
            .bind(order.into_uuid())
            .bind(user.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// Orders of `user`, newest first.
    pub(crate) async fn list_orders(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(LIST_ORDERS_SQL)
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn list_order_lines(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<Vec<OrderLineRecord>, sqlx::Error> {
        query_as::<Postgres, OrderLineRecord>(LIST_ORDER_LINES_SQL)
            .bind(order.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    /// Mark a pending order completed. `None` if it was not pending.
    pub(crate) async fn complete_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
        completed_at: Timestamp,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        query_as::<Postgres, OrderRecord>(COMPLETE_ORDER_SQL)
            .bind(order.into_uuid())
            .bind(SqlxTimestamp::from(completed_at))
            .fetch_optional(&mut **tx)
            .await
    }

    /// Delete a pending order and its lines.
    pub(crate) async fn delete_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: OrderUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_ORDER_SQL)
            .bind(order.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

fn decode_column<T, E>(col: &str, result: Result<T, E>) -> Result<T, sqlx::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    result.map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for OrderRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let status = decode_column(
            "payment_status",
            row.try_get::<String, _>("payment_status")?
                .parse::<OrderStatus>(),
        )?;

        let payment_method = decode_column(
            "payment_method",
            row.try_get::<String, _>("payment_method")?
                .parse::<PaymentMethod>(),
        )?;

        Ok(Self {
            uuid: OrderUuid::from_uuid(row.try_get("uuid")?),
            user: UserUuid::from_uuid(row.try_get("user_uuid")?),
            token: OrderToken::from_stored(row.try_get("token")?),
            status,
            payment_method,
            shipping_address: ShippingAddress {
                full_name: row.try_get("shipping_full_name")?,
                phone: row.try_get("shipping_phone")?,
                address: row.try_get("shipping_address")?,
                city: row.try_get("shipping_city")?,
            },
            total_price: try_get_amount(row, "total_price")?,
            discount_percentage: try_get_percentage(row, "discount_percentage")?,
            discount_amount: try_get_amount(row, "discount_amount")?,
            points_redeemed: try_get_amount(row, "points_redeemed")?,
            point_discount: try_get_amount(row, "point_discount")?,
            final_price: try_get_amount(row, "final_price")?,
            used_discount: row
                .try_get::<Option<Uuid>, _>("used_discount_uuid")?
                .map(UserDiscountUuid::from_uuid),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            completed_at: row
                .try_get::<Option<SqlxTimestamp>, _>("completed_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for OrderLineRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: OrderLineUuid::from_uuid(row.try_get("uuid")?),
            order: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            product: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            cart_line: row
                .try_get::<Option<Uuid>, _>("cart_line_uuid")?
                .map(CartLineUuid::from_uuid),
            product_name: row.try_get("product_name")?,
            quantity: try_get_amount(row, "quantity")?,
            unit_price: try_get_amount(row, "unit_price")?,
        })
    }
}
