//! Promo Codes Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use sankalpa::promotions::{PromoCode, PromoDiscount};
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};

use crate::domain::{
    columns::{encode_amount, encode_count, try_get_amount, try_get_count},
    promo_codes::{
        data::NewPromoCode,
        records::{PromoCodeRecord, PromoCodeUuid},
    },
};

const CREATE_PROMO_CODE_SQL: &str = include_str!("sql/create_promo_code.sql");
const GET_PROMO_CODE_SQL: &str = include_str!("sql/get_promo_code.sql");
const LOCK_PROMO_CODE_SQL: &str = include_str!("sql/lock_promo_code.sql");
const RECORD_PROMO_USE_SQL: &str = include_str!("sql/record_promo_use.sql");

/// Unique constraint on `promo_codes.code`.
pub(crate) const PROMO_CODE_UNIQUE_CONSTRAINT: &str = "promo_codes_code_key";

const KIND_PERCENTAGE: &str = "percentage";
const KIND_FIXED_AMOUNT: &str = "fixed_amount";

#[derive(Debug, Clone, Default)]
pub(crate) struct PgPromoCodesRepository;

impl PgPromoCodesRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_promo_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        promo: &NewPromoCode,
        code: &PromoCode,
    ) -> Result<PromoCodeRecord, sqlx::Error> {
        let (kind, value) = match promo.discount {
            PromoDiscount::PercentageOff(percentage) => (KIND_PERCENTAGE, u64::from(percentage)),
            PromoDiscount::FixedAmountOff(amount) => (KIND_FIXED_AMOUNT, amount),
        };

        query_as::<Postgres, PromoCodeRecord>(CREATE_PROMO_CODE_SQL)
            .bind(promo.uuid.into_uuid())
            .bind(code.as_str())
            .bind(kind)
            .bind(encode_amount("discount_value", value)?)
            .bind(promo.is_active)
            .bind(SqlxTimestamp::from(promo.valid_from))
            .bind(SqlxTimestamp::from(promo.valid_until))
            .bind(encode_count("max_uses", promo.max_uses)?)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_promo_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &PromoCode,
    ) -> Result<PromoCodeRecord, sqlx::Error> {
        query_as::<Postgres, PromoCodeRecord>(GET_PROMO_CODE_SQL)
            .bind(code.as_str())
            .fetch_one(&mut **tx)
            .await
    }

    /// Fetch the code and hold a row lock until the transaction ends.
    pub(crate) async fn lock_promo_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &PromoCode,
    ) -> Result<PromoCodeRecord, sqlx::Error> {
        query_as::<Postgres, PromoCodeRecord>(LOCK_PROMO_CODE_SQL)
            .bind(code.as_str())
            .fetch_one(&mut **tx)
            .await
    }

    /// Count one use. `None` when the code has no uses left.
    pub(crate) async fn record_promo_use(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        promo: PromoCodeUuid,
    ) -> Result<Option<PromoCodeRecord>, sqlx::Error> {
        query_as::<Postgres, PromoCodeRecord>(RECORD_PROMO_USE_SQL)
            .bind(promo.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }
}

fn try_get_discount(row: &PgRow) -> Result<PromoDiscount, sqlx::Error> {
    let kind: String = row.try_get("discount_kind")?;
    let value = try_get_amount(row, "discount_value")?;

    match kind.as_str() {
        KIND_PERCENTAGE => u16::try_from(value)
            .map(PromoDiscount::PercentageOff)
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "discount_value".to_string(),
                source: Box::new(e),
            }),
        KIND_FIXED_AMOUNT => Ok(PromoDiscount::FixedAmountOff(value)),
        other => Err(sqlx::Error::ColumnDecode {
            index: "discount_kind".to_string(),
            source: format!("unknown discount kind: {other}").into(),
        }),
    }
}

impl<'r> FromRow<'r, PgRow> for PromoCodeRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let code = row
            .try_get::<String, _>("code")?
            .parse::<PromoCode>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "code".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            uuid: PromoCodeUuid::from_uuid(row.try_get("uuid")?),
            code,
            discount: try_get_discount(row)?,
            is_active: row.try_get("is_active")?,
            valid_from: row.try_get::<SqlxTimestamp, _>("valid_from")?.to_jiff(),
            valid_until: row.try_get::<SqlxTimestamp, _>("valid_until")?.to_jiff(),
            max_uses: try_get_count(row, "max_uses")?,
            current_uses: try_get_count(row, "current_uses")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
