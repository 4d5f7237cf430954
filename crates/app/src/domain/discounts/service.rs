//! User discounts service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use sankalpa::discounts::{DEFAULT_VALID_DAYS, grant_expiry};
use tracing::info;

use crate::{
    database::Db,
    domain::{
        discounts::{
            data::NewUserDiscount,
            errors::DiscountsServiceError,
            records::{UserDiscountRecord, UserDiscountUuid},
            repository::PgDiscountsRepository,
        },
        users::records::UserUuid,
    },
};

#[derive(Debug, Clone)]
pub struct PgDiscountsService {
    db: Db,
    repository: PgDiscountsRepository,
}

impl PgDiscountsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgDiscountsRepository::new(),
        }
    }
}

#[async_trait]
impl DiscountsService for PgDiscountsService {
    #[tracing::instrument(
        name = "discounts.service.grant_discount",
        skip(self, discount),
        fields(user_uuid = %discount.user, discount_percentage = discount.percentage),
        err
    )]
    async fn grant_discount(
        &self,
        discount: NewUserDiscount,
    ) -> Result<UserDiscountRecord, DiscountsServiceError> {
        let valid_until = grant_expiry(
            discount.percentage,
            discount.valid_days.unwrap_or(DEFAULT_VALID_DAYS),
            Timestamp::now(),
        )?;

        let mut tx = self.db.begin().await?;

        let created = self
            .repository
            .create_discount(
                &mut tx,
                discount.uuid,
                discount.user,
                discount.percentage,
                discount.reason.trim(),
                valid_until,
            )
            .await?;

        tx.commit().await?;

        info!(
            user_discount_uuid = %created.uuid,
            valid_until = %created.valid_until,
            "granted user discount"
        );

        Ok(created)
    }

    async fn list_active_discounts(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<UserDiscountRecord>, DiscountsServiceError> {
        let mut tx = self.db.begin().await?;

        let discounts = self
            .repository
            .list_active_discounts(&mut tx, user, now)
            .await?;

        tx.commit().await?;

        Ok(discounts)
    }

    async fn get_discount(
        &self,
        discount: UserDiscountUuid,
    ) -> Result<UserDiscountRecord, DiscountsServiceError> {
        let mut tx = self.db.begin().await?;

        let discount = self.repository.get_discount(&mut tx, discount).await?;

        tx.commit().await?;

        Ok(discount)
    }

    #[tracing::instrument(
        name = "discounts.service.delete_discount",
        skip(self),
        fields(user_discount_uuid = %discount),
        err
    )]
    async fn delete_discount(&self, discount: UserDiscountUuid) -> Result<(), DiscountsServiceError> {
        let mut tx = self.db.begin().await?;

        let rows_affected = self.repository.delete_discount(&mut tx, discount).await?;

        if rows_affected == 0 {
            return Err(DiscountsServiceError::NotFound);
        }

        tx.commit().await?;

        info!("deleted user discount");

        Ok(())
    }
}

#[automock]
#[async_trait]
pub trait DiscountsService: Send + Sync {
    /// Give a user a time-boxed percentage discount.
    async fn grant_discount(
        &self,
        discount: NewUserDiscount,
    ) -> Result<UserDiscountRecord, DiscountsServiceError>;

    /// Unexpired discounts of a user, latest expiry first.
    async fn list_active_discounts(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<UserDiscountRecord>, DiscountsServiceError>;

    /// Retrieve a single discount.
    async fn get_discount(
        &self,
        discount: UserDiscountUuid,
    ) -> Result<UserDiscountRecord, DiscountsServiceError>;

    /// Delete a discount outright.
    async fn delete_discount(&self, discount: UserDiscountUuid) -> Result<(), DiscountsServiceError>;
}
