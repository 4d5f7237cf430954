//! Loyalty service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use sankalpa::{
    discounts::grant_expiry,
    loyalty::{
        INK_BOTTLE_REWARD_REASON, INK_BOTTLE_REWARD_VALID_DAYS, ink_bottle_reward, login_date,
        record_login,
    },
};
use tracing::info;

use crate::{
    database::Db,
    domain::{
        discounts::{
            records::{UserDiscountRecord, UserDiscountUuid},
            repository::PgDiscountsRepository,
        },
        loyalty::{data::LoginSummary, errors::LoyaltyServiceError},
        users::{
            records::{UserRecord, UserUuid},
            repository::PgUsersRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgLoyaltyService {
    db: Db,
    users: PgUsersRepository,
    discounts: PgDiscountsRepository,
}

impl PgLoyaltyService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            users: PgUsersRepository::new(),
            discounts: PgDiscountsRepository::new(),
        }
    }
}

#[async_trait]
impl LoyaltyService for PgLoyaltyService {
    #[tracing::instrument(
        name = "loyalty.service.record_login",
        skip(self),
        fields(user_uuid = %user),
        err
    )]
    async fn record_login(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<LoginSummary, LoyaltyServiceError> {
        let mut tx = self.db.begin().await?;

        let locked = self.users.lock_user(&mut tx, user).await?;

        let outcome = record_login(
            locked.last_login_at.map(login_date),
            login_date(now),
            locked.login_streak,
        );

        let at = locked.last_login_at.map_or(now, |previous| previous.max(now));

        let updated = self
            .users
            .record_login(&mut tx, user, outcome.streak, at, outcome.bonus_points)
            .await?;

        tx.commit().await?;

        if outcome.bonus_points > 0 {
            info!(
                bonus_points = outcome.bonus_points,
                points = updated.points,
                "login streak completed"
            );
        }

        Ok(LoginSummary {
            user: updated,
            bonus_points: outcome.bonus_points,
        })
    }

    async fn balance(&self, user: UserUuid) -> Result<u64, LoyaltyServiceError> {
        let mut tx = self.db.begin().await?;

        let user = self.users.get_user(&mut tx, user).await?;

        tx.commit().await?;

        Ok(user.points)
    }

    #[tracing::instrument(
        name = "loyalty.service.record_ink_bottle_returns",
        skip(self),
        fields(user_uuid = %user),
        err
    )]
    async fn record_ink_bottle_returns(
        &self,
        user: UserUuid,
        bottles: u32,
    ) -> Result<UserRecord, LoyaltyServiceError> {
        if bottles == 0 {
            return Err(LoyaltyServiceError::InvalidData);
        }

        let mut tx = self.db.begin().await?;

        let updated = self
            .users
            .record_ink_bottle_returns(&mut tx, user, bottles)
            .await?;

        tx.commit().await?;

        info!(
            ink_bottle_returns = updated.ink_bottle_returns,
            "recorded ink bottle returns"
        );

        Ok(updated)
    }

    #[tracing::instrument(
        name = "loyalty.service.claim_ink_bottle_reward",
        skip(self),
        fields(user_uuid = %user),
        err
    )]
    async fn claim_ink_bottle_reward(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<UserDiscountRecord, LoyaltyServiceError> {
        let mut tx = self.db.begin().await?;

        let locked = self.users.lock_user(&mut tx, user).await?;

        let Some(percentage) = ink_bottle_reward(locked.ink_bottle_returns) else {
            return Err(LoyaltyServiceError::NoInkBottleReturns);
        };

        let valid_until = grant_expiry(percentage, INK_BOTTLE_REWARD_VALID_DAYS, now)?;

        let discount = self
            .discounts
            .create_discount(
                &mut tx,
                UserDiscountUuid::new(),
                user,
                percentage,
                INK_BOTTLE_REWARD_REASON,
                valid_until,
            )
            .await?;

        self.users.reset_ink_bottle_returns(&mut tx, user).await?;

        tx.commit().await?;

        info!(
            ink_bottle_returns = locked.ink_bottle_returns,
            discount_percentage = percentage,
            user_discount_uuid = %discount.uuid,
            "claimed ink bottle reward"
        );

        Ok(discount)
    }
}

#[automock]
#[async_trait]
pub trait LoyaltyService: Send + Sync {
    /// Count a login towards the user's daily streak, crediting the bonus when it completes.
    async fn record_login(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<LoginSummary, LoyaltyServiceError>;

    /// Current points balance.
    async fn balance(&self, user: UserUuid) -> Result<u64, LoyaltyServiceError>;

    /// Count ink bottles handed back by the user.
    async fn record_ink_bottle_returns(
        &self,
        user: UserUuid,
        bottles: u32,
    ) -> Result<UserRecord, LoyaltyServiceError>;

    /// Turn the user's returned ink bottles into a discount of 5% per bottle, valid for 30 days,
    /// and reset the count.
    async fn claim_ink_bottle_reward(
        &self,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<UserDiscountRecord, LoyaltyServiceError>;
}
