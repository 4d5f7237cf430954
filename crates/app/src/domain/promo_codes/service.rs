//! Promo codes service.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use sankalpa::promotions::{PromoApplication, PromoCode, PromoRejection, validate_new_terms};
use sqlx::Connection;
use tracing::{debug, info};

use crate::{
    config::PromotionsConfig,
    database::{Db, is_unique_violation_on},
    domain::promo_codes::{
        data::NewPromoCode,
        errors::PromoCodesServiceError,
        records::PromoCodeRecord,
        repository::{PROMO_CODE_UNIQUE_CONSTRAINT, PgPromoCodesRepository},
    },
};

#[derive(Debug, Clone)]
pub struct PgPromoCodesService {
    db: Db,
    config: PromotionsConfig,
    repository: PgPromoCodesRepository,
}

impl PgPromoCodesService {
    #[must_use]
    pub fn new(db: Db, config: PromotionsConfig) -> Self {
        Self {
            db,
            config,
            repository: PgPromoCodesRepository::new(),
        }
    }
}

/// Unparseable codes cannot exist in storage.
fn parse_code(code: &str) -> Result<PromoCode, PromoCodesServiceError> {
    code.parse::<PromoCode>()
        .map_err(|_err| PromoCodesServiceError::NotFound)
}

#[async_trait]
impl PromoCodesService for PgPromoCodesService {
    #[tracing::instrument(
        name = "promo_codes.service.create_promo_code",
        skip(self, promo),
        fields(promo_code_uuid = %promo.uuid),
        err
    )]
    async fn create_promo_code(
        &self,
        promo: NewPromoCode,
    ) -> Result<PromoCodeRecord, PromoCodesServiceError> {
        validate_new_terms(
            promo.discount,
            promo.valid_from,
            promo.valid_until,
            promo.max_uses,
        )?;

        let mut tx = self.db.begin().await?;

        let created = if let Some(code) = &promo.code {
            self.repository.create_promo_code(&mut tx, &promo, code).await?
        } else {
            let mut attempt = 0;

            loop {
                attempt += 1;

                let code = PromoCode::generate(&mut rand::thread_rng());
                let mut savepoint = Connection::begin(&mut *tx).await?;

                match self
                    .repository
                    .create_promo_code(&mut savepoint, &promo, &code)
                    .await
                {
                    Ok(created) => {
                        savepoint.commit().await?;
                        break created;
                    }
                    Err(error) if is_unique_violation_on(&error, PROMO_CODE_UNIQUE_CONSTRAINT) => {
                        savepoint.rollback().await?;

                        debug!(attempt, "promo code collision, regenerating");

                        if attempt >= self.config.code_attempts {
                            return Err(PromoCodesServiceError::CodeExhausted { attempts: attempt });
                        }
                    }
                    Err(error) => return Err(error.into()),
                }
            }
        };

        tx.commit().await?;

        info!(promo_code = %created.code, "created promo code");

        Ok(created)
    }

    async fn validate_promo(
        &self,
        code: &str,
        now: Timestamp,
    ) -> Result<PromoCodeRecord, PromoCodesServiceError> {
        let code = parse_code(code)?;

        let mut tx = self.db.begin().await?;

        let promo = self.repository.get_promo_code(&mut tx, &code).await?;

        tx.commit().await?;

        promo.terms().validate(now)?;

        Ok(promo)
    }

    #[tracing::instrument(
        name = "promo_codes.service.apply_promo",
        skip(self, code),
        err
    )]
    async fn apply_promo(
        &self,
        code: &str,
        order_total: u64,
        now: Timestamp,
    ) -> Result<PromoApplication, PromoCodesServiceError> {
        let code = parse_code(code)?;

        let mut tx = self.db.begin().await?;

        let promo = self.repository.lock_promo_code(&mut tx, &code).await?;

        let application = promo.terms().apply(order_total, now)?;

        let Some(used) = self.repository.record_promo_use(&mut tx, promo.uuid).await? else {
            return Err(PromoRejection::Exhausted.into());
        };

        tx.commit().await?;

        info!(
            promo_code = %used.code,
            current_uses = used.current_uses,
            discount_amount = application.discount_amount,
            "applied promo code"
        );

        Ok(application)
    }
}

#[automock]
#[async_trait]
pub trait PromoCodesService: Send + Sync {
    /// Create a promo code, generating the code itself unless one is given.
    async fn create_promo_code(
        &self,
        promo: NewPromoCode,
    ) -> Result<PromoCodeRecord, PromoCodesServiceError>;

    /// Check a code is usable at `now` without consuming a use.
    async fn validate_promo(
        &self,
        code: &str,
        now: Timestamp,
    ) -> Result<PromoCodeRecord, PromoCodesServiceError>;

    /// Consume one use of a code against `order_total`.
    async fn apply_promo(
        &self,
        code: &str,
        order_total: u64,
        now: Timestamp,
    ) -> Result<PromoApplication, PromoCodesServiceError>;
}
