//! App Context

use std::sync::Arc;

use sankalpa::gateway::{EsewaGateway, GatewayConfig};
use thiserror::Error;

use crate::{
    config::{PromotionsConfig, SettlementConfig},
    database::{self, Db},
    domain::{
        carts::{CartsService, PgCartsService},
        catalog::{CatalogService, PgCatalogService},
        discounts::{DiscountsService, PgDiscountsService},
        loyalty::{LoyaltyService, PgLoyaltyService},
        orders::{OrdersService, PgOrdersService},
        promo_codes::{PgPromoCodesService, PromoCodesService},
        users::{PgUsersService, UsersService},
    },
    notifications::{LogReceiptNotifier, ReceiptNotifier},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),
}

/// Settings the services are built from.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub gateway: GatewayConfig,
    pub settlement: SettlementConfig,
    pub promotions: PromotionsConfig,
}

#[derive(Clone)]
pub struct AppContext {
    pub users: Arc<dyn UsersService>,
    pub catalog: Arc<dyn CatalogService>,
    pub carts: Arc<dyn CartsService>,
    pub discounts: Arc<dyn DiscountsService>,
    pub promo_codes: Arc<dyn PromoCodesService>,
    pub loyalty: Arc<dyn LoyaltyService>,
    pub orders: Arc<dyn OrdersService>,
}

impl AppContext {
    /// Build application context from a database URL.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection fails.
    pub async fn from_database_url(url: &str, settings: AppSettings) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        Ok(Self::from_db(
            Db::new(pool),
            settings,
            Arc::new(LogReceiptNotifier),
        ))
    }

    /// Wire every service onto one database handle.
    #[must_use]
    pub fn from_db(db: Db, settings: AppSettings, notifier: Arc<dyn ReceiptNotifier>) -> Self {
        let gateway = Arc::new(EsewaGateway::new(settings.gateway));

        Self {
            users: Arc::new(PgUsersService::new(db.clone())),
            catalog: Arc::new(PgCatalogService::new(db.clone())),
            carts: Arc::new(PgCartsService::new(db.clone())),
            discounts: Arc::new(PgDiscountsService::new(db.clone())),
            promo_codes: Arc::new(PgPromoCodesService::new(db.clone(), settings.promotions)),
            loyalty: Arc::new(PgLoyaltyService::new(db.clone())),
            orders: Arc::new(PgOrdersService::new(
                db,
                settings.settlement,
                gateway,
                notifier,
            )),
        }
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").finish_non_exhaustive()
    }
}
