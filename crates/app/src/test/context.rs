//! Test context for service-level integration tests.

use std::sync::Arc;

use sankalpa::gateway::{EsewaGateway, GatewayConfig};

use crate::{
    config::{PromotionsConfig, SettlementConfig},
    database::Db,
    domain::{
        carts::PgCartsService, catalog::PgCatalogService, discounts::PgDiscountsService,
        loyalty::PgLoyaltyService, orders::PgOrdersService, promo_codes::PgPromoCodesService,
        users::PgUsersService,
    },
    notifications::{LogReceiptNotifier, ReceiptNotifier},
};

use super::db::TestDb;

pub struct TestContext {
    pub db: TestDb,
    pub gateway: Arc<EsewaGateway>,
    pub users: PgUsersService,
    pub catalog: PgCatalogService,
    pub carts: PgCartsService,
    pub discounts: PgDiscountsService,
    pub promo_codes: PgPromoCodesService,
    pub loyalty: PgLoyaltyService,
    pub orders: PgOrdersService,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_settlement(SettlementConfig::default(), Arc::new(LogReceiptNotifier)).await
    }

    /// Build a context whose orders service uses the given settlement policy and notifier.
    pub async fn with_settlement(
        config: SettlementConfig,
        notifier: Arc<dyn ReceiptNotifier>,
    ) -> Self {
        let test_db = TestDb::new().await;
        let db = Db::new(test_db.pool().clone());
        let gateway = Arc::new(EsewaGateway::new(GatewayConfig::sandbox()));

        Self {
            users: PgUsersService::new(db.clone()),
            catalog: PgCatalogService::new(db.clone()),
            carts: PgCartsService::new(db.clone()),
            discounts: PgDiscountsService::new(db.clone()),
            promo_codes: PgPromoCodesService::new(db.clone(), PromotionsConfig::default()),
            loyalty: PgLoyaltyService::new(db.clone()),
            orders: PgOrdersService::new(db, config, gateway.clone(), notifier),
            gateway,
            db: test_db,
        }
    }
}
