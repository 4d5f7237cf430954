use clap::Args;
use jiff::Timestamp;
use sankalpa_app::{
    config::{DatabaseConfig, PromotionsConfig},
    domain::promo_codes::{PgPromoCodesService, PromoCodesService},
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct ApplyPromoArgs {
    /// Code as entered by the customer
    #[arg(long)]
    code: String,

    /// Order total in paisa
    #[arg(long)]
    order_total: u64,

    /// Only check the code, without using it up
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: ApplyPromoArgs) -> Result<(), String> {
    let service = PgPromoCodesService::new(
        connect(&args.database).await?,
        PromotionsConfig::default(),
    );

    let now = Timestamp::now();

    if args.dry_run {
        let promo = service
            .validate_promo(&args.code, now)
            .await
            .map_err(|error| format!("promo code rejected: {error}"))?;

        return print_json(&promo);
    }

    let application = service
        .apply_promo(&args.code, args.order_total, now)
        .await
        .map_err(|error| format!("promo code rejected: {error}"))?;

    print_json(&application)
}
