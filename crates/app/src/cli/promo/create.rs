use clap::Args;
use jiff::{SignedDuration, Timestamp};
use sankalpa::promotions::{PromoCode, PromoDiscount};
use sankalpa_app::{
    config::{DEFAULT_PROMO_CODE_ATTEMPTS, DatabaseConfig, PromotionsConfig},
    domain::promo_codes::{
        PgPromoCodesService, PromoCodesService,
        data::NewPromoCode,
        records::PromoCodeUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct CreatePromoArgs {
    /// Code customers enter; generated when omitted
    #[arg(long)]
    code: Option<PromoCode>,

    /// Percentage off the order total
    #[arg(long, conflicts_with = "amount", required_unless_present = "amount")]
    percentage: Option<u16>,

    /// Fixed amount off, in paisa
    #[arg(long)]
    amount: Option<u64>,

    /// Times the code can be used
    #[arg(long)]
    max_uses: u32,

    /// Days from now until the code expires
    #[arg(long, default_value_t = 30)]
    valid_days: u32,

    /// Create the code switched off
    #[arg(long)]
    inactive: bool,

    /// Attempts at generating an unused code
    #[arg(long, env = "PROMO_CODE_ATTEMPTS", default_value_t = DEFAULT_PROMO_CODE_ATTEMPTS)]
    code_attempts: u32,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: CreatePromoArgs) -> Result<(), String> {
    let discount = match (args.percentage, args.amount) {
        (Some(percentage), _) => PromoDiscount::PercentageOff(percentage),
        (None, Some(amount)) => PromoDiscount::FixedAmountOff(amount),
        (None, None) => return Err("either --percentage or --amount is required".to_string()),
    };

    let valid_from = Timestamp::now();
    let valid_until = valid_from
        .checked_add(SignedDuration::from_hours(i64::from(args.valid_days) * 24))
        .map_err(|error| format!("invalid validity window: {error}"))?;

    let service = PgPromoCodesService::new(
        connect(&args.database).await?,
        PromotionsConfig {
            code_attempts: args.code_attempts,
        },
    );

    let promo = service
        .create_promo_code(NewPromoCode {
            uuid: PromoCodeUuid::new(),
            code: args.code,
            discount,
            is_active: !args.inactive,
            valid_from,
            valid_until,
            max_uses: args.max_uses,
        })
        .await
        .map_err(|error| format!("failed to create promo code: {error}"))?;

    print_json(&promo)
}
