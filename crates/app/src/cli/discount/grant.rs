use clap::Args;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::{
        discounts::{
            DiscountsService, PgDiscountsService, data::NewUserDiscount,
            records::UserDiscountUuid,
        },
        users::records::UserUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct GrantDiscountArgs {
    /// User receiving the discount
    #[arg(long)]
    user_uuid: UserUuid,

    /// Percentage off, 0-100
    #[arg(long)]
    percentage: u16,

    /// Why the discount was granted
    #[arg(long, default_value = "")]
    reason: String,

    /// Days until the discount expires
    #[arg(long)]
    valid_days: Option<u32>,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: GrantDiscountArgs) -> Result<(), String> {
    let service = PgDiscountsService::new(connect(&args.database).await?);

    let discount = service
        .grant_discount(NewUserDiscount {
            uuid: UserDiscountUuid::new(),
            user: args.user_uuid,
            percentage: args.percentage,
            reason: args.reason,
            valid_days: args.valid_days,
        })
        .await
        .map_err(|error| format!("failed to grant discount: {error}"))?;

    print_json(&discount)
}
