use clap::Args;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::{
        loyalty::{LoyaltyService, PgLoyaltyService},
        users::records::UserUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct ReturnBottlesArgs {
    /// User handing bottles back
    #[arg(long)]
    user_uuid: UserUuid,

    /// Number of ink bottles returned
    #[arg(long, default_value_t = 1)]
    bottles: u32,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: ReturnBottlesArgs) -> Result<(), String> {
    let service = PgLoyaltyService::new(connect(&args.database).await?);

    let user = service
        .record_ink_bottle_returns(args.user_uuid, args.bottles)
        .await
        .map_err(|error| format!("failed to record ink bottle returns: {error}"))?;

    print_json(&user)
}
