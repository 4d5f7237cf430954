use clap::Args;
use jiff::Timestamp;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::{
        loyalty::{LoyaltyService, PgLoyaltyService},
        users::records::UserUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct ClaimBottlesArgs {
    /// User claiming the reward
    #[arg(long)]
    user_uuid: UserUuid,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: ClaimBottlesArgs) -> Result<(), String> {
    let service = PgLoyaltyService::new(connect(&args.database).await?);

    let discount = service
        .claim_ink_bottle_reward(args.user_uuid, Timestamp::now())
        .await
        .map_err(|error| format!("failed to claim ink bottle reward: {error}"))?;

    print_json(&discount)
}
