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
pub(crate) struct LoginArgs {
    /// User logging in
    #[arg(long)]
    user_uuid: UserUuid,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: LoginArgs) -> Result<(), String> {
    let service = PgLoyaltyService::new(connect(&args.database).await?);

    let summary = service
        .record_login(args.user_uuid, Timestamp::now())
        .await
        .map_err(|error| format!("failed to record login: {error}"))?;

    print_json(&summary)
}
