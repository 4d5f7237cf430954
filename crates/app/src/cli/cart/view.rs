use clap::Args;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::{
        carts::{CartsService, PgCartsService},
        users::records::UserUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct ViewCartArgs {
    /// Cart owner
    #[arg(long)]
    user_uuid: UserUuid,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: ViewCartArgs) -> Result<(), String> {
    let service = PgCartsService::new(connect(&args.database).await?);

    let cart = service
        .view(args.user_uuid)
        .await
        .map_err(|error| format!("failed to load cart: {error}"))?;

    print_json(&cart)
}
