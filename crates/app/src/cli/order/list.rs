use clap::Args;
use sankalpa_app::domain::{orders::OrdersService, users::records::UserUuid};

use crate::cli::{order::ServiceArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct ListOrdersArgs {
    /// Order owner
    #[arg(long)]
    user_uuid: UserUuid,

    #[command(flatten)]
    services: ServiceArgs,
}

pub(crate) async fn run(args: ListOrdersArgs) -> Result<(), String> {
    let context = args.services.context().await?;

    let orders = context
        .orders
        .list_orders(args.user_uuid)
        .await
        .map_err(|error| format!("failed to list orders: {error}"))?;

    print_json(&orders)
}
