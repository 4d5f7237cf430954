use clap::Args;
use sankalpa_app::domain::{
    orders::{OrdersService, records::OrderUuid},
    users::records::UserUuid,
};

use crate::cli::{order::ServiceArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct ShowOrderArgs {
    /// Order owner
    #[arg(long)]
    user_uuid: UserUuid,

    /// Order to show
    #[arg(long)]
    order_uuid: OrderUuid,

    #[command(flatten)]
    services: ServiceArgs,
}

pub(crate) async fn run(args: ShowOrderArgs) -> Result<(), String> {
    let context = args.services.context().await?;

    let order = context
        .orders
        .get_order(args.user_uuid, args.order_uuid)
        .await
        .map_err(|error| format!("failed to load order: {error}"))?;

    print_json(&order)
}
