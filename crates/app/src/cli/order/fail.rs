use clap::Args;
use sankalpa_app::domain::{
    orders::{OrdersService, records::OrderUuid},
    users::records::UserUuid,
};

use crate::cli::order::ServiceArgs;

#[derive(Debug, Args)]
pub(crate) struct FailArgs {
    /// Order owner
    #[arg(long)]
    user_uuid: UserUuid,

    /// Order whose payment failed
    #[arg(long)]
    order_uuid: OrderUuid,

    #[command(flatten)]
    services: ServiceArgs,
}

pub(crate) async fn run(args: FailArgs) -> Result<(), String> {
    let context = args.services.context().await?;

    context
        .orders
        .fail_payment(args.user_uuid, args.order_uuid)
        .await
        .map_err(|error| format!("failed to cancel order: {error}"))?;

    println!("order {} cancelled", args.order_uuid);

    Ok(())
}
