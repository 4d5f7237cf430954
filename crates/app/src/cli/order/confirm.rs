use clap::Args;
use sankalpa_app::domain::orders::{OrdersService, data::ConfirmOutcome, records::OrderUuid};
use serde_json::json;

use crate::cli::{order::ServiceArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct ConfirmArgs {
    /// Order being paid for
    #[arg(long)]
    order_uuid: OrderUuid,

    /// Base64 `data` parameter from the gateway redirect
    #[arg(long)]
    data: String,

    #[command(flatten)]
    services: ServiceArgs,
}

pub(crate) async fn run(args: ConfirmArgs) -> Result<(), String> {
    let context = args.services.context().await?;

    let outcome = context
        .orders
        .confirm_payment(args.order_uuid, &args.data)
        .await
        .map_err(|error| format!("payment not confirmed: {error}"))?;

    let status = match &outcome {
        ConfirmOutcome::Settled(_) => "settled",
        ConfirmOutcome::AlreadySettled(_) => "already_settled",
    };

    print_json(&json!({
        "outcome": status,
        "order": outcome.order(),
    }))
}
