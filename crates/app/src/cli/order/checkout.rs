use clap::Args;
use jiff::Timestamp;
use sankalpa::orders::{PaymentMethod, ShippingAddress};
use sankalpa_app::domain::{
    orders::{OrdersService, data::CheckoutRequest},
    users::records::UserUuid,
};
use serde_json::{Map, Value, json};

use crate::cli::{order::ServiceArgs, print_json};

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    /// User checking out
    #[arg(long)]
    user_uuid: UserUuid,

    /// Loyalty points to redeem
    #[arg(long, default_value_t = 0)]
    points: u64,

    /// Payment method (esewa, cod)
    #[arg(long, default_value = "esewa")]
    payment_method: PaymentMethod,

    /// Recipient name
    #[arg(long)]
    full_name: String,

    /// Contact phone number
    #[arg(long)]
    phone: String,

    /// Street address
    #[arg(long)]
    address: String,

    /// City
    #[arg(long)]
    city: String,

    #[command(flatten)]
    services: ServiceArgs,
}

pub(crate) async fn run(args: CheckoutArgs) -> Result<(), String> {
    let context = args.services.context().await?;

    let outcome = context
        .orders
        .checkout(
            args.user_uuid,
            CheckoutRequest {
                points_redeemed: args.points,
                payment_method: args.payment_method,
                shipping_address: ShippingAddress {
                    full_name: args.full_name,
                    phone: args.phone,
                    address: args.address,
                    city: args.city,
                },
            },
            Timestamp::now(),
        )
        .await
        .map_err(|error| format!("checkout failed: {error}"))?;

    let fields: Map<String, Value> = outcome
        .payment
        .fields
        .iter()
        .map(|(name, value)| ((*name).to_string(), Value::String(value.clone())))
        .collect();

    print_json(&json!({
        "order": outcome.order,
        "payment": {
            "action_url": outcome.payment.action_url,
            "fields": fields,
        },
    }))
}
