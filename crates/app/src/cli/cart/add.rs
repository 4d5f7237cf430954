use clap::Args;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::{
        carts::{CartsService, PgCartsService},
        catalog::records::ProductUuid,
        users::records::UserUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct AddToCartArgs {
    /// Cart owner
    #[arg(long)]
    user_uuid: UserUuid,

    /// Product to add
    #[arg(long)]
    product_uuid: ProductUuid,

    /// Quantity to set on the new line
    #[arg(long, default_value_t = 1)]
    quantity: u64,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: AddToCartArgs) -> Result<(), String> {
    let service = PgCartsService::new(connect(&args.database).await?);

    let mut line = service
        .add(args.user_uuid, args.product_uuid)
        .await
        .map_err(|error| format!("failed to add to cart: {error}"))?;

    if args.quantity != line.quantity {
        line = service
            .update_quantity(args.user_uuid, line.uuid, args.quantity)
            .await
            .map_err(|error| format!("failed to set quantity: {error}"))?;
    }

    print_json(&line)
}
