use clap::Args;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::catalog::{
        CatalogService, PgCatalogService,
        data::NewProduct,
        records::ProductUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct CreateProductArgs {
    /// Product name
    #[arg(long)]
    name: String,

    /// Unit price in paisa
    #[arg(long)]
    price: u64,

    /// Units in stock
    #[arg(long, default_value_t = 0)]
    stock: u64,

    /// Optional product UUID; generated when omitted
    #[arg(long)]
    product_uuid: Option<ProductUuid>,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: CreateProductArgs) -> Result<(), String> {
    let service = PgCatalogService::new(connect(&args.database).await?);

    let product = service
        .create_product(NewProduct {
            uuid: args.product_uuid.unwrap_or_default(),
            name: args.name,
            price: args.price,
            stock: args.stock,
        })
        .await
        .map_err(|error| format!("failed to create product: {error}"))?;

    print_json(&product)
}
