use clap::Args;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::catalog::{CatalogService, PgCatalogService},
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct ListProductsArgs {
    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: ListProductsArgs) -> Result<(), String> {
    let service = PgCatalogService::new(connect(&args.database).await?);

    let products = service
        .list_products()
        .await
        .map_err(|error| format!("failed to list products: {error}"))?;

    print_json(&products)
}
