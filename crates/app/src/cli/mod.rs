use clap::{Parser, Subcommand};
use sankalpa_app::{
    config::{DatabaseConfig, LoggingConfig},
    database::{self, Db},
};
use serde::Serialize;

mod cart;
mod db;
mod discount;
mod order;
mod product;
mod promo;
mod user;

#[derive(Debug, Parser)]
#[command(name = "sankalpa-app", about = "Sankalpa checkout CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Db(db::DbCommand),
    User(user::UserCommand),
    Product(product::ProductCommand),
    Cart(cart::CartCommand),
    Promo(promo::PromoCommand),
    Discount(discount::DiscountCommand),
    Order(order::OrderCommand),
}

impl Cli {
    pub(crate) fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Db(command) => db::run(command).await,
            Commands::User(command) => user::run(command).await,
            Commands::Product(command) => product::run(command).await,
            Commands::Cart(command) => cart::run(command).await,
            Commands::Promo(command) => promo::run(command).await,
            Commands::Discount(command) => discount::run(command).await,
            Commands::Order(command) => order::run(command).await,
        }
    }
}

pub(crate) async fn connect(config: &DatabaseConfig) -> Result<Db, String> {
    database::connect(&config.database_url)
        .await
        .map(Db::new)
        .map_err(|error| format!("failed to connect to database: {error}"))
}

pub(crate) fn print_json(value: &impl Serialize) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|error| format!("failed to encode output: {error}"))?;

    println!("{json}");

    Ok(())
}
