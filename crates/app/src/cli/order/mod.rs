use clap::{Args, Subcommand};
use sankalpa::gateway::GatewayConfig;
use sankalpa_app::{
    config::{DatabaseConfig, GatewayArgs, PromotionsConfig, SettlementArgs},
    context::{AppContext, AppSettings},
};

mod checkout;
mod confirm;
mod fail;
mod list;
mod show;

#[derive(Debug, Args)]
pub(crate) struct OrderCommand {
    #[command(subcommand)]
    command: OrderSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrderSubcommand {
    Checkout(checkout::CheckoutArgs),
    Confirm(confirm::ConfirmArgs),
    Fail(fail::FailArgs),
    List(list::ListOrdersArgs),
    Show(show::ShowOrderArgs),
}

pub(crate) async fn run(command: OrderCommand) -> Result<(), String> {
    match command.command {
        OrderSubcommand::Checkout(args) => checkout::run(args).await,
        OrderSubcommand::Confirm(args) => confirm::run(args).await,
        OrderSubcommand::Fail(args) => fail::run(args).await,
        OrderSubcommand::List(args) => list::run(args).await,
        OrderSubcommand::Show(args) => show::run(args).await,
    }
}

/// Everything the orders service needs to be built.
#[derive(Debug, Args)]
pub(crate) struct ServiceArgs {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(flatten)]
    gateway: GatewayArgs,

    #[command(flatten)]
    settlement: SettlementArgs,
}

impl ServiceArgs {
    pub(crate) async fn context(self) -> Result<AppContext, String> {
        AppContext::from_database_url(
            &self.database.database_url,
            AppSettings {
                gateway: GatewayConfig::from(self.gateway),
                settlement: self.settlement.into(),
                promotions: PromotionsConfig::default(),
            },
        )
        .await
        .map_err(|error| format!("failed to start: {error}"))
    }
}
