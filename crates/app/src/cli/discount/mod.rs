use clap::{Args, Subcommand};

mod grant;

#[derive(Debug, Args)]
pub(crate) struct DiscountCommand {
    #[command(subcommand)]
    command: DiscountSubcommand,
}

#[derive(Debug, Subcommand)]
enum DiscountSubcommand {
    Grant(grant::GrantDiscountArgs),
}

pub(crate) async fn run(command: DiscountCommand) -> Result<(), String> {
    match command.command {
        DiscountSubcommand::Grant(args) => grant::run(args).await,
    }
}
