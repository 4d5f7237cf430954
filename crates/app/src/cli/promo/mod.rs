use clap::{Args, Subcommand};

mod apply;
mod create;

#[derive(Debug, Args)]
pub(crate) struct PromoCommand {
    #[command(subcommand)]
    command: PromoSubcommand,
}

#[derive(Debug, Subcommand)]
enum PromoSubcommand {
    Create(create::CreatePromoArgs),
    Apply(apply::ApplyPromoArgs),
}

pub(crate) async fn run(command: PromoCommand) -> Result<(), String> {
    match command.command {
        PromoSubcommand::Create(args) => create::run(args).await,
        PromoSubcommand::Apply(args) => apply::run(args).await,
    }
}
