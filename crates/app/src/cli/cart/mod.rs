use clap::{Args, Subcommand};

mod add;
mod view;

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    Add(add::AddToCartArgs),
    View(view::ViewCartArgs),
}

pub(crate) async fn run(command: CartCommand) -> Result<(), String> {
    match command.command {
        CartSubcommand::Add(args) => add::run(args).await,
        CartSubcommand::View(args) => view::run(args).await,
    }
}
