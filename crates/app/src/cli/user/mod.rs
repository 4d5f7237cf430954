use clap::{Args, Subcommand};

mod claim_bottles;
mod create;
mod login;
mod return_bottles;

#[derive(Debug, Args)]
pub(crate) struct UserCommand {
    #[command(subcommand)]
    command: UserSubcommand,
}

#[derive(Debug, Subcommand)]
enum UserSubcommand {
    Create(create::CreateUserArgs),
    Login(login::LoginArgs),
    ReturnBottles(return_bottles::ReturnBottlesArgs),
    ClaimBottles(claim_bottles::ClaimBottlesArgs),
}

pub(crate) async fn run(command: UserCommand) -> Result<(), String> {
    match command.command {
        UserSubcommand::Create(args) => create::run(args).await,
        UserSubcommand::Login(args) => login::run(args).await,
        UserSubcommand::ReturnBottles(args) => return_bottles::run(args).await,
        UserSubcommand::ClaimBottles(args) => claim_bottles::run(args).await,
    }
}
