use clap::Args;
use sankalpa_app::{
    config::DatabaseConfig,
    domain::users::{
        PgUsersService, UsersService,
        data::NewUser,
        records::UserUuid,
    },
};

use crate::cli::{connect, print_json};

#[derive(Debug, Args)]
pub(crate) struct CreateUserArgs {
    /// Email address
    #[arg(long)]
    email: String,

    /// Opening loyalty point balance
    #[arg(long, default_value_t = 0)]
    points: u64,

    /// Optional user UUID; generated when omitted
    #[arg(long)]
    user_uuid: Option<UserUuid>,

    #[command(flatten)]
    database: DatabaseConfig,
}

pub(crate) async fn run(args: CreateUserArgs) -> Result<(), String> {
    let service = PgUsersService::new(connect(&args.database).await?);

    let user = service
        .create_user(NewUser {
            uuid: args.user_uuid.unwrap_or_default(),
            email: args.email,
            points: args.points,
        })
        .await
        .map_err(|error| format!("failed to create user: {error}"))?;

    print_json(&user)
}
