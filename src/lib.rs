pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod services;

use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{
    Cli, Commands, cmd_confirm_email, cmd_count_photos, cmd_list_accounts, cmd_refresh_avatar,
    cmd_set_avatar, cmd_set_role, cmd_show_account,
};
pub use config::Config;
pub use db::{Account, NewAccount, Store, UserRepository};
pub use entities::Role;
pub use error::{AccountError, AccountResult};

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = Config::locate();
    let config = Config::load_from(config_path.as_deref())?;
    config.validate()?;

    init_tracing(&config.general.log_level);
    match &config_path {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::List => cmd_list_accounts(&config).await,
        Commands::Show { username } => cmd_show_account(&config, &username).await,
        Commands::Confirm { email } => cmd_confirm_email(&config, &email).await,
        Commands::SetRole { email, role } => cmd_set_role(&config, &email, role).await,
        Commands::SetAvatar { email, url } => {
            cmd_set_avatar(&config, &email, url.as_deref()).await
        }
        Commands::RefreshAvatar { email } => cmd_refresh_avatar(&config, &email).await,
        Commands::Photos { username } => cmd_count_photos(&config, &username).await,
        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("Created config.toml");
            } else {
                println!("config.toml already exists");
            }
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
