//! Account maintenance commands

use anyhow::Context;

use crate::config::Config;
use crate::db::{Store, UserRepository};
use crate::entities::Role;
use crate::services::avatar::{AvatarOutcome, provider_from_config, resolve_avatar};

pub async fn cmd_confirm_email(config: &Config, email: &str) -> anyhow::Result<()> {
    let store = Store::from_config(&config.general).await?;
    let repo = UserRepository::without_avatars();

    repo.confirm_email(&store.conn, email).await?;
    println!("✓ Confirmed {email}");

    Ok(())
}

pub async fn cmd_set_role(config: &Config, email: &str, role: Role) -> anyhow::Result<()> {
    let store = Store::from_config(&config.general).await?;
    let repo = UserRepository::without_avatars();

    let account = repo.update_role(&store.conn, email, role).await?;
    println!("✓ {} is now {}", account.username, account.role.as_str());

    Ok(())
}

pub async fn cmd_set_avatar(config: &Config, email: &str, url: Option<&str>) -> anyhow::Result<()> {
    if let Some(url) = url {
        url::Url::parse(url).with_context(|| format!("Invalid avatar URL: {url}"))?;
    }

    let store = Store::from_config(&config.general).await?;
    let repo = UserRepository::without_avatars();

    let account = repo.update_avatar_url(&store.conn, email, url).await?;
    match account.avatar {
        Some(avatar) => println!("✓ Avatar of {} set to {avatar}", account.username),
        None => println!("✓ Avatar of {} cleared", account.username),
    }

    Ok(())
}

pub async fn cmd_refresh_avatar(config: &Config, email: &str) -> anyhow::Result<()> {
    let Some(provider) = provider_from_config(&config.avatar)? else {
        println!("Avatars are disabled in config ([avatar] enabled = false).");
        return Ok(());
    };

    let store = Store::from_config(&config.general).await?;
    let repo = UserRepository::without_avatars();

    if repo.get_by_email(&store.conn, email).await?.is_none() {
        println!("No account with email '{email}'.");
        return Ok(());
    }

    match resolve_avatar(provider.as_ref(), email).await {
        AvatarOutcome::Image(url) => {
            repo.update_avatar_url(&store.conn, email, Some(&url)).await?;
            println!("✓ Avatar refreshed: {url}");
        }
        AvatarOutcome::NoImage => {
            println!("No avatar available for {email}, keeping the current one.");
        }
    }

    Ok(())
}
