//! Read-only account commands

use crate::config::Config;
use crate::db::{Account, Store, UserRepository};

fn print_account(account: &Account) {
    let confirmed = if account.confirmed { "✓" } else { "✗" };
    println!(
        "{} {} <{}> [{}]",
        confirmed,
        account.username,
        account.email,
        account.role.as_str()
    );
    println!(
        "  ID: {} | Avatar: {} | Created: {}",
        account.id,
        account.avatar.as_deref().unwrap_or("-"),
        account.created_at
    );
}

pub async fn cmd_list_accounts(config: &Config) -> anyhow::Result<()> {
    let store = Store::from_config(&config.general).await?;
    let repo = UserRepository::without_avatars();
    let accounts = repo.list_all(&store.conn).await?;

    if accounts.is_empty() {
        println!("No accounts registered.");
        return Ok(());
    }

    println!("Accounts ({} total)", accounts.len());
    println!("{:-<70}", "");

    for account in &accounts {
        print_account(account);
    }

    println!();
    println!("Legend: ✓ Confirmed | ✗ Unconfirmed");

    Ok(())
}

pub async fn cmd_show_account(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = Store::from_config(&config.general).await?;
    let repo = UserRepository::without_avatars();

    let Some(account) = repo.get_by_username(&store.conn, username).await? else {
        println!("No account with username '{username}'.");
        return Ok(());
    };

    let photos = repo.count_photos(&store.conn, username).await?;

    print_account(&account);
    println!("  Photos: {photos} | Updated: {}", account.updated_at);

    Ok(())
}

pub async fn cmd_count_photos(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = Store::from_config(&config.general).await?;
    let repo = UserRepository::without_avatars();

    let photos = repo.count_photos(&store.conn, username).await?;
    println!("{username}: {photos} photo(s)");

    Ok(())
}
