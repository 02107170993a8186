//! Operator command-line interface over the account repository.

mod commands;

use clap::{Parser, Subcommand};

use crate::entities::Role;

/// account-store - user account maintenance
#[derive(Parser)]
#[command(name = "account-store")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all accounts
    #[command(alias = "ls", alias = "l")]
    List,

    /// Show one account by username
    #[command(alias = "i")]
    Show {
        /// Username
        username: String,
    },

    /// Mark an account's email as confirmed
    Confirm {
        /// Account email
        email: String,
    },

    /// Change the role of an account
    SetRole {
        /// Account email
        email: String,
        /// New role: admin, moderator or user
        #[arg(value_parser = Role::parse)]
        role: Role,
    },

    /// Set or clear the avatar URL of an account
    SetAvatar {
        /// Account email
        email: String,
        /// New avatar URL; omit to clear the avatar
        url: Option<String>,
    },

    /// Look the avatar up again from Gravatar and store it
    RefreshAvatar {
        /// Account email
        email: String,
    },

    /// Count the photos owned by an account
    Photos {
        /// Username
        username: String,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
