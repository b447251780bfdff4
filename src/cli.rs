// src/cli.rs — Command-line interface

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "flockmirror", version, about = "Follow/unfollow scheduling engine")]
pub struct Cli {
    /// Path to config.toml (defaults to the standard config dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Start the periodic driver (and the control API, if enabled)
    Run,

    /// Run one cycle now and report the outcome
    Trigger {
        #[arg(value_enum)]
        task: TaskArg,
    },

    /// Show current settings and store counts
    Status,

    /// Update runtime settings
    Set {
        /// Profile URL of the account whose followers are mirrored
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        daily_follow_limit: Option<u32>,
        /// Days to wait for reciprocity before unfollowing
        #[arg(long)]
        unfollow_delay: Option<u32>,
        /// Only follow accounts active within the last 30 days
        #[arg(long)]
        filter_active: Option<bool>,
        /// Master on/off switch for both cycles
        #[arg(long)]
        bot_active: Option<bool>,
    },

    /// Manage the never-auto-unfollow whitelist
    Whitelist {
        #[command(subcommand)]
        action: WhitelistAction,
    },

    /// Show recent audit log entries
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TaskArg {
    Follow,
    Unfollow,
}

#[derive(Subcommand, Clone)]
pub enum WhitelistAction {
    /// Add a user by handle
    Add { screen_name: String },
    /// Remove a user by id
    Remove { user_id: String },
    /// List all whitelist entries
    List,
}
