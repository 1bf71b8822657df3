//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppMode;

/// newsroom: plans and publishes a daily queue of AI news posts to Telegram
#[derive(Parser, Debug)]
#[command(name = "newsroom")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file (environment variables take precedence)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sweep all feeds once
    Fetch,

    /// Plan today's queue
    Plan(PlanArgs),

    /// Show the queue for a day
    Queue(QueueArgs),

    /// Publish one of today's slots now
    PostSlot(PostSlotArgs),

    /// Publish the newest unposted item outside the schedule
    PostNow,

    /// Run the long-lived process (bot with scheduler, or dashboard)
    Run(RunArgs),

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Also re-plan slots that failed to publish
    #[arg(long)]
    pub replan_failed: bool,
}

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Day to show (YYYY-MM-DD), defaults to today in the configured timezone
    #[arg(long)]
    pub day: Option<String>,
}

#[derive(Args, Debug)]
pub struct PostSlotArgs {
    /// Slot time as HH:MM
    pub slot: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Process role, defaults to APP_MODE
    #[arg(long, value_enum)]
    pub mode: Option<AppMode>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate an example env file
    Init {
        /// Path to write the env file
        #[arg(long, default_value = "./.env.example")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
