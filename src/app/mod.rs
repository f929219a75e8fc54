//! Command-line surface: argument parsing, dispatch and rendering.

mod commands;
pub mod ui;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::error::Result;

pub use commands::prompt_config;

#[derive(Parser, Debug)]
#[command(
    name = "wip",
    version,
    about = "Where did I leave off? A morning briefing for developers."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub display: DisplayArgs,
}

#[derive(Args, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
    /// Show full detail
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan repositories and show the briefing (same as no subcommand)
    Scan {
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Add a work-in-progress item
    Add {
        /// What are you working on?
        description: String,
        /// Repository to link (detected from the current directory if omitted)
        #[arg(short, long)]
        repo: Option<PathBuf>,
    },
    /// Mark a work-in-progress item as done
    Done {
        /// Item id
        id: u64,
    },
    /// List work-in-progress items
    List {
        /// Include completed items
        #[arg(short, long)]
        all: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// AI-powered commands (requires an LLM provider)
    Ai {
        #[command(subcommand)]
        command: AiCommand,
        /// API key, overriding the environment
        #[arg(long, global = true)]
        api_key: Option<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Set up configuration interactively
    Init,
    /// Print the current configuration
    Show,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum AiCommand {
    /// Narrative morning briefing
    Briefing,
    /// Draft a standup update from recent activity
    Standup,
    /// Ask a question about your repositories and work items
    Ask {
        query: String,
    },
}

/// Run one parsed invocation to completion.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => commands::run_briefing(cli.display).await,
        Some(Command::Scan { display }) => commands::run_briefing(display).await,
        Some(Command::Add { description, repo }) => commands::add(&description, repo),
        Some(Command::Done { id }) => commands::done(id),
        Some(Command::List { all }) => commands::list(all),
        Some(Command::Config { command }) => match command {
            ConfigCommand::Init => commands::config_init(),
            ConfigCommand::Show => commands::config_show(),
        },
        Some(Command::Ai { command, api_key }) => {
            commands::ai(command, api_key.as_deref()).await
        }
    }
}
