//! chatsync CLI
//!
//! Command-line client that keeps chat sessions and settings in sync with a
//! WebDAV or Upstash backend.
//!
//! # Commands
//!
//! - `init` - Write a default config file
//! - `sync` - Run one fetch, merge and push cycle
//! - `check` - Probe the configured backend
//! - `status` - Summarize the local document
//! - `export` / `import` - Manual backups
//! - `config` - Show or edit the sync config

mod commands;

use chatsync_engine::ProviderKind;
use clap::{Parser, Subcommand, ValueEnum};
use commands::config::AccountArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// chatsync command-line sync client.
#[derive(Parser)]
#[command(name = "chatsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the sync config file
    #[arg(global = true, short, long, default_value = "chatsync-config.json")]
    config: PathBuf,

    /// Path to the local document
    #[arg(global = true, short, long, default_value = "chatsync-data.json")]
    data: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Run one sync cycle
    Sync,

    /// Check that the backend is reachable
    Check,

    /// Summarize the local document
    Status {
        /// List every session
        #[arg(short, long)]
        sessions: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Export the local document to a backup file
    Export {
        /// Directory to write the backup into
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Merge a backup file into the local document
    Import {
        /// Backup file to import
        file: PathBuf,
    },

    /// Show or edit the sync config
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the config (secrets are never shown)
    Show {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Select the backend and update its account
    SetProvider {
        /// Backend to use
        provider: ProviderArg,

        #[command(flatten)]
        account: AccountArgs,
    },

    /// Turn the proxy on or off
    Proxy {
        /// New proxy state
        state: Toggle,

        /// Proxy prefix URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Webdav,
    Upstash,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Webdav => ProviderKind::WebDav,
            ProviderArg::Upstash => ProviderKind::Upstash,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::config::init(&cli.config, force)?,
        Commands::Sync => commands::sync::run(&cli.config, &cli.data)?,
        Commands::Check => commands::sync::check(&cli.config, &cli.data)?,
        Commands::Status { sessions, format } => {
            commands::status::run(&cli.data, sessions, &format)?;
        }
        Commands::Export { out } => {
            commands::backup::export(&cli.data, &out)?;
        }
        Commands::Import { file } => commands::backup::import(&cli.data, &file)?,
        Commands::Config(ConfigCommand::Show { format }) => {
            commands::config::show(&cli.config, &format)?;
        }
        Commands::Config(ConfigCommand::SetProvider { provider, account }) => {
            commands::config::set_provider(&cli.config, provider.into(), &account)?;
        }
        Commands::Config(ConfigCommand::Proxy { state, url }) => {
            commands::config::proxy(&cli.config, matches!(state, Toggle::On), url)?;
        }
    }

    Ok(())
}
