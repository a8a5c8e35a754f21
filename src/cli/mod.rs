//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod args;
pub mod cache;
pub mod context;
pub mod init;
pub mod proxy;
pub mod state;
pub mod status;

pub use args::{GlobalOptions, OutputFormat};
pub use context::CommandContext;

/// dashcache - durable client state and offline asset cache
#[derive(Parser, Debug)]
#[command(name = "dashcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "DASHCACHE_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "DASHCACHE_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "DASHCACHE_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Show configuration, state store and cache status
    Status,

    /// Display version information
    Version,

    /// Pre-cache the asset manifest into the current generation
    #[command(after_help = "EXAMPLES:\n  \
            dashcache install                 # Install and activate\n  \
            dashcache install --format json   # Report as JSON")]
    Install,

    /// Activate an installed generation and delete older ones
    Activate,

    /// Fetch a URL through the cache proxy
    #[command(after_help = "EXAMPLES:\n  \
            dashcache fetch /index.tsx                     # Asset (stale-while-revalidate)\n  \
            dashcache fetch /templates/mrr --navigate      # Page load (network-first)\n  \
            dashcache fetch https://esm.sh/react@19 --body # Print the response body")]
    Fetch {
        /// URL to fetch, absolute or relative to the configured origin
        url: String,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,

        /// Treat the request as a top-level page navigation
        #[arg(long)]
        navigate: bool,

        /// Print the response body instead of a summary
        #[arg(long)]
        body: bool,
    },

    /// Inspect and manage cache generations
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Inspect and edit durable state slots
    #[command(subcommand)]
    State(StateCommands),

    /// Generate shell completions
    #[command(after_help = "\
Examples:
  bash:   dashcache completion bash > /etc/bash_completion.d/dashcache
  zsh:    dashcache completion zsh > \"${fpath[1]}/_dashcache\"
  fish:   dashcache completion fish > ~/.config/fish/completions/dashcache.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,
    /// Delete every cache generation
    Clear,
    /// List cache generations
    #[command(visible_alias = "ls")]
    Generations,
    /// List cached entries
    Entries {
        /// Only this generation (defaults to all)
        #[arg(long, short = 'g')]
        generation: Option<String>,
    },
    /// Print cache database path
    Path,
}

/// Durable state subcommands
#[derive(Subcommand, Debug)]
pub enum StateCommands {
    /// Read a slot, falling back to a default when missing or corrupt
    #[command(after_help = "EXAMPLES:\n  \
            dashcache state get favorites --default '[]'\n  \
            dashcache state get brand --format json")]
    Get {
        /// Slot key (without the prefix)
        key: String,

        /// Default JSON value used when the slot is missing or unreadable
        #[arg(long, short = 'd', default_value = "null")]
        default: String,
    },
    /// Write a JSON value to a slot
    #[command(after_help = "EXAMPLES:\n  \
            dashcache state set favorites '[\"tmpl-1\"]'\n  \
            dashcache state set brand '{\"density\":\"compact\"}'")]
    Set {
        /// Slot key (without the prefix)
        key: String,

        /// JSON value
        value: String,
    },
    /// List stored slots
    #[command(visible_alias = "ls")]
    List,
    /// Remove a slot
    #[command(visible_alias = "rm")]
    Remove {
        /// Slot key (without the prefix)
        key: String,
    },
}
