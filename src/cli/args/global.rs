//! Global CLI options shared across all commands

use crate::cli::{Cli, OutputFormat};

/// Global CLI options passed to all command handlers.
///
/// Precedence is CLI flag, then environment variable, then config file, then
/// built-in default. This struct captures the CLI/env layer; the config file
/// is resolved later in `CommandContext`.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Output format (pretty, table, json)
    pub format: OutputFormat,

    /// Custom config file path (defaults to ~/.dashcache/config.yaml)
    pub config: Option<String>,

    pub debug: bool,
}

impl GlobalOptions {
    /// Called once in main.rs after parsing.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            debug: cli.debug,
        }
    }

    /// Get config path as `Option<&str>`.
    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_cli_reads_global_flags() {
        let cli = Cli::try_parse_from([
            "dashcache",
            "status",
            "--format",
            "json",
            "--config",
            "/custom/path",
        ])
        .unwrap();

        let opts = GlobalOptions::from_cli(&cli);
        assert_eq!(opts.format, OutputFormat::Json);
        assert_eq!(opts.config_ref(), Some("/custom/path"));
    }

    #[test]
    fn test_config_ref_none() {
        let opts = GlobalOptions {
            format: OutputFormat::Pretty,
            config: None,
            debug: false,
        };

        assert_eq!(opts.config_ref(), None);
        assert!(!opts.debug);
    }
}
