//! Init command implementation

use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::config::Config;
use crate::error::{Error, Result};

/// Write a configuration file populated with the built-in defaults
pub fn run(opts: &GlobalOptions, force: bool) -> Result<()> {
    let path = Config::resolve_path(opts.config_ref())?;

    if path.exists() && !force {
        return Err(Error::Other(format!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let config = Config::default();
    config.save_to(&path)?;
    log::debug!("Wrote default configuration to {}", path.display());

    println!(
        "{} Configuration saved to: {}",
        "✓".green(),
        path.display()
    );
    println!("  Version tag: {}", config.proxy.version.bold());
    println!("  Origin:      {}", config.proxy.origin.bold());

    println!("\n{}", "Next steps:".bold());
    println!("  {} - Show configuration status", "dashcache status".cyan());
    println!("  {} - Pre-cache the asset manifest", "dashcache install".cyan());

    Ok(())
}
