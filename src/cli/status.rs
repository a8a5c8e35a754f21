//! Status command implementation

use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::proxy::{CacheStorage, WorkerState};

/// Display configuration, durable state and cache status
pub fn run(opts: &GlobalOptions) -> Result<()> {
    let config_path = Config::resolve_path(opts.config_ref())?;
    let ctx = match CommandContext::new(opts) {
        Ok(ctx) => ctx,
        Err(e) => {
            println!("{}\n", "dashcache Status".bold());
            println!("{} Configuration could not be loaded: {}", "✗".red(), e);
            println!(
                "\nRun {} to create a configuration file.\n",
                "dashcache init".cyan()
            );
            return Ok(());
        }
    };

    let config = &ctx.config;
    let state_path = config.state.resolve_path()?;
    let cache_dir = config.proxy.resolve_cache_dir()?;

    let proxy = ctx.proxy();
    let worker_state = proxy.as_ref().map(|p| p.state()).ok();
    let generations = ctx
        .cache_storage()
        .and_then(|storage| storage.generations().map_err(Into::into))
        .unwrap_or_default();

    let state_sync = ctx.state_sync();
    let slot_count = state_sync.keys().map(|keys| keys.len()).ok();

    if ctx.format == OutputFormat::Json {
        let json = serde_json::json!({
            "config_path": config_path.display().to_string(),
            "config_file_exists": config_path.exists(),
            "state": {
                "path": state_path.display().to_string(),
                "prefix": config.state.prefix,
                "slots": slot_count,
            },
            "proxy": {
                "version": config.proxy.version,
                "origin": config.proxy.origin,
                "cache_dir": cache_dir.display().to_string(),
                "worker_state": worker_state,
                "generations": generations,
                "navigation_policy": config.proxy.navigation_policy,
                "asset_policy": config.proxy.asset_policy,
            },
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("{}\n", "dashcache Status".bold());

    if config_path.exists() {
        println!("Config file: {}", config_path.display().to_string().cyan());
    } else {
        println!(
            "Config file: {} {}",
            config_path.display().to_string().cyan(),
            "(not found, using defaults)".dimmed()
        );
    }
    println!();

    println!("{}", "Durable state".bold());
    println!("  Store:   {}", state_path.display());
    println!("  Prefix:  {}", config.state.prefix);
    match slot_count {
        Some(n) => println!("  {} {} slot(s) stored", "✓".green(), n),
        None => println!("  {} Store unavailable (memory only)", "⚠".yellow()),
    }
    println!();

    println!("{}", "Asset cache".bold());
    println!("  Version: {}", config.proxy.version.bold());
    println!("  Origin:  {}", config.proxy.origin);
    println!("  Cache:   {}", cache_dir.display());
    println!(
        "  Policies: navigation {}, assets {}",
        config.proxy.navigation_policy, config.proxy.asset_policy
    );

    match worker_state {
        Some(WorkerState::Activated) => {
            println!("  {} Generation {} active", "✓".green(), config.proxy.version)
        }
        Some(WorkerState::Waiting) => println!(
            "  {} Generation {} installed, waiting to activate",
            "⚠".yellow(),
            config.proxy.version
        ),
        Some(_) => {
            println!("  {} Current generation not installed", "○".dimmed());
            println!("  → Run 'dashcache install' to pre-cache the manifest");
        }
        None => println!("  {} Cache storage unavailable", "✗".red()),
    }

    let stale: Vec<&String> = generations
        .iter()
        .filter(|g| **g != config.proxy.version)
        .collect();
    if !stale.is_empty() {
        let names: Vec<&str> = stale.iter().map(|g| g.as_str()).collect();
        println!("  Older generations: {}", names.join(", ").dimmed());
    }
    println!();

    Ok(())
}
