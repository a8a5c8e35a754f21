//! Cache management commands

use colored::Colorize;

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::error::Result;
use crate::models::display::{format_local, format_size};
use crate::models::{EntryDisplay, GenerationDisplay};
use crate::output::Formattable;
use crate::proxy::CacheStorage;

/// Show cache status/statistics
pub fn status(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let storage = ctx.cache_storage()?;
    let stats = storage.stats()?;
    let generations = storage.generations()?;
    let active = storage.active_generation()?;
    let current = &ctx.config.proxy.version;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "current_generation": current,
                "current_installed": generations.contains(current),
                "active_generation": active,
                "generations": stats.generations,
                "total_entries": stats.total_entries,
                "total_size_bytes": stats.total_size_bytes,
                "total_size_human": format_size(stats.total_size_bytes),
                "oldest_entry": stats.oldest_entry,
                "newest_entry": stats.newest_entry,
                "path": storage.path().display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", storage.path().display());
            println!(
                "Current:        {} {}",
                current,
                if generations.contains(current) {
                    "(installed)".green()
                } else {
                    "(not installed)".yellow()
                }
            );
            println!(
                "Active:         {}",
                active.as_deref().unwrap_or("none")
            );
            println!("Generations:    {}", stats.generations);
            println!("Entries:        {}", stats.total_entries);
            println!("Total size:     {}", format_size(stats.total_size_bytes));

            if let Some(oldest) = stats.oldest_entry {
                println!("Oldest entry:   {}", format_local(oldest));
            }
            if let Some(newest) = stats.newest_entry {
                println!("Newest entry:   {}", format_local(newest));
            }
        }
    }

    Ok(())
}

/// Delete every cache generation
pub fn clear(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let stats = ctx.cache_storage()?.clear_all()?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "generations_removed": stats.generations_removed,
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if stats.generations_removed > 0 {
                println!(
                    "Cleared {} generation(s), {} cache entries",
                    stats.generations_removed, stats.entries_removed
                );
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// List cache generations
pub fn generations(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let storage = ctx.cache_storage()?;
    let current = &ctx.config.proxy.version;

    let mut rows = Vec::new();
    for name in storage.generations()? {
        let entries = storage.entries(&name)?;
        let is_current = name == *current;
        rows.push(GenerationDisplay::new(name, &entries, is_current));
    }

    rows.print(ctx.format)
}

/// List cached entries, optionally for one generation
pub fn entries(opts: &GlobalOptions, generation: Option<&str>) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let storage = ctx.cache_storage()?;

    let names = match generation {
        Some(g) => vec![g.to_string()],
        None => storage.generations()?,
    };

    let mut rows = Vec::new();
    for name in names {
        for entry in storage.entries(&name)? {
            rows.push(EntryDisplay::new(&name, entry));
        }
    }

    rows.print(ctx.format)
}

/// Show cache database path
pub fn path(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    println!("{}", ctx.cache_storage()?.path().display());
    Ok(())
}
