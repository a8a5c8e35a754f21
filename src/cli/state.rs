//! Durable state slot commands

use colored::Colorize;
use serde_json::Value;

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::error::{Error, Result};
use crate::models::SlotDisplay;
use crate::output::Formattable;
use crate::state::{LoadOrigin, PersistOutcome};

fn parse_json(label: &str, text: &str) -> Result<Value> {
    serde_json::from_str(text)
        .map_err(|e| Error::Other(format!("{} is not valid JSON: {}", label, e)))
}

/// Read a slot the way the application would on startup
pub fn get(opts: &GlobalOptions, key: &str, default: &str) -> Result<()> {
    let default = parse_json("--default", default)?;
    let ctx = CommandContext::new(opts)?;
    let sync = ctx.state_sync();

    let slot = sync.bind::<Value>(key, default);

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "key": slot.key(),
                "value": slot.get(),
                "origin": slot.origin(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(slot.get())?);
            match slot.origin() {
                LoadOrigin::Durable => {}
                LoadOrigin::Default => {
                    eprintln!("{}", "(default: no stored value)".dimmed())
                }
                LoadOrigin::Recovered => eprintln!(
                    "{} stored value for '{}' was unreadable, using default",
                    "⚠".yellow(),
                    slot.key()
                ),
            }
        }
    }

    Ok(())
}

/// Write a slot through to durable storage
pub fn set(opts: &GlobalOptions, key: &str, value: &str) -> Result<()> {
    let value = parse_json("value", value)?;
    let ctx = CommandContext::new(opts)?;
    let sync = ctx.state_sync();

    let mut slot = sync.bind(key, Value::Null);
    match slot.set(value) {
        PersistOutcome::Persisted => {
            if ctx.format == OutputFormat::Json {
                let json = serde_json::json!({
                    "key": slot.key(),
                    "value": slot.get(),
                    "persisted": true,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("{} Saved {}", "✓".green(), slot.key().bold());
            }
            Ok(())
        }
        PersistOutcome::Failed(e) => Err(e.into()),
    }
}

/// List stored slots with their raw values
pub fn list(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let sync = ctx.state_sync();

    let mut rows = Vec::new();
    for key in sync.keys()? {
        if let Some(raw) = sync.raw(&key)? {
            rows.push(SlotDisplay::new(key, &raw));
        }
    }

    rows.print(ctx.format)
}

/// Remove a slot's durable entry
pub fn remove(opts: &GlobalOptions, key: &str) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let sync = ctx.state_sync();
    let removed = sync.remove(key)?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "key": sync.storage_key(key),
                "removed": removed,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if removed {
                println!("{} Removed {}", "✓".green(), sync.storage_key(key).bold());
            } else {
                println!("No stored value for {}", sync.storage_key(key));
            }
        }
    }

    Ok(())
}
