//! Cache proxy lifecycle and fetch commands

use std::io::Write;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Method;

use crate::cli::args::GlobalOptions;
use crate::cli::{CommandContext, OutputFormat};
use crate::error::{Error, Result};
use crate::models::display::format_size;
use crate::proxy::{ActivateReport, Request, RequestMode, WorkerState};

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Pre-cache the manifest into the current generation
pub async fn install(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let mut proxy = ctx.proxy()?;

    if matches!(proxy.state(), WorkerState::Waiting | WorkerState::Activated) {
        match ctx.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "generation": proxy.version(),
                    "state": proxy.state(),
                    "installed": false,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
            _ => println!(
                "Generation {} is already installed ({})",
                proxy.version().bold(),
                proxy.state()
            ),
        }
        return Ok(());
    }

    let pb = (ctx.format != OutputFormat::Json).then(|| {
        spinner(&format!(
            "Caching {} assets into {}...",
            proxy.manifest().len(),
            proxy.version()
        ))
    });

    let result = proxy.install().await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let report = result?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            println!(
                "{} Installed generation {} ({} assets)",
                "✓".green(),
                report.generation.bold(),
                report.cached.len()
            );
            for url in &report.cached {
                println!("  {}", url.dimmed());
            }
            match &report.activation {
                Some(activation) => print_activation(activation),
                None => println!(
                    "  → Run {} to take over from older generations",
                    "dashcache activate".cyan()
                ),
            }
        }
    }

    Ok(())
}

/// Activate an installed generation
pub fn activate(opts: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let mut proxy = ctx.proxy()?;

    if proxy.state() == WorkerState::Activated {
        println!("Generation {} is already active", proxy.version().bold());
        return Ok(());
    }

    let report = proxy.activate()?;
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_activation(&report),
    }
    Ok(())
}

fn print_activation(report: &ActivateReport) {
    println!(
        "{} Activated generation {}",
        "✓".green(),
        report.generation.bold()
    );
    if report.deleted.is_empty() {
        println!("  No older generations to delete");
    } else {
        println!("  Deleted: {}", report.deleted.join(", "));
    }
}

/// Fetch a URL through the proxy
pub async fn fetch(
    opts: &GlobalOptions,
    url: &str,
    method: &str,
    navigate: bool,
    body: bool,
) -> Result<()> {
    let ctx = CommandContext::new(opts)?;
    let proxy = ctx.proxy()?;

    let url = ctx
        .origin()?
        .join(url)
        .map_err(|e| Error::Other(format!("Invalid URL '{}': {}", url, e)))?;
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::Other(format!("Invalid HTTP method '{}'", method)))?;
    let mode = if navigate {
        RequestMode::Navigate
    } else {
        RequestMode::Subresource
    };

    let mut served = proxy.fetch(&Request::new(method, url, mode)).await?;

    // The process would otherwise exit before the refresh lands
    let revalidated = match served.revalidation.take() {
        Some(handle) => Some(handle.finished().await),
        None => None,
    };

    if body {
        std::io::stdout().write_all(&served.response.body)?;
        return Ok(());
    }

    let response = &served.response;
    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "url": response.url,
                "status": response.status,
                "source": served.source,
                "response_type": response.response_type,
                "size_bytes": response.body.len(),
                "fetched_at": response.fetched_at,
                "revalidated": revalidated,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            let status = if response.is_ok() {
                response.status.to_string().green()
            } else {
                response.status.to_string().red()
            };
            println!("{} {}", status, response.url);
            println!("  Source: {}", served.source.to_string().cyan());
            println!("  Type:   {}", response.response_type.as_str());
            println!("  Size:   {}", format_size(response.body.len()));
            if let Some(refreshed) = revalidated {
                println!(
                    "  Revalidated: {}",
                    if refreshed { "cache updated" } else { "cache kept" }
                );
            }
        }
    }

    Ok(())
}
