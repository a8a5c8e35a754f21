//! Display model implementations for table and JSON output
//!
//! Display models turn cache and state records into CLI-friendly rows.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::Tabled;

use crate::proxy::CachedEntry;

/// Cache generation row
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct GenerationDisplay {
    #[tabled(rename = "GENERATION")]
    pub name: String,

    #[tabled(rename = "ENTRIES")]
    pub entries: usize,

    #[tabled(rename = "SIZE")]
    #[serde(skip)]
    pub size: String,

    #[tabled(skip)]
    pub size_bytes: usize,

    /// Whether this generation matches the configured version tag
    #[tabled(rename = "CURRENT")]
    #[serde(skip)]
    pub current_mark: String,

    #[tabled(skip)]
    pub current: bool,
}

impl GenerationDisplay {
    pub fn new(name: String, entries: &[CachedEntry], current: bool) -> Self {
        let size_bytes = entries.iter().map(|e| e.size_bytes).sum();
        Self {
            name,
            entries: entries.len(),
            size: format_size(size_bytes),
            size_bytes,
            current_mark: if current {
                "\u{2713}".to_string()
            } else {
                String::new()
            },
            current,
        }
    }
}

/// Cached entry row
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct EntryDisplay {
    #[tabled(rename = "GENERATION")]
    pub generation: String,

    #[tabled(rename = "METHOD")]
    pub method: String,

    #[tabled(rename = "URL")]
    pub url: String,

    #[tabled(rename = "STATUS")]
    pub status: u16,

    #[tabled(rename = "TYPE")]
    pub response_type: String,

    #[tabled(rename = "SIZE")]
    pub size_bytes: usize,

    #[tabled(rename = "FETCHED")]
    pub fetched_at: String,
}

impl EntryDisplay {
    pub fn new(generation: &str, entry: CachedEntry) -> Self {
        Self {
            generation: generation.to_string(),
            method: entry.key.method,
            url: entry.key.url,
            status: entry.status,
            response_type: entry.response_type.as_str().to_string(),
            size_bytes: entry.size_bytes,
            fetched_at: entry.fetched_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

/// Durable state slot row
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct SlotDisplay {
    #[tabled(rename = "KEY")]
    pub key: String,

    #[tabled(rename = "VALUE")]
    #[serde(skip)]
    pub preview: String,

    #[tabled(skip)]
    pub value: serde_json::Value,

    #[tabled(rename = "VALID")]
    #[serde(skip)]
    pub valid_mark: String,

    /// False when the stored text is not JSON
    #[tabled(skip)]
    pub valid: bool,
}

impl SlotDisplay {
    pub fn new(key: String, raw: &str) -> Self {
        let (value, valid) = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) => (v, true),
            Err(_) => (serde_json::Value::String(raw.to_string()), false),
        };
        Self {
            key,
            preview: truncate_string(raw, 60),
            value,
            valid_mark: if valid { "\u{2713}" } else { "\u{2717}" }.to_string(),
            valid,
        }
    }
}

/// Truncate string to max characters with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Local date/time for human-facing output
pub fn format_local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
