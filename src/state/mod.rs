//! Durable client state
//!
//! Keeps named, JSON-serializable values in step with a per-origin durable
//! key-value store. Storage problems never surface to slot callers: loads fall
//! back to the caller's default and writes report a `PersistOutcome`.

pub mod slot;
pub mod sqlite;
pub mod store;

pub use slot::{LoadOrigin, PersistOutcome, PersistentSlot, StateSync};
pub use sqlite::SqliteStore;
pub use store::{DurableStore, NoopStore};
