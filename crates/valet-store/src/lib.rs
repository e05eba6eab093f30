//! # valet-store
//!
//! Storage engine for Valet.
//!
//! Provides SQLite-backed persistence (WAL mode, async access via the
//! blocking thread pool) for the two append-only ledgers the workflow
//! engine relies on:
//!
//! - **Chat turns** — one row per exchange, ordered per session.
//! - **Automation records** — one row per automation attempt, successful
//!   or not, ordered per session.
//!
//! Both ledgers are read back in insertion order and cleared per session
//! on demand.  Schema changes go through versioned migrations
//! ([`migration`]).

pub mod db;
pub mod error;
pub mod history;
pub mod migration;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use history::{AutomationRecord, ChatTurn, HistoryStore};
