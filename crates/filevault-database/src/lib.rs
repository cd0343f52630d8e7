//! # filevault-database
//!
//! The version ledger: the authoritative record of every file and file
//! version. Provides the [`VersionLedger`] traits, a PostgreSQL backend
//! built on sqlx, and an in-memory backend with the same constraints.

pub mod connection;
pub mod ledger;
pub mod lock;
pub mod migration;

pub use connection::LedgerPool;
pub use ledger::{LedgerTransaction, MemoryLedger, PgLedger, VersionLedger, open_ledger};
pub use lock::{NameGuard, NameLocks};
