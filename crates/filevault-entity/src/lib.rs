//! # filevault-entity
//!
//! Domain entity models for FileVault. Every struct in this crate
//! represents a ledger table row or a value assembled from rows. All
//! entities derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and table
//! rows additionally derive `sqlx::FromRow`.

pub mod file;
