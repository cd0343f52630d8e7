//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use filevault_entity::file::{FileVersion, FileWithVersions};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One version, as shown by `upload` and `versions`.
#[derive(Debug, Serialize, Tabled)]
pub struct VersionRow {
    /// Version number
    pub version: i32,
    /// Version id
    pub id: String,
    /// Current flag
    pub current: bool,
    /// Content digest
    pub digest: String,
    /// Blob location
    pub location: String,
    /// Creation time
    pub created_at: String,
}

impl From<&FileVersion> for VersionRow {
    fn from(v: &FileVersion) -> Self {
        Self {
            version: v.version_number,
            id: v.id.to_string(),
            current: v.is_current,
            digest: v.content_digest.clone(),
            location: v.storage_location.clone(),
            created_at: v.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// One file, as shown by `files`.
#[derive(Debug, Serialize, Tabled)]
pub struct FileRow {
    /// File name
    pub name: String,
    /// File id
    pub id: String,
    /// Number of versions
    pub versions: usize,
    /// Current version number
    pub current: String,
    /// Creation time
    pub created_at: String,
}

impl From<&FileWithVersions> for FileRow {
    fn from(f: &FileWithVersions) -> Self {
        let current = f
            .current_versions()
            .first()
            .map(|v| v.version_number.to_string())
            .unwrap_or_else(|| "-".to_string());
        Self {
            name: f.file.file_name.clone(),
            id: f.file.id.to_string(),
            versions: f.versions.len(),
            current,
            created_at: f.file.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}
