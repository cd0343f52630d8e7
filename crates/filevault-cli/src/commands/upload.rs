//! File upload CLI command.

use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;

use crate::output::{self, OutputFormat, VersionRow};
use filevault_core::error::{AppError, ErrorKind};
use filevault_service::RequestContext;

use super::Vault;

/// Arguments for the upload command
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Path to the file to upload
    pub file: PathBuf,

    /// Store under this name instead of the local file name
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Execute the upload command
pub async fn execute(
    args: &UploadArgs,
    vault: &Vault,
    ctx: &RequestContext,
    format: OutputFormat,
) -> Result<(), AppError> {
    let file_name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::validation(format!(
                    "Cannot derive a file name from {}",
                    args.file.display()
                ))
            })?,
    };

    let content = tokio::fs::read(&args.file).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Validation,
            format!("Failed to read {}", args.file.display()),
            e,
        )
    })?;

    let version = vault
        .uploads
        .upload(ctx, &file_name, Bytes::from(content))
        .await?;

    output::print_success(&format!(
        "Stored '{file_name}' as version {}",
        version.version_number
    ));
    output::print_list(&[VersionRow::from(&version)], format);
    Ok(())
}
