//! Version listing CLI command.

use clap::Args;

use crate::output::{self, OutputFormat, VersionRow};
use filevault_core::error::AppError;
use filevault_service::RequestContext;

use super::Vault;

/// Arguments for the versions command
#[derive(Debug, Args)]
pub struct VersionsArgs {
    /// Stored file name
    pub name: String,
}

/// Execute the versions command
pub async fn execute(
    args: &VersionsArgs,
    vault: &Vault,
    ctx: &RequestContext,
    format: OutputFormat,
) -> Result<(), AppError> {
    let versions = vault.files.list_versions(ctx, &args.name).await?;
    let rows: Vec<VersionRow> = versions.iter().map(VersionRow::from).collect();
    output::print_list(&rows, format);
    Ok(())
}
