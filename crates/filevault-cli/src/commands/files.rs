//! File listing CLI command.

use crate::output::{self, FileRow, OutputFormat};
use filevault_core::error::AppError;
use filevault_service::RequestContext;

use super::Vault;

/// Execute the files command
pub async fn execute(
    vault: &Vault,
    ctx: &RequestContext,
    format: OutputFormat,
) -> Result<(), AppError> {
    let files = vault.files.list_files(ctx).await?;
    let rows: Vec<FileRow> = files.iter().map(FileRow::from).collect();
    output::print_list(&rows, format);
    Ok(())
}
