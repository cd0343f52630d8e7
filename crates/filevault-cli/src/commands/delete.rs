//! File deletion CLI command.

use clap::Args;

use crate::output;
use filevault_core::error::AppError;
use filevault_service::RequestContext;

use super::Vault;

/// Arguments for the delete command
#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Stored file name
    pub name: String,

    /// Skip confirmation prompt
    #[arg(long)]
    pub force: bool,
}

/// Execute the delete command
pub async fn execute(
    args: &DeleteArgs,
    vault: &Vault,
    ctx: &RequestContext,
) -> Result<(), AppError> {
    if !args.force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Delete '{}' and every stored version of it?",
                args.name
            ))
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    vault.files.delete_file(ctx, &args.name).await?;
    output::print_success(&format!("Deleted '{}'.", args.name));
    Ok(())
}
