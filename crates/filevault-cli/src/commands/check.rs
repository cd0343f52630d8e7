//! Health check CLI command.

use crate::output;
use filevault_core::config::AppConfig;
use filevault_core::error::AppError;

/// Execute the check command
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let (ledger, blobs) = super::open_backends(config).await?;

    let ledger_ok = ledger.health_check().await?;
    let blobs_ok = blobs.health_check().await?;
    let status = |ok: bool| if ok { "ok" } else { "unavailable" };

    println!("FileVault health:");
    output::print_kv(&format!("Ledger ({})", ledger.backend()), status(ledger_ok));
    output::print_kv(
        &format!("Blob store ({})", blobs.provider_type()),
        status(blobs_ok),
    );

    if ledger_ok && blobs_ok {
        output::print_success("All backends healthy.");
        Ok(())
    } else {
        Err(AppError::storage_unavailable("One or more backends are unhealthy"))
    }
}
