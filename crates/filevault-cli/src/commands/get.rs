//! Version download CLI command.

use std::path::PathBuf;

use clap::Args;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

use filevault_core::error::AppError;
use filevault_service::RequestContext;

use super::Vault;

/// Arguments for the get command
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Stored file name
    pub name: String,

    /// Version id; the current version when absent or unknown
    #[arg(short, long)]
    pub version: Option<String>,

    /// Write to this path instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the get command
pub async fn execute(args: &GetArgs, vault: &Vault, ctx: &RequestContext) -> Result<(), AppError> {
    let content = vault
        .downloads
        .open(ctx, &args.name, args.version.as_deref())
        .await?;
    let mut reader = StreamReader::new(content.stream);

    let written = match &args.output {
        Some(path) => {
            let mut file = tokio::fs::File::create(path).await?;
            let n = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            eprintln!(
                "Wrote version {} of '{}' to {} ({n} bytes)",
                content.version.version_number,
                content.file_name,
                path.display()
            );
            n
        }
        None => {
            let mut stdout = tokio::io::stdout();
            let n = tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
            n
        }
    };

    tracing::debug!(bytes = written, version_id = %content.version.id, "Version written");
    Ok(())
}
