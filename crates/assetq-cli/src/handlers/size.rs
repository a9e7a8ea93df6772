//! Size handler.

use anyhow::Result;
use indicatif::HumanBytes;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::CliContext;

/// Print how many bytes `label` still needs.
pub async fn execute(ctx: &CliContext, label: &str) -> Result<()> {
    let size = ctx
        .downloads
        .check_download_size_async(label, &CancellationToken::new())
        .await?;

    if size == 0 {
        println!("{label}: already local");
    } else {
        println!("{label}: {} to download", HumanBytes(size));
    }
    Ok(())
}
