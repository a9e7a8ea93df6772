//! Catalog handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::commands::CatalogCommand;

pub async fn execute(ctx: &CliContext, command: CatalogCommand) -> Result<()> {
    match command {
        CatalogCommand::Check => {
            let pending = ctx.catalogs.check_for_updates().await?;
            if pending.is_empty() {
                println!("All catalogs are up to date");
            } else {
                println!("Updates available for: {}", pending.join(", "));
            }
        }
        CatalogCommand::Update => {
            let update = ctx.catalogs.check_and_apply().await?;
            match (update.catalogs.is_empty(), update.applied) {
                (true, _) => println!("All catalogs are up to date"),
                (false, true) => println!("Updated: {}", update.catalogs.join(", ")),
                (false, false) => {
                    anyhow::bail!("Backend rejected updates for: {}", update.catalogs.join(", "))
                }
            }
        }
        CatalogCommand::Clear => {
            ctx.catalogs.clear_cache_storage().await?;
            println!("Cleared cached content");
        }
    }
    Ok(())
}
