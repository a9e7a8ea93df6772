//! CLI entry point - the composition root.
//!
//! Command dispatch routes to handlers; all dependencies come from the
//! bootstrapped `CliContext`.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use assetq_cli::{Cli, CliConfig, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads `env` defaults
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig::from_cli(&cli)?;
    let ctx = bootstrap(config)?;

    match command {
        Commands::Download { labels, priority } => {
            handlers::download::execute(&ctx, handlers::download::DownloadArgs { labels, priority })
                .await?;
        }
        Commands::Size { label } => {
            handlers::size::execute(&ctx, &label).await?;
        }
        Commands::Load {
            keys,
            label,
            instances,
        } => {
            let args = handlers::load::LoadArgs {
                keys,
                label,
                instances,
            };
            handlers::load::execute(&ctx, args).await?;
        }
        Commands::Catalog { command } => {
            handlers::catalog::execute(&ctx, command).await?;
        }
    }

    Ok(())
}
