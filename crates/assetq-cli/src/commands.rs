//! Subcommands.

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Download labels and show progress until every download finishes
    Download {
        /// Labels to download
        #[arg(required = true)]
        labels: Vec<String>,
        /// Priority; higher runs first
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        priority: i32,
    },

    /// Show how many bytes a label still needs
    Size {
        /// Label to check
        label: String,
    },

    /// Load keys through the asset cache, downloading missing content first
    Load {
        /// Keys to load, in order
        #[arg(required = true)]
        keys: Vec<String>,
        /// Treat each key as a label and load its whole group
        #[arg(long)]
        label: bool,
        /// Instantiate this many objects from the first key
        #[arg(long, default_value_t = 0)]
        instances: usize,
    },

    /// Remote catalog maintenance
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

/// Catalog subcommands.
#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogCommand {
    /// List catalogs with pending updates
    Check,
    /// Check and apply pending updates
    Update,
    /// Clear locally cached remote content
    Clear,
}
