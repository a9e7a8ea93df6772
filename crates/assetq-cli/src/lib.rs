//! Command-line front end for assetq.
//!
//! Wires a simulated asset backend to the download service, the asset cache,
//! and the catalog manager. Useful for demos and for watching the scheduler
//! work without a real content server.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod simulated;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{CatalogCommand, Commands};
pub use parser::Cli;
pub use simulated::SimulatedBackend;
