//! Main CLI parser and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Default simulated bandwidth: 4 MiB/s.
pub const DEFAULT_BANDWIDTH: u64 = 4 * 1024 * 1024;

/// Schedule content downloads and cache loads against a simulated backend.
///
/// Global options override values from the settings file.
#[derive(Parser)]
#[command(name = "assetq")]
#[command(about = "Prioritized content downloads with a reference-counted asset cache")]
#[command(version)]
pub struct Cli {
    /// JSON settings file
    #[arg(long, env = "ASSETQ_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Maximum downloads running at once
    #[arg(long, env = "ASSETQ_MAX_CONCURRENT", global = true)]
    pub max_concurrent: Option<u32>,

    /// Retries per label after the first attempt
    #[arg(long, env = "ASSETQ_MAX_RETRIES", global = true)]
    pub max_retries: Option<u32>,

    /// Disable automatic retries
    #[arg(long, global = true)]
    pub no_retry: bool,

    /// Progress poll interval in milliseconds
    #[arg(long, env = "ASSETQ_POLL_MS", global = true)]
    pub poll_ms: Option<u64>,

    /// Simulated bandwidth in bytes per second
    #[arg(
        long,
        env = "ASSETQ_BANDWIDTH",
        default_value_t = DEFAULT_BANDWIDTH,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub bandwidth: u64,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
