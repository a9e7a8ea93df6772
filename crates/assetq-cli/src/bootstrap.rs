//! CLI bootstrap - the composition root.
//!
//! The only place where the backend, download service, cache, and catalog
//! manager are wired together. Handlers receive the composed [`CliContext`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use assetq_cache::AssetCache;
use assetq_core::{AssetBackendPort, DownloadSettings, validate_settings};
use assetq_download::{CatalogManager, DownloadService, DownloadServiceDeps, build_download_service};

use crate::parser::Cli;
use crate::simulated::SimulatedBackend;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub settings: DownloadSettings,
    /// Simulated bandwidth in bytes per second.
    pub bandwidth: u64,
}

impl CliConfig {
    /// Resolve settings: file (if given), then flag and environment overrides.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut settings = match &cli.settings {
            Some(path) => DownloadSettings::from_json_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => DownloadSettings::default(),
        };

        if let Some(max) = cli.max_concurrent {
            settings = settings.with_max_concurrent(max);
        }
        if let Some(count) = cli.max_retries {
            settings = settings.with_max_retry_count(count);
        }
        if cli.no_retry {
            settings = settings.with_auto_retry(false);
        }
        if let Some(ms) = cli.poll_ms {
            settings = settings.with_poll_interval(Duration::from_millis(ms));
        }

        validate_settings(&settings).context("Invalid download settings")?;

        Ok(Self {
            settings,
            bandwidth: cli.bandwidth,
        })
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub backend: Arc<SimulatedBackend>,
    pub downloads: DownloadService,
    /// Cache whose misses download through `downloads`.
    pub cache: AssetCache,
    pub catalogs: CatalogManager,
}

/// Wire everything for one CLI invocation.
pub fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let backend = Arc::new(SimulatedBackend::new(config.bandwidth));
    let port: Arc<dyn AssetBackendPort> = backend.clone();

    let downloads = build_download_service(DownloadServiceDeps::new(
        Arc::clone(&port),
        config.settings,
    ))
    .context("Failed to build download service")?;

    let cache = AssetCache::new(Arc::clone(&port)).with_downloader(Arc::new(downloads.clone()));
    let catalogs = CatalogManager::new(port);

    tracing::debug!(bandwidth = config.bandwidth, "CLI context ready");

    Ok(CliContext {
        backend,
        downloads,
        cache,
        catalogs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "assetq",
            "--max-concurrent",
            "5",
            "--max-retries",
            "1",
            "--poll-ms",
            "20",
            "size",
            "ui",
        ]);
        let config = CliConfig::from_cli(&cli).unwrap();

        assert_eq!(config.settings.max_concurrent_downloads, 5);
        assert_eq!(config.settings.max_retry_count, 1);
        assert_eq!(config.settings.progress_poll_interval_ms, 20);
        assert!(config.settings.auto_retry_on_fail);
    }

    #[test]
    fn test_flags_override_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_concurrent_downloads": 7, "auto_retry_on_fail": true}}"#).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::parse_from(["assetq", "--settings", &path, "--no-retry", "size", "ui"]);
        let config = CliConfig::from_cli(&cli).unwrap();

        assert_eq!(config.settings.max_concurrent_downloads, 7);
        assert!(!config.settings.auto_retry_on_fail);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let cli = Cli::parse_from(["assetq", "--max-concurrent", "0", "size", "ui"]);
        assert!(CliConfig::from_cli(&cli).is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_wires_cache_to_downloads() {
        let cli = Cli::parse_from(["assetq", "--bandwidth", "100000000", "--poll-ms", "1", "size", "ui"]);
        let ctx = bootstrap(CliConfig::from_cli(&cli).unwrap()).unwrap();

        ctx.cache.load("level-1").await.unwrap();

        assert_eq!(ctx.backend.live_handles(), 1);
        assert_eq!(ctx.backend.download_size("level-1").await.unwrap(), 0);
    }
}
