//! Handlers run end to end against the simulated backend.

use clap::Parser;
use tokio_test::{assert_err, assert_ok};

use assetq_cli::handlers::{download, load};
use assetq_cli::{Cli, CliConfig, CliContext, bootstrap};
use assetq_core::AssetBackendPort;

fn context(extra: &[&str]) -> CliContext {
    let mut argv = vec!["assetq", "--bandwidth", "1000000000", "--poll-ms", "1"];
    argv.extend_from_slice(extra);
    argv.extend_from_slice(&["size", "unused"]);
    let cli = Cli::parse_from(argv);
    bootstrap(CliConfig::from_cli(&cli).unwrap()).unwrap()
}

#[tokio::test]
async fn test_download_retries_flaky_labels() {
    let ctx = context(&[]);
    let args = download::DownloadArgs {
        labels: vec!["level-1".into(), "flaky/level-2".into(), "local/ui".into()],
        priority: 0,
    };

    assert_ok!(download::execute(&ctx, args).await);
    assert_eq!(ctx.backend.download_size("level-1").await.unwrap(), 0);
    assert_eq!(ctx.backend.download_size("flaky/level-2").await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_download_waits_for_every_label() {
    // A local first label can finish its run before the next one is queued.
    for i in 0..25 {
        let ctx = context(&[]);
        let label = format!("level-{i}");
        let args = download::DownloadArgs {
            labels: vec!["local/ui".into(), label.clone()],
            priority: 0,
        };

        assert_ok!(download::execute(&ctx, args).await);
        assert_eq!(
            ctx.backend.download_size(&label).await.unwrap(),
            0,
            "{label} was never downloaded"
        );
    }
}

#[tokio::test]
async fn test_download_reports_failures() {
    let ctx = context(&["--max-retries", "1"]);
    let args = download::DownloadArgs {
        labels: vec!["broken/level-3".into()],
        priority: 0,
    };

    let err = assert_err!(download::execute(&ctx, args).await);
    assert!(err.to_string().contains("1 download(s) failed"));
}

#[tokio::test]
async fn test_load_releases_everything() {
    let ctx = context(&[]);
    let args = load::LoadArgs {
        keys: vec!["tex".into(), "mesh".into()],
        label: false,
        instances: 2,
    };

    assert_ok!(load::execute(&ctx, args).await);
    assert_eq!(ctx.backend.live_handles(), 0);
    assert_eq!(ctx.backend.live_instances(), 0);
    assert!(ctx.cache.is_empty().await);
}

#[tokio::test]
async fn test_load_failure_still_tears_down() {
    let ctx = context(&[]);
    let args = load::LoadArgs {
        keys: vec!["tex".into(), "missing/mesh".into()],
        label: false,
        instances: 0,
    };

    assert_err!(load::execute(&ctx, args).await);
    assert_eq!(ctx.backend.live_handles(), 0);
}
