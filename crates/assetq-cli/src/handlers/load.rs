//! Load handler.
//!
//! Loads keys through the asset cache (downloading missing content first),
//! optionally instantiates objects, reports reference counts, then tears the
//! cache down.

use anyhow::Result;

use assetq_core::InstanceHandle;

use crate::bootstrap::CliContext;

/// Load command arguments passed from CLI.
pub struct LoadArgs {
    pub keys: Vec<String>,
    /// Load each key as a label group.
    pub label: bool,
    /// Objects to instantiate from the first key.
    pub instances: usize,
}

/// Execute the load command.
pub async fn execute(ctx: &CliContext, args: LoadArgs) -> Result<()> {
    let result = run(ctx, &args).await;

    ctx.cache.release_all().await;
    println!(
        "Released everything ({} handles, {} instances still live in backend)",
        ctx.backend.live_handles(),
        ctx.backend.live_instances()
    );
    result
}

async fn run(ctx: &CliContext, args: &LoadArgs) -> Result<()> {
    if args.label {
        for label in &args.keys {
            let handles = ctx.cache.load_by_label(label).await?;
            println!(
                "label {label}: {} resources (refs: {})",
                handles.len(),
                ctx.cache.label_ref_count(label).await
            );
        }
    } else {
        let handles = ctx.cache.load_many(&args.keys).await?;
        for handle in &handles {
            println!(
                "{} -> handle {} (refs: {})",
                handle.key,
                handle.id,
                ctx.cache.ref_count(&handle.key).await
            );
        }
    }

    if let Some(first) = args.keys.first().filter(|_| args.instances > 0) {
        let mut parent: Option<InstanceHandle> = None;
        for _ in 0..args.instances {
            let instance = ctx.cache.instantiate(first, parent.clone()).await?;
            println!("instance {}", instance.cache_id());
            parent.get_or_insert(instance);
        }
        println!("{} instances tracked", ctx.cache.instance_count().await);
    }

    Ok(())
}
