use chrono::Utc;
use clap::Args;
use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::{config, grace_from_secs};
use crate::graph::GraphStore;
use crate::store;

#[derive(Args)]
pub struct SweepArgs {
    #[arg(long, help = "Minimum age in seconds of pending components to settle (defaults to SWEEP_GRACE_SECS; must exceed the request timeout plus store timeout)")]
    pub grace_secs: Option<u64>,
}

pub async fn handle(args: SweepArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let grace_secs = args.grace_secs.unwrap_or(config.store.sweep_grace_secs);
    config.check_sweep_grace(grace_secs)?;
    let grace = grace_from_secs(grace_secs);

    let store = store::connect(&config.store).await?;
    let graph = GraphStore::new(store, config.store.cas_retries);

    let report = graph.sweep_pending(grace, Utc::now()).await?;
    if report.failed > 0 {
        output_error(
            &output_format,
            &format!("Sweep finished with failures: {}", report),
            Some("SWEEP_INCOMPLETE"),
        )?;
        anyhow::bail!("{} pending components could not be settled", report.failed);
    }

    output_success(&output_format, &format!("Sweep complete: {}", report), Some(json!({ "report": report })))
}
