use clap::Args;

use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long, help = "Listen port (defaults to TRACE_API_PORT / PORT / 8080)")]
    pub port: Option<u16>,
}

pub async fn handle(args: ServeArgs, _output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    tracing::info!("Starting Traceability API in {:?} mode", config.environment);
    crate::server::serve(config, args.port).await
}
