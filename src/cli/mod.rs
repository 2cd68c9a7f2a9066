pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "traceability")]
#[command(about = "Traceability API - server and maintenance commands")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API server")]
    Serve(commands::serve::ServeArgs),

    #[command(about = "Reconcile pending components with their views once and report")]
    Sweep(commands::sweep::SweepArgs),

    #[command(about = "Mint a bearer token for a subject (development use)")]
    Token(commands::token::TokenArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve(args) => commands::serve::handle(args, output_format).await,
        Commands::Sweep(args) => commands::sweep::handle(args, output_format).await,
        Commands::Token(args) => commands::token::handle(args, output_format).await,
    }
}
