use clap::Args;
use serde_json::json;

use crate::auth::issue_token;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::server::signing_key;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(help = "Subject identity to embed in the token")]
    pub subject: String,

    #[arg(long, help = "Lifetime in hours (defaults to JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub async fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config();
    let key = signing_key(config)?;
    let hours = args.hours.unwrap_or(config.security.jwt_expiry_hours);

    let ttl = i64::try_from(hours)
        .ok()
        .and_then(chrono::Duration::try_hours)
        .ok_or_else(|| anyhow::anyhow!("--hours {} is out of range", hours))?;

    let token = issue_token(&key, &args.subject, ttl)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            &format!("Token issued for '{}'", args.subject),
            Some(json!({ "token": token, "expires_in_hours": hours })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
