use clap::Subcommand;

use crate::auth::issue_token;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::directory::{DirectoryError, DirectoryStore, Missing};

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Mint a bearer token for an existing account (development only)")]
    Issue {
        #[arg(long, help = "Account email")]
        email: String,
    },
}

pub async fn handle(cmd: TokenCommands, directory: &DirectoryStore, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { email } => {
            let principal = directory
                .find_principal_by_email(&email)
                .await?
                .ok_or_else(|| DirectoryError::NotFound(Missing::Principal(email.clone())))?;

            let token = issue_token(&principal, &config().security)?;
            match output_format {
                OutputFormat::Json => output_success(
                    &output_format,
                    &format!("Token issued for {} ({})", principal.email, principal.role),
                    Some(serde_json::json!({ "token": token, "principal": principal })),
                ),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
