use clap::Subcommand;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::directory::DirectoryStore;

#[derive(Subcommand)]
pub enum AdminCommands {
    #[command(about = "Register a platform super admin")]
    Create {
        #[arg(help = "Display name")]
        name: String,

        #[arg(long, help = "Login email, unique across all accounts")]
        email: String,
    },
}

pub async fn handle(cmd: AdminCommands, directory: &DirectoryStore, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AdminCommands::Create { name, email } => {
            let admin = directory.register_super_admin(&name, &email).await?;
            output_record(
                &output_format,
                &admin,
                &[format!("✓ Registered super admin {} <{}>", admin.id, admin.email)],
            )
        }
    }
}
