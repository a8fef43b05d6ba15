use clap::Subcommand;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::directory::{DirectoryStore, NewSchool};

#[derive(Subcommand)]
pub enum SchoolCommands {
    #[command(about = "Register a new school")]
    Register {
        #[arg(help = "School name")]
        name: String,

        #[arg(long, help = "Contact email, unique across all accounts")]
        email: String,

        #[arg(long)]
        address: Option<String>,

        #[arg(long, help = "Name of the school administrator")]
        admin_name: Option<String>,
    },

    #[command(about = "List registered schools")]
    List,
}

pub async fn handle(cmd: SchoolCommands, directory: &DirectoryStore, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SchoolCommands::Register {
            name,
            email,
            address,
            admin_name,
        } => {
            let school = directory
                .register_school(NewSchool {
                    name,
                    email,
                    address,
                    admin_name,
                })
                .await?;
            output_record(
                &output_format,
                &school,
                &[format!("✓ Registered school {} ({}) <{}>", school.id, school.name, school.email)],
            )
        }
        SchoolCommands::List => {
            let schools = directory.list_schools().await?;
            if schools.is_empty() {
                return output_empty_collection(&output_format, "schools", "No schools registered");
            }

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&schools)?),
                OutputFormat::Text => {
                    println!("{:<6} {:<30} {:<30} {}", "ID", "NAME", "EMAIL", "CREATED");
                    println!("{}", "-".repeat(86));
                    for school in &schools {
                        println!(
                            "{:<6} {:<30} {:<30} {}",
                            school.id,
                            truncate(&school.name, 30),
                            truncate(&school.email, 30),
                            school.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            Ok(())
        }
    }
}
