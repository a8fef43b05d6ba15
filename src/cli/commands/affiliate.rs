use clap::Subcommand;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::models::Relationship;
use crate::directory::DirectoryStore;
use crate::types::TenantId;

#[derive(Subcommand)]
pub enum AffiliateCommands {
    #[command(about = "Generate a one-time affiliate token for a parent school")]
    Generate {
        #[arg(help = "Parent school id")]
        school: TenantId,
    },

    #[command(about = "Claim a token on behalf of an affiliate school")]
    Claim {
        #[arg(help = "Affiliate token")]
        token: String,

        #[arg(long, help = "Claiming school id")]
        school: TenantId,
    },

    #[command(about = "List a school's links in both directions")]
    List {
        #[arg(help = "School id")]
        school: TenantId,
    },

    #[command(about = "Remove a link; either party may revoke")]
    Revoke {
        #[arg(help = "Link id")]
        link: i64,

        #[arg(long, help = "School id requesting the removal")]
        school: TenantId,
    },
}

pub async fn handle(cmd: AffiliateCommands, directory: &DirectoryStore, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AffiliateCommands::Generate { school } => {
            let link = directory.create_affiliate_token(school).await?;
            output_record(&output_format, &link, &[format!("✓ Token {} issued for school {}", link.token, school)])
        }
        AffiliateCommands::Claim { token, school } => {
            let link = directory.claim_token(&token, school).await?;
            output_record(
                &output_format,
                &link,
                &[format!(
                    "✓ School {} is now affiliated with school {} (link {})",
                    school, link.parent_tenant_id, link.id
                )],
            )
        }
        AffiliateCommands::List { school } => {
            let links = directory.list_links(school).await?;
            if links.is_empty() {
                return output_empty_collection(&output_format, "links", "No affiliate links");
            }

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&links)?),
                OutputFormat::Text => {
                    println!("{:<6} {:<6} {:<30} {}", "LINK", "SCHOOL", "NAME", "RELATIONSHIP");
                    println!("{}", "-".repeat(60));
                    for entry in links.as_parent.iter().chain(&links.as_affiliate) {
                        println!(
                            "{:<6} {:<6} {:<30} {}",
                            entry.link_id,
                            entry.school_id,
                            truncate(&entry.name, 30),
                            match entry.relationship {
                                Relationship::Affiliate => "affiliate of this school",
                                Relationship::Parent => "parent of this school",
                            }
                        );
                    }
                }
            }
            Ok(())
        }
        AffiliateCommands::Revoke { link, school } => {
            let link = directory.revoke_link(link, school).await?;
            output_record(&output_format, &link, &[format!("✓ Link {} is {}", link.id, link.status)])
        }
    }
}
