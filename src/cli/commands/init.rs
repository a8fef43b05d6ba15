use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::directory::DirectoryStore;
use crate::services::school_service::migrate_all;

/// The directory schema is applied on connect, so init only reports where it lives
pub async fn init(databases: &DatabaseManager, output_format: OutputFormat) -> anyhow::Result<()> {
    databases.health_check().await?;
    let path = databases.data_dir().join("system.db");
    output_success(
        &output_format,
        &format!("Directory database ready at {}", path.display()),
        Some(json!({ "path": path })),
    )
}

pub async fn migrate(
    databases: &DatabaseManager,
    directory: &DirectoryStore,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let report = migrate_all(databases, directory).await?;

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for school in &report.items {
                let outcome = if school.created { "created" } else { "up to date" };
                println!("✓ school {:<6} {:<30} {}", school.school_id, truncate(&school.name, 30), outcome);
            }
            for skipped in &report.skipped {
                println!("✗ school {:<6} {}", skipped.school_id, skipped.reason);
            }
            println!("{} migrated, {} skipped", report.items.len(), report.skipped.len());
        }
    }

    if report.skipped.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("{} school store(s) could not be migrated", report.skipped.len()))
    }
}
