pub mod commands;
pub mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::{config, DatabaseConfig};
use crate::database::DatabaseManager;
use crate::directory::DirectoryStore;

#[derive(Parser)]
#[command(name = "edufocus")]
#[command(about = "EduFocus admin CLI - school registry, affiliates and store migrations")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Directory holding system.db and the school stores")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the directory database and bring its schema up to date")]
    Init,

    #[command(about = "Open every registered school store, creating or migrating it")]
    Migrate,

    #[command(about = "School registry")]
    School {
        #[command(subcommand)]
        cmd: commands::school::SchoolCommands,
    },

    #[command(about = "Platform super admins")]
    Admin {
        #[command(subcommand)]
        cmd: commands::admin::AdminCommands,
    },

    #[command(about = "Affiliate tokens and links between schools")]
    Affiliate {
        #[command(subcommand)]
        cmd: commands::affiliate::AffiliateCommands,
    },

    #[command(about = "Development access tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
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

/// Connect to the directory, honouring `--data-dir` over the environment config
pub async fn open(data_dir: Option<PathBuf>) -> anyhow::Result<(DatabaseManager, DirectoryStore)> {
    let mut database = config().database.clone();
    if let Some(dir) = data_dir {
        database = DatabaseConfig {
            data_dir: dir,
            ..database
        };
    }
    let databases = DatabaseManager::connect(database).await?;
    let directory = DirectoryStore::new(databases.directory_pool().clone());
    Ok((databases, directory))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let (databases, directory) = open(cli.data_dir).await?;

    let result = match cli.command {
        Commands::Init => commands::init::init(&databases, output_format).await,
        Commands::Migrate => commands::init::migrate(&databases, &directory, output_format).await,
        Commands::School { cmd } => commands::school::handle(cmd, &directory, output_format).await,
        Commands::Admin { cmd } => commands::admin::handle(cmd, &directory, output_format).await,
        Commands::Affiliate { cmd } => commands::affiliate::handle(cmd, &directory, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, &directory, output_format).await,
    };

    databases.close().await;
    result
}
