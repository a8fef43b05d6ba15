#![allow(dead_code)]

use anyhow::{Context, Result};
use tempfile::TempDir;

use edufocus_api::app::{app, AppState};
use edufocus_api::auth::issue_token;
use edufocus_api::config::{DatabaseConfig, SecurityConfig};
use edufocus_api::database::models::TenantRecord;
use edufocus_api::database::DatabaseManager;
use edufocus_api::directory::DirectoryStore;
use edufocus_api::types::{Principal, RequestContext, Role, TenantId};

/// A throwaway data directory with the directory database already migrated
pub struct TestEnv {
    pub dir: TempDir,
    pub databases: DatabaseManager,
    pub directory: DirectoryStore,
}

pub async fn setup() -> Result<TestEnv> {
    init_tracing();
    let dir = tempfile::tempdir().context("failed to create temp data dir")?;
    let databases = DatabaseManager::connect(DatabaseConfig::with_data_dir(dir.path())).await?;
    let directory = DirectoryStore::new(databases.directory_pool().clone());
    Ok(TestEnv {
        dir,
        databases,
        directory,
    })
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestEnv {
    /// Register a school under a fixed id so scenarios can name tenants directly
    pub async fn school(&self, id: TenantId, name: &str) -> Result<TenantRecord> {
        sqlx::query("INSERT INTO schools (id, name, email) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(name)
            .bind(format!("admin{}@escola.com", id))
            .execute(self.directory.pool())
            .await?;
        Ok(self.directory.require_school(id).await?)
    }

    pub fn admin_of(&self, school: &TenantRecord) -> RequestContext {
        RequestContext::new(Principal {
            id: school.id,
            email: school.email.clone(),
            name: Some(school.name.clone()),
            role: Role::SchoolAdmin,
            school_id: None,
        })
    }
}

pub fn security() -> SecurityConfig {
    SecurityConfig {
        jwt_secret: "integration-test-secret".to_string(),
        jwt_expiry_hours: 1,
        cors_origins: vec![],
    }
}

/// The API served in-process on an ephemeral port
pub struct TestServer {
    pub base_url: String,
    pub env: TestEnv,
    pub client: reqwest::Client,
}

pub async fn spawn_server() -> Result<TestServer> {
    let env = setup().await?;
    let state = AppState::new(env.databases.clone(), security());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state, false)).await;
    });

    Ok(TestServer {
        base_url: format!("http://{}", addr),
        env,
        client: reqwest::Client::new(),
    })
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn bearer(&self, principal: &Principal) -> Result<String> {
        Ok(format!("Bearer {}", issue_token(principal, &security())?))
    }
}
