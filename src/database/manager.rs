use futures::future::BoxFuture;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::database::schema;
use crate::types::TenantId;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid school id: {0}")]
    InvalidTenantId(TenantId),

    #[error("Store for school {tenant_id} is unavailable: {source}")]
    StoreUnavailable {
        tenant_id: TenantId,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration '{migration}' failed on {store}: {message}")]
    SchemaMigrationConflict {
        store: String,
        migration: String,
        message: String,
    },

    #[error("Cannot prepare data directory {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// True for failures confined to one store, which a cross-school query
    /// may skip. A migration conflict never is.
    pub fn is_skippable(&self) -> bool {
        matches!(self, DatabaseError::StoreUnavailable { .. } | DatabaseError::Sqlx(_))
    }
}

/// Owns the directory pool and opens per-school stores on demand.
///
/// School stores are never cached: every `resolve` opens a fresh connection
/// and re-runs the additive migrations, so a handle is only ever as old as the
/// request holding it.
#[derive(Clone)]
pub struct DatabaseManager {
    config: DatabaseConfig,
    directory: SqlitePool,
}

impl DatabaseManager {
    const DIRECTORY_DB_NAME: &'static str = "system.db";

    /// Open (creating if needed) the directory database and bring its schema up to date
    pub async fn connect(config: DatabaseConfig) -> Result<Self, DatabaseError> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|source| DatabaseError::DataDir {
                path: config.data_dir.clone(),
                source,
            })?;

        let path = config.data_dir.join(Self::DIRECTORY_DB_NAME);
        let directory = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(Self::connect_options(&config, &path))
            .await?;

        {
            let mut conn = directory.acquire().await?;
            schema::migrate_directory(&mut conn).await?;
        }

        info!("Directory database ready at {}", path.display());
        Ok(Self { config, directory })
    }

    pub fn directory_pool(&self) -> &SqlitePool {
        &self.directory
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// File backing a school's isolated store
    pub fn tenant_path(&self, tenant_id: TenantId) -> Result<PathBuf, DatabaseError> {
        if tenant_id <= 0 {
            return Err(DatabaseError::InvalidTenantId(tenant_id));
        }
        Ok(self.config.data_dir.join(format!("school_{}.db", tenant_id)))
    }

    /// Open a school's store, creating it with the baseline schema when absent
    /// and applying any additive migrations it is missing.
    pub async fn resolve(&self, tenant_id: TenantId) -> Result<TenantStore, DatabaseError> {
        let path = self.tenant_path(tenant_id)?;
        let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);

        let mut conn = Self::connect_options(&self.config, &path)
            .connect()
            .await
            .map_err(|source| DatabaseError::StoreUnavailable { tenant_id, source })?;

        let label = format!("school_{}", tenant_id);
        // conn is dropped (and closed) if migration fails
        schema::migrate_tenant(&mut conn, &label)
            .await
            .map_err(|e| match e {
                DatabaseError::Sqlx(source) => DatabaseError::StoreUnavailable { tenant_id, source },
                other => other,
            })?;

        if existed {
            debug!(tenant_id, "Opened school store");
        } else {
            info!(tenant_id, path = %path.display(), "Created school store");
        }

        Ok(TenantStore {
            tenant_id,
            created: !existed,
            conn,
        })
    }

    /// Run `f` against a freshly resolved store and close the store afterwards,
    /// whether `f` succeeded or not.
    pub async fn with_store<T, E, F>(&self, tenant_id: TenantId, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut TenantStore) -> BoxFuture<'c, Result<T, E>>,
        E: From<DatabaseError>,
    {
        let mut store = self.resolve(tenant_id).await?;
        let result = f(&mut store).await;
        if let Err(e) = store.close().await {
            warn!(tenant_id, error = %e, "Failed to close school store cleanly");
        }
        result
    }

    /// Pings the directory pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.directory).await?;
        Ok(())
    }

    /// Close the directory pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.directory.close().await;
        info!("Closed directory database");
    }

    fn connect_options(config: &DatabaseConfig, path: &Path) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true)
    }
}

/// Connection to one school's isolated store, scoped to a request.
///
/// Dropping the handle closes the underlying connection; `close` does the
/// same but waits for SQLite to finish shutting the file down.
pub struct TenantStore {
    tenant_id: TenantId,
    created: bool,
    conn: SqliteConnection,
}

impl TenantStore {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// True when this resolution created the backing file
    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub async fn table_names(&mut self) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut self.conn)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn column_names(&mut self, table: &str) -> Result<Vec<String>, DatabaseError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .bind(table)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn close(self) -> Result<(), DatabaseError> {
        self.conn.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_positive_tenant_ids() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DatabaseManager::connect(DatabaseConfig::with_data_dir(dir.path()))
            .await
            .unwrap();

        assert!(matches!(manager.tenant_path(0), Err(DatabaseError::InvalidTenantId(0))));
        assert!(matches!(manager.tenant_path(-4), Err(DatabaseError::InvalidTenantId(-4))));
        assert!(matches!(
            manager.resolve(-1).await,
            Err(DatabaseError::InvalidTenantId(-1))
        ));
    }

    #[tokio::test]
    async fn tenant_path_is_per_school_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DatabaseManager::connect(DatabaseConfig::with_data_dir(dir.path()))
            .await
            .unwrap();

        let path = manager.tenant_path(20).unwrap();
        assert_eq!(path, dir.path().join("school_20.db"));
        assert!(dir.path().join("system.db").exists());
    }

    #[tokio::test]
    async fn with_store_closes_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DatabaseManager::connect(DatabaseConfig::with_data_dir(dir.path()))
            .await
            .unwrap();

        let result: Result<(), DatabaseError> = manager
            .with_store(5, |_store| {
                Box::pin(async move { Err(DatabaseError::Sqlx(sqlx::Error::RowNotFound)) })
            })
            .await;
        assert!(matches!(result, Err(DatabaseError::Sqlx(sqlx::Error::RowNotFound))));

        // The store was still created and can be reopened
        let store = manager.resolve(5).await.unwrap();
        assert!(!store.was_created());
        store.close().await.unwrap();
    }

    #[test]
    fn only_store_local_failures_are_skippable() {
        let unavailable = DatabaseError::StoreUnavailable {
            tenant_id: 3,
            source: sqlx::Error::PoolClosed,
        };
        let conflict = DatabaseError::SchemaMigrationConflict {
            store: "school_3".to_string(),
            migration: "students.face_descriptor".to_string(),
            message: "Cannot add a column to a view".to_string(),
        };

        assert!(unavailable.is_skippable());
        assert!(DatabaseError::Sqlx(sqlx::Error::RowNotFound).is_skippable());
        assert!(!conflict.is_skippable());
        assert!(!DatabaseError::InvalidTenantId(0).is_skippable());
    }
}
