mod common;

use anyhow::Result;
use edufocus_api::database::schema::TENANT_TABLES;
use edufocus_api::database::DatabaseError;

#[tokio::test]
async fn fresh_store_has_every_baseline_table() -> Result<()> {
    let env = common::setup().await?;

    let mut store = env.databases.resolve(20).await?;
    assert!(store.was_created());
    assert_eq!(store.tenant_id(), 20);

    let tables = store.table_names().await?;
    for (name, _) in TENANT_TABLES {
        assert!(tables.iter().any(|t| t == name), "missing table {}", name);
    }

    let columns = store.column_names("employees").await?;
    for column in ["email", "phone", "employee_id", "work_start_time", "work_end_time", "guardian_id"] {
        assert!(columns.iter().any(|c| c == column), "missing employees.{}", column);
    }
    store.close().await?;

    // Second resolution reopens the same file
    let store = env.databases.resolve(20).await?;
    assert!(!store.was_created());
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn stores_are_isolated_per_school() -> Result<()> {
    let env = common::setup().await?;

    let mut a = env.databases.resolve(1).await?;
    sqlx::query("INSERT INTO students (name) VALUES ('Ana')")
        .execute(a.conn())
        .await?;
    a.close().await?;

    let mut b = env.databases.resolve(2).await?;
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM students")
        .fetch_one(b.conn())
        .await?;
    assert_eq!(count, 0);
    b.close().await?;

    assert!(env.dir.path().join("school_1.db").exists());
    assert!(env.dir.path().join("school_2.db").exists());
    Ok(())
}

#[tokio::test]
async fn concurrent_resolves_leave_one_schema() -> Result<()> {
    let env = common::setup().await?;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let databases = env.databases.clone();
        handles.push(tokio::spawn(async move {
            let store = databases.resolve(33).await?;
            store.close().await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let mut store = env.databases.resolve(33).await?;
    let tables = store.table_names().await?;
    assert_eq!(tables.len(), TENANT_TABLES.len());

    let students = store.column_names("students").await?;
    let descriptors = students.iter().filter(|c| c.as_str() == "face_descriptor").count();
    assert_eq!(descriptors, 1);
    store.close().await?;
    Ok(())
}

#[tokio::test]
async fn unreadable_store_is_unavailable() -> Result<()> {
    let env = common::setup().await?;
    let path = env.databases.tenant_path(40)?;
    std::fs::write(&path, vec![0x5a_u8; 8192])?;

    match env.databases.resolve(40).await {
        Err(DatabaseError::StoreUnavailable { tenant_id, .. }) => assert_eq!(tenant_id, 40),
        Err(other) => panic!("expected StoreUnavailable, got {other}"),
        Ok(_) => panic!("garbage file opened as a store"),
    }
    Ok(())
}

#[tokio::test]
async fn incompatible_legacy_schema_is_a_migration_conflict() -> Result<()> {
    let env = common::setup().await?;

    {
        use sqlx::{ConnectOptions, Connection};
        let path = env.databases.tenant_path(41)?;
        let mut conn = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .connect()
            .await?;
        // A view can never gain the columns the current schema expects
        sqlx::query("CREATE VIEW students AS SELECT 1 AS id, 'Ana' AS name")
            .execute(&mut conn)
            .await?;
        conn.close().await?;
    }

    match env.databases.resolve(41).await {
        Err(DatabaseError::SchemaMigrationConflict { store, .. }) => assert_eq!(store, "school_41"),
        Err(other) => panic!("expected SchemaMigrationConflict, got {other}"),
        Ok(_) => panic!("migration unexpectedly succeeded"),
    }
    Ok(())
}

#[tokio::test]
async fn invalid_tenant_ids_never_touch_disk() -> Result<()> {
    let env = common::setup().await?;
    assert!(matches!(env.databases.resolve(0).await, Err(DatabaseError::InvalidTenantId(0))));
    assert!(!env.dir.path().join("school_0.db").exists());
    Ok(())
}

#[tokio::test]
async fn classes_are_listed_by_name() -> Result<()> {
    use edufocus_api::services::school_service::{create_class, list_classes};

    let env = common::setup().await?;
    let result: Vec<String> = env
        .databases
        .with_store(8, |store| {
            Box::pin(async move {
                create_class(store, "7º Ano B", None).await?;
                create_class(store, "6º Ano A", Some("Manhã")).await?;
                let classes = list_classes(store).await?;
                Ok::<_, DatabaseError>(classes.into_iter().map(|c| c.name).collect())
            })
        })
        .await?;

    assert_eq!(result, ["6º Ano A", "7º Ano B"]);
    Ok(())
}
