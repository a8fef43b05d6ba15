//! Baseline schemas and additive migrations for the directory and school stores.
//!
//! Schema evolution is additive-only. Every step here can be attempted any
//! number of times, concurrently, against a store at any previous version:
//! tables use `CREATE ... IF NOT EXISTS` and new columns are added only when
//! missing, with the "duplicate column" error from a racing writer swallowed.

use sqlx::sqlite::SqliteConnection;
use tracing::debug;

use crate::database::manager::DatabaseError;

/// A column added after the baseline table was first shipped
#[derive(Debug, Clone, Copy)]
pub struct ColumnMigration {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
}

impl ColumnMigration {
    const fn new(table: &'static str, column: &'static str, definition: &'static str) -> Self {
        Self { table, column, definition }
    }

    fn name(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Tables every school store contains
pub const TENANT_TABLES: &[(&str, &str)] = &[
    (
        "students",
        "CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_email TEXT,
            phone TEXT,
            photo_url TEXT,
            class_name TEXT,
            age INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "attendance",
        "CREATE TABLE IF NOT EXISTS attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            timestamp DATETIME,
            type TEXT
        )",
    ),
    (
        "access_logs",
        "CREATE TABLE IF NOT EXISTS access_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            event_type TEXT NOT NULL,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
            notified_guardian INTEGER DEFAULT 0
        )",
    ),
    (
        "classes",
        "CREATE TABLE IF NOT EXISTS classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT
        )",
    ),
    (
        "teacher_classes",
        "CREATE TABLE IF NOT EXISTS teacher_classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            teacher_id INTEGER,
            class_id INTEGER
        )",
    ),
    (
        "student_guardians",
        "CREATE TABLE IF NOT EXISTS student_guardians (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            guardian_id INTEGER,
            linked_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "student_grades",
        "CREATE TABLE IF NOT EXISTS student_grades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            subject TEXT,
            value REAL,
            term TEXT,
            teacher_id INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "student_reports",
        "CREATE TABLE IF NOT EXISTS student_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            teacher_id INTEGER,
            title TEXT,
            content TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "invoices",
        "CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            description TEXT,
            amount REAL,
            status TEXT DEFAULT 'pending',
            payment_method TEXT,
            due_date TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "chat_messages",
        "CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            school_id INTEGER,
            sender_type TEXT,
            sender_id INTEGER,
            message_type TEXT,
            content TEXT,
            file_url TEXT,
            file_name TEXT,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "pickup_requests",
        "CREATE TABLE IF NOT EXISTS pickup_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            guardian_id INTEGER NOT NULL,
            status TEXT DEFAULT 'waiting',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "employees",
        "CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            role TEXT,
            photo_url TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
];

pub const TENANT_COLUMNS: &[ColumnMigration] = &[
    ColumnMigration::new("students", "face_descriptor", "TEXT"),
    ColumnMigration::new("chat_messages", "is_read_by_guardian", "INTEGER DEFAULT 0"),
    ColumnMigration::new("chat_messages", "is_read_by_school", "INTEGER DEFAULT 0"),
    ColumnMigration::new("employees", "email", "TEXT"),
    ColumnMigration::new("employees", "phone", "TEXT"),
    ColumnMigration::new("employees", "employee_id", "TEXT"),
    ColumnMigration::new("employees", "work_start_time", "TEXT"),
    ColumnMigration::new("employees", "work_end_time", "TEXT"),
    ColumnMigration::new("employees", "guardian_id", "INTEGER"),
    ColumnMigration::new("invoices", "external_id", "TEXT"),
    ColumnMigration::new("invoices", "payment_url", "TEXT"),
    ColumnMigration::new("pickup_requests", "lat", "REAL"),
    ColumnMigration::new("pickup_requests", "lng", "REAL"),
];

pub const TENANT_INDEXES: &[(&str, &str)] = &[
    (
        "idx_student_guardians_guardian",
        "CREATE INDEX IF NOT EXISTS idx_student_guardians_guardian ON student_guardians(guardian_id)",
    ),
    (
        "idx_access_logs_student",
        "CREATE INDEX IF NOT EXISTS idx_access_logs_student ON access_logs(student_id)",
    ),
];

pub const DIRECTORY_TABLES: &[(&str, &str)] = &[
    (
        "super_admins",
        "CREATE TABLE IF NOT EXISTS super_admins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            email TEXT NOT NULL UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "schools",
        "CREATE TABLE IF NOT EXISTS schools (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            admin_name TEXT,
            email TEXT NOT NULL UNIQUE,
            address TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "teachers",
        "CREATE TABLE IF NOT EXISTS teachers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            email TEXT NOT NULL UNIQUE,
            subject TEXT,
            school_id INTEGER,
            status TEXT DEFAULT 'pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "inspectors",
        "CREATE TABLE IF NOT EXISTS inspectors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            email TEXT NOT NULL UNIQUE,
            school_id INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "guardians",
        "CREATE TABLE IF NOT EXISTS guardians (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        "school_affiliates",
        "CREATE TABLE IF NOT EXISTS school_affiliates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_school_id INTEGER NOT NULL,
            affiliate_school_id INTEGER,
            token TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    ),
];

pub const DIRECTORY_COLUMNS: &[ColumnMigration] = &[
    ColumnMigration::new("guardians", "role", "TEXT DEFAULT 'guardian'"),
];

pub const DIRECTORY_INDEXES: &[(&str, &str)] = &[
    (
        "idx_school_affiliates_parent",
        "CREATE INDEX IF NOT EXISTS idx_school_affiliates_parent ON school_affiliates(parent_school_id)",
    ),
    (
        "idx_school_affiliates_affiliate",
        "CREATE INDEX IF NOT EXISTS idx_school_affiliates_affiliate ON school_affiliates(affiliate_school_id)",
    ),
    (
        "idx_teachers_school",
        "CREATE INDEX IF NOT EXISTS idx_teachers_school ON teachers(school_id)",
    ),
];

pub async fn migrate_tenant(conn: &mut SqliteConnection, store: &str) -> Result<(), DatabaseError> {
    apply(conn, store, TENANT_TABLES, TENANT_COLUMNS, TENANT_INDEXES).await
}

pub async fn migrate_directory(conn: &mut SqliteConnection) -> Result<(), DatabaseError> {
    apply(conn, "system", DIRECTORY_TABLES, DIRECTORY_COLUMNS, DIRECTORY_INDEXES).await
}

async fn apply(
    conn: &mut SqliteConnection,
    store: &str,
    tables: &[(&str, &str)],
    columns: &[ColumnMigration],
    indexes: &[(&str, &str)],
) -> Result<(), DatabaseError> {
    for (name, ddl) in tables {
        sqlx::query(ddl)
            .execute(&mut *conn)
            .await
            .map_err(|e| classify(store, name, e))?;
    }

    for migration in columns {
        add_column(conn, store, migration).await?;
    }

    for (name, ddl) in indexes {
        sqlx::query(ddl)
            .execute(&mut *conn)
            .await
            .map_err(|e| classify(store, name, e))?;
    }

    Ok(())
}

async fn add_column(
    conn: &mut SqliteConnection,
    store: &str,
    migration: &ColumnMigration,
) -> Result<(), DatabaseError> {
    let (present,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2")
            .bind(migration.table)
            .bind(migration.column)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| classify(store, &migration.name(), e))?;

    if present > 0 {
        return Ok(());
    }

    let ddl = format!(
        "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
        migration.table, migration.column, migration.definition
    );

    match sqlx::query(&ddl).execute(&mut *conn).await {
        Ok(_) => {
            debug!(store, migration = %migration.name(), "Added column");
            Ok(())
        }
        // Another connection added it between our check and the ALTER
        Err(e) if is_duplicate_column(&e) => {
            debug!(store, migration = %migration.name(), "Column already added concurrently");
            Ok(())
        }
        Err(e) => Err(classify(store, &migration.name(), e)),
    }
}

/// Genuine schema failures become `SchemaMigrationConflict`; failures that mean
/// the file cannot be used at all (I/O, corruption, lock timeouts) stay as
/// plain sqlx errors so the caller can report the store as unavailable.
fn classify(store: &str, migration: &str, err: sqlx::Error) -> DatabaseError {
    if is_store_unavailable(&err) {
        return DatabaseError::Sqlx(err);
    }
    match err {
        sqlx::Error::Database(db) => DatabaseError::SchemaMigrationConflict {
            store: store.to_string(),
            migration: migration.to_string(),
            message: db.message().to_string(),
        },
        other => DatabaseError::Sqlx(other),
    }
}

pub fn is_duplicate_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("duplicate column name"),
        _ => false,
    }
}

// SQLITE_BUSY, SQLITE_LOCKED, SQLITE_IOERR, SQLITE_CORRUPT, SQLITE_CANTOPEN, SQLITE_NOTADB
const UNAVAILABLE_CODES: &[i64] = &[5, 6, 10, 11, 14, 26];

pub fn is_store_unavailable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i64>().ok())
            .map(|code| UNAVAILABLE_CODES.contains(&(code & 0xff)))
            .unwrap_or(false),
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        _ => false,
    }
}
