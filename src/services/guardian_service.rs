use super::{across_schools, FanOut, ServiceError};
use crate::database::manager::DatabaseManager;
use crate::database::models::student::{ChildRow, EventRow};
use crate::database::models::{GuardianChild, GuardianEvent};
use crate::directory::DirectoryStore;

/// Guardians are not tied to one school, so their views are assembled by
/// querying every school store and keeping whatever answers.
#[derive(Clone)]
pub struct GuardianService {
    databases: DatabaseManager,
    directory: DirectoryStore,
}

impl GuardianService {
    pub fn new(databases: DatabaseManager, directory: DirectoryStore) -> Self {
        Self { databases, directory }
    }

    pub async fn children_across_schools(&self, guardian_id: i64) -> Result<FanOut<GuardianChild>, ServiceError> {
        let schools = self.directory.list_schools().await?;

        let fan_out = across_schools(&self.databases, schools, move |store| {
            Box::pin(async move {
                let rows: Vec<ChildRow> = sqlx::query_as(
                    r#"
                    SELECT s.id, s.name, s.photo_url, s.class_name, sg.linked_at
                    FROM students s
                    JOIN student_guardians sg ON s.id = sg.student_id
                    WHERE sg.guardian_id = ?1
                    ORDER BY s.name
                    "#,
                )
                .bind(guardian_id)
                .fetch_all(store.conn())
                .await?;
                Ok(rows)
            })
        })
        .await?;

        let mut children = FanOut {
            items: Vec::new(),
            skipped: fan_out.skipped,
        };
        for (school, rows) in fan_out.items {
            children.items.extend(rows.into_iter().map(|row| GuardianChild {
                school_id: school.id,
                school_name: school.name.clone(),
                student_id: row.id,
                name: row.name,
                photo_url: row.photo_url,
                class_name: row.class_name,
                linked_at: row.linked_at,
            }));
        }
        Ok(children)
    }

    /// Most recent entry/exit events for the guardian's children across all
    /// schools, newest first, at most `limit` in total.
    pub async fn recent_events(&self, guardian_id: i64, limit: u32) -> Result<FanOut<GuardianEvent>, ServiceError> {
        let schools = self.directory.list_schools().await?;

        let fan_out = across_schools(&self.databases, schools, move |store| {
            Box::pin(async move {
                let rows: Vec<EventRow> = sqlx::query_as(
                    r#"
                    SELECT al.id, al.student_id, s.name AS student_name, al.event_type, al.timestamp
                    FROM access_logs al
                    JOIN students s ON al.student_id = s.id
                    JOIN student_guardians sg ON s.id = sg.student_id
                    WHERE sg.guardian_id = ?1
                    ORDER BY al.timestamp DESC, al.id DESC
                    LIMIT ?2
                    "#,
                )
                .bind(guardian_id)
                .bind(limit)
                .fetch_all(store.conn())
                .await?;
                Ok(rows)
            })
        })
        .await?;

        let mut events = FanOut {
            items: Vec::new(),
            skipped: fan_out.skipped,
        };
        for (school, rows) in fan_out.items {
            events.items.extend(rows.into_iter().map(|row| GuardianEvent {
                school_id: school.id,
                school_name: school.name.clone(),
                event_id: row.id,
                student_id: row.student_id,
                student_name: row.student_name,
                event_type: row.event_type,
                timestamp: row.timestamp,
            }));
        }
        events.items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.items.truncate(limit as usize);
        Ok(events)
    }
}
