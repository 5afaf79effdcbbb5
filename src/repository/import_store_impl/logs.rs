use super::core::{parse_column, parse_json_column, SqliteImportStore};
use crate::domain::event::{BatchLogEvent, RollbackLogEntry};
use crate::domain::types::{EntityType, LogLevel, RollbackAction};
use crate::repository::error::RepositoryResult;
use crate::repository::import_store::BatchLogRepository;
use async_trait::async_trait;
use rusqlite::{params, Row};

fn map_event(row: &Row) -> rusqlite::Result<BatchLogEvent> {
    let level: String = row.get(2)?;
    let details: Option<String> = row.get(4)?;

    Ok(BatchLogEvent {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        level: parse_column::<LogLevel>(2, &level)?,
        message: row.get(3)?,
        details: details
            .as_deref()
            .map(|raw| parse_json_column(4, raw))
            .transpose()?,
        created_at: row.get(5)?,
    })
}

fn map_rollback_entry(row: &Row) -> rusqlite::Result<RollbackLogEntry> {
    let entity_type: String = row.get(2)?;
    let action: String = row.get(4)?;

    Ok(RollbackLogEntry {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        entity_type: parse_column::<EntityType>(2, &entity_type)?,
        entity_id: row.get(3)?,
        action: parse_column::<RollbackAction>(4, &action)?,
        reason: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[async_trait]
impl BatchLogRepository for SqliteImportStore {
    async fn append_event(&self, event: &BatchLogEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let details = event.details.as_ref().map(|v| v.to_string());

        conn.execute(
            r#"
            INSERT INTO import_batch_log (id, batch_id, level, message, details_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                event.id,
                event.batch_id,
                event.level.as_str(),
                event.message,
                details,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    async fn list_events(
        &self,
        batch_id: &str,
        level: Option<LogLevel>,
    ) -> RepositoryResult<Vec<BatchLogEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, batch_id, level, message, details_json, created_at
            FROM import_batch_log
            WHERE batch_id = ?1 AND (?2 IS NULL OR level = ?2)
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let events = stmt
            .query_map(params![batch_id, level.map(|l| l.as_str())], map_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    async fn delete_events(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM import_batch_log WHERE batch_id = ?1",
            params![batch_id],
        )?;
        Ok(deleted)
    }

    async fn append_rollback_entry(&self, entry: &RollbackLogEntry) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_rollback_log (
                id, batch_id, entity_type, entity_id, action, reason, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.id,
                entry.batch_id,
                entry.entity_type.as_str(),
                entry.entity_id,
                entry.action.as_str(),
                entry.reason,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    async fn list_rollback_entries(
        &self,
        batch_id: &str,
    ) -> RepositoryResult<Vec<RollbackLogEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, batch_id, entity_type, entity_id, action, reason, created_at
            FROM import_rollback_log
            WHERE batch_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let entries = stmt
            .query_map(params![batch_id], map_rollback_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn delete_rollback_entries(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM import_rollback_log WHERE batch_id = ?1",
            params![batch_id],
        )?;
        Ok(deleted)
    }
}
