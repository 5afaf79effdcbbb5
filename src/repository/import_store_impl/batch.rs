use super::core::{parse_column, parse_json_column, SqliteImportStore};
use crate::domain::batch::{CommitSummary, ImportBatch, PhaseTransition};
use crate::repository::error::RepositoryResult;
use crate::repository::import_store::BatchRepository;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension, Row};

const BATCH_COLUMNS: &str = r#"
    batch_id, batch_number, entity_type, file_name, file_size, encoding, phase,
    rows_total, rows_skipped, rows_valid, rows_error, rows_imported,
    validated_rows, committed_rows,
    is_cancel_requested, is_rollback_requested, supports_rollback,
    created_by, created_at, started_at, validated_at, completed_at, rolled_back_at,
    last_error_message, last_error_at, error_summary, commit_summary_json
"#;

fn map_batch_row(row: &Row) -> rusqlite::Result<ImportBatch> {
    let entity_type: String = row.get(2)?;
    let phase: String = row.get(6)?;
    let commit_summary: Option<String> = row.get(26)?;

    Ok(ImportBatch {
        batch_id: row.get(0)?,
        batch_number: row.get(1)?,
        entity_type: parse_column(2, &entity_type)?,
        file_name: row.get(3)?,
        file_size: row.get(4)?,
        encoding: row.get(5)?,
        phase: parse_column(6, &phase)?,
        rows_total: row.get(7)?,
        rows_skipped: row.get(8)?,
        rows_valid: row.get(9)?,
        rows_error: row.get(10)?,
        rows_imported: row.get(11)?,
        validated_rows: row.get(12)?,
        committed_rows: row.get(13)?,
        is_cancel_requested: row.get(14)?,
        is_rollback_requested: row.get(15)?,
        supports_rollback: row.get(16)?,
        created_by: row.get(17)?,
        created_at: row.get(18)?,
        started_at: row.get(19)?,
        validated_at: row.get(20)?,
        completed_at: row.get(21)?,
        rolled_back_at: row.get(22)?,
        last_error_message: row.get(23)?,
        last_error_at: row.get(24)?,
        error_summary: row.get(25)?,
        commit_summary: commit_summary
            .as_deref()
            .map(|raw| parse_json_column::<CommitSummary>(26, raw))
            .transpose()?,
    })
}

#[async_trait]
impl BatchRepository for SqliteImportStore {
    async fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let commit_summary = batch
            .commit_summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, batch_number, entity_type, file_name, file_size, encoding, phase,
                rows_total, rows_skipped, rows_valid, rows_error, rows_imported,
                validated_rows, committed_rows,
                is_cancel_requested, is_rollback_requested, supports_rollback,
                created_by, created_at, started_at, validated_at, completed_at, rolled_back_at,
                last_error_message, last_error_at, error_summary, commit_summary_json
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
            )
            "#,
            params![
                batch.batch_id,
                batch.batch_number,
                batch.entity_type.as_str(),
                batch.file_name,
                batch.file_size,
                batch.encoding,
                batch.phase.as_str(),
                batch.rows_total,
                batch.rows_skipped,
                batch.rows_valid,
                batch.rows_error,
                batch.rows_imported,
                batch.validated_rows,
                batch.committed_rows,
                batch.is_cancel_requested,
                batch.is_rollback_requested,
                batch.supports_rollback,
                batch.created_by,
                batch.created_at,
                batch.started_at,
                batch.validated_at,
                batch.completed_at,
                batch.rolled_back_at,
                batch.last_error_message,
                batch.last_error_at,
                batch.error_summary,
                commit_summary,
            ],
        )?;

        Ok(())
    }

    async fn find_batch(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM import_batch WHERE batch_id = ?1", BATCH_COLUMNS);

        let batch = conn
            .query_row(&sql, params![batch_id], map_batch_row)
            .optional()?;
        Ok(batch)
    }

    async fn list_batches(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM import_batch ORDER BY created_at DESC, batch_number DESC LIMIT ?1 OFFSET ?2",
            BATCH_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params![limit, offset], map_batch_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    async fn max_batch_sequence_on(&self, day: NaiveDate) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        // 批次号格式 IMP-YYYYMMDD-NNNN，序号从第 14 个字符开始
        let max = conn.query_row(
            "SELECT COALESCE(MAX(CAST(substr(batch_number, 14) AS INTEGER)), 0)
             FROM import_batch WHERE batch_number LIKE ?1",
            params![format!("IMP-{}-%", day.format("%Y%m%d"))],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    async fn transition_phase(
        &self,
        batch_id: &str,
        transition: &PhaseTransition,
    ) -> RepositoryResult<bool> {
        if transition.from.is_empty() {
            return Ok(false);
        }

        let conn = self.get_conn()?;

        let placeholders: Vec<String> = (0..transition.from.len())
            .map(|i| format!("?{}", i + 8))
            .collect();
        let sql = format!(
            r#"
            UPDATE import_batch SET
                phase = ?1,
                started_at = COALESCE(?2, started_at),
                completed_at = COALESCE(?3, completed_at),
                rolled_back_at = COALESCE(?4, rolled_back_at),
                error_summary = COALESCE(?5, error_summary),
                is_cancel_requested = MAX(is_cancel_requested, ?6)
            WHERE batch_id = ?7 AND phase IN ({})
            "#,
            placeholders.join(", ")
        );

        let to = transition.to.as_str();
        let from: Vec<&str> = transition.from.iter().map(|p| p.as_str()).collect();
        let mut values: Vec<&dyn ToSql> = vec![
            &to,
            &transition.started_at,
            &transition.completed_at,
            &transition.rolled_back_at,
            &transition.error_summary,
            &transition.cancel_requested,
            &batch_id,
        ];
        for phase in &from {
            values.push(phase);
        }

        let updated = conn.execute(&sql, values.as_slice())?;
        Ok(updated > 0)
    }

    async fn set_encoding(&self, batch_id: &str, encoding: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE import_batch SET encoding = ?1 WHERE batch_id = ?2",
            params![encoding, batch_id],
        )?;
        Ok(())
    }

    async fn set_ingest_counts(
        &self,
        batch_id: &str,
        rows_total: i64,
        rows_skipped: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE import_batch SET rows_total = ?1, rows_skipped = ?2 WHERE batch_id = ?3",
            params![rows_total, rows_skipped, batch_id],
        )?;
        Ok(())
    }

    async fn reset_validation_progress(&self, batch_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE import_batch
            SET validated_rows = 0, rows_valid = 0, rows_error = 0, validated_at = NULL
            WHERE batch_id = ?1
            "#,
            params![batch_id],
        )?;
        Ok(())
    }

    async fn set_validated_rows(&self, batch_id: &str, validated_rows: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE import_batch SET validated_rows = MAX(validated_rows, ?1) WHERE batch_id = ?2",
            params![validated_rows, batch_id],
        )?;
        Ok(())
    }

    async fn finish_validation(
        &self,
        batch_id: &str,
        rows_valid: i64,
        rows_error: i64,
        validated_at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            UPDATE import_batch
            SET rows_valid = ?1, rows_error = ?2, validated_at = ?3
            WHERE batch_id = ?4
            "#,
            params![rows_valid, rows_error, validated_at, batch_id],
        )?;
        Ok(())
    }

    async fn set_committed_rows(&self, batch_id: &str, committed_rows: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE import_batch SET committed_rows = MAX(committed_rows, ?1) WHERE batch_id = ?2",
            params![committed_rows, batch_id],
        )?;
        Ok(())
    }

    async fn set_commit_summary(
        &self,
        batch_id: &str,
        summary: &CommitSummary,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let json = serde_json::to_string(summary)?;
        conn.execute(
            r#"
            UPDATE import_batch
            SET commit_summary_json = ?1, rows_imported = ?2
            WHERE batch_id = ?3
            "#,
            params![json, summary.imported(), batch_id],
        )?;
        Ok(())
    }

    async fn request_cancel(&self, batch_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE import_batch SET is_cancel_requested = 1 WHERE batch_id = ?1",
            params![batch_id],
        )?;
        Ok(updated > 0)
    }

    async fn is_cancel_requested(&self, batch_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let flag: Option<bool> = conn
            .query_row(
                "SELECT is_cancel_requested FROM import_batch WHERE batch_id = ?1",
                params![batch_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.unwrap_or(false))
    }

    async fn mark_rollback_requested(&self, batch_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE import_batch SET is_rollback_requested = 1 WHERE batch_id = ?1",
            params![batch_id],
        )?;
        Ok(())
    }

    async fn record_error(
        &self,
        batch_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE import_batch SET last_error_message = ?1, last_error_at = ?2 WHERE batch_id = ?3",
            params![message, at, batch_id],
        )?;
        Ok(())
    }

    async fn delete_batch_record(&self, batch_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM import_batch WHERE batch_id = ?1",
            params![batch_id],
        )?;
        Ok(deleted)
    }
}
