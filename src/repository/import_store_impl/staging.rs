use super::core::{parse_column, parse_json_column, SqliteImportStore};
use crate::domain::staging::{FieldError, StagingRow};
use crate::domain::types::{EntityType, ValidationStatus};
use crate::repository::error::RepositoryResult;
use crate::repository::import_store::StagingRepository;
use async_trait::async_trait;
use rusqlite::{params, Row};

const STAGING_COLUMNS: &str = r#"
    id, batch_id, row_number, raw_data, fields_json,
    validation_status, validation_errors, imported_record_id
"#;

fn map_staging_row(row: &Row) -> rusqlite::Result<StagingRow> {
    let raw_data: String = row.get(3)?;
    let fields_json: String = row.get(4)?;
    let status: String = row.get(5)?;
    let errors: String = row.get(6)?;

    Ok(StagingRow {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        row_number: row.get(2)?,
        raw_data: parse_json_column(3, &raw_data)?,
        fields: parse_json_column(4, &fields_json)?,
        validation_status: parse_column::<ValidationStatus>(5, &status)?,
        validation_errors: parse_json_column(6, &errors)?,
        imported_record_id: row.get(7)?,
    })
}

#[async_trait]
impl StagingRepository for SqliteImportStore {
    async fn insert_staging_row(&self, row: &StagingRow) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let table = row.entity_type().staging_table();

        let raw_data = serde_json::to_string(&row.raw_data)?;
        let fields_json = serde_json::to_string(&row.fields)?;
        let errors = serde_json::to_string(&row.validation_errors)?;

        conn.execute(
            &format!(
                r#"
                INSERT INTO {} (
                    id, batch_id, row_number, raw_data, fields_json, dedup_key,
                    validation_status, validation_errors, imported_record_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                table
            ),
            params![
                row.id,
                row.batch_id,
                row.row_number,
                raw_data,
                fields_json,
                row.fields.dedup_key(),
                row.validation_status.as_str(),
                errors,
                row.imported_record_id,
            ],
        )?;

        Ok(())
    }

    async fn list_staging_rows(
        &self,
        entity_type: EntityType,
        batch_id: &str,
        status: Option<ValidationStatus>,
        limit: Option<i64>,
        offset: i64,
    ) -> RepositoryResult<Vec<StagingRow>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM {}
            WHERE batch_id = ?1 AND (?2 IS NULL OR validation_status = ?2)
            ORDER BY row_number ASC
            LIMIT ?3 OFFSET ?4
            "#,
            STAGING_COLUMNS,
            entity_type.staging_table()
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    batch_id,
                    status.map(|s| s.as_str()),
                    limit.unwrap_or(-1),
                    offset.max(0),
                ],
                map_staging_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn count_staging_rows(
        &self,
        entity_type: EntityType,
        batch_id: &str,
        status: Option<ValidationStatus>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE batch_id = ?1 AND (?2 IS NULL OR validation_status = ?2)",
            entity_type.staging_table()
        );
        let count = conn.query_row(&sql, params![batch_id, status.map(|s| s.as_str())], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    async fn update_validation(
        &self,
        entity_type: EntityType,
        row_id: &str,
        status: ValidationStatus,
        errors: &[FieldError],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let errors_json = serde_json::to_string(errors)?;
        conn.execute(
            &format!(
                "UPDATE {} SET validation_status = ?1, validation_errors = ?2 WHERE id = ?3",
                entity_type.staging_table()
            ),
            params![status.as_str(), errors_json, row_id],
        )?;
        Ok(())
    }

    async fn reset_validation(
        &self,
        entity_type: EntityType,
        batch_id: &str,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            &format!(
                "UPDATE {} SET validation_status = 'pending', validation_errors = '[]' WHERE batch_id = ?1",
                entity_type.staging_table()
            ),
            params![batch_id],
        )?;
        Ok(updated)
    }

    async fn link_imported_record(
        &self,
        entity_type: EntityType,
        row_id: &str,
        record_id: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "UPDATE {} SET imported_record_id = ?1 WHERE id = ?2",
                entity_type.staging_table()
            ),
            params![record_id, row_id],
        )?;
        Ok(())
    }

    async fn delete_staging_rows(
        &self,
        entity_type: EntityType,
        batch_id: &str,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE batch_id = ?1", entity_type.staging_table()),
            params![batch_id],
        )?;
        Ok(deleted)
    }
}
