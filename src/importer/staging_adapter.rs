// ==========================================
// 现场服务管理系统 - 暂存适配器
// ==========================================
// 职责: 解析记录 → 映射 → 跳过判定 → 写入 import_staging_*
// 红线: row_number = 原始解析序列中的 1 基位置（含被跳过行），入库后不重排
// 红线: 单行写入失败记 error 事件，不中断批次
// ==========================================

use crate::domain::staging::{RawRow, StagedFields, StagingRow};
use crate::domain::types::{EntityType, ValidationStatus};
use crate::engine::event_log::BatchEventLogger;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::ColumnMapping;
use crate::importer::import_traits::DataCleaner;
use crate::repository::import_store::{BatchLogRepository, BatchRepository, StagingRepository};
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// 暂存结果
#[derive(Debug, Clone, Default)]
pub struct StagingOutcome {
    pub staged_ids: Vec<String>,
    pub rows_skipped: i64,
    pub insert_failures: i64,
}

impl StagingOutcome {
    pub fn rows_staged(&self) -> i64 {
        self.staged_ids.len() as i64
    }
}

// ==========================================
// StagingAdapter
// ==========================================
pub struct StagingAdapter<'a, S>
where
    S: StagingRepository + BatchRepository + BatchLogRepository + ?Sized,
{
    store: &'a S,
    cleaner: &'a dyn DataCleaner,
}

impl<'a, S> StagingAdapter<'a, S>
where
    S: StagingRepository + BatchRepository + BatchLogRepository + ?Sized,
{
    pub fn new(store: &'a S, cleaner: &'a dyn DataCleaner) -> Self {
        Self { store, cleaner }
    }

    /// 批量写入暂存行
    ///
    /// # 参数
    /// - records: 解析器输出的原始记录（按文件顺序）
    /// - mapping: 自动映射或用户覆写后的映射
    ///
    /// # 返回
    /// - StagingOutcome: 新建暂存行 ID（按 row_number 顺序）与跳过计数
    #[instrument(skip(self, records, mapping), fields(batch_id = %batch_id, entity_type = %entity_type))]
    pub async fn stage_rows(
        &self,
        batch_id: &str,
        entity_type: EntityType,
        records: &[RawRow],
        mapping: &ColumnMapping,
    ) -> ImportResult<StagingOutcome> {
        let logger = BatchEventLogger::new(self.store, batch_id);
        let mut outcome = StagingOutcome::default();

        for (idx, raw) in records.iter().enumerate() {
            let row_number = (idx + 1) as i64;

            if self.cleaner.should_skip_row(entity_type, raw) {
                debug!(row_number, "跳过汇总行/空行");
                outcome.rows_skipped += 1;
                continue;
            }

            let mapped = mapping.apply(raw);
            let row = StagingRow {
                id: Uuid::new_v4().to_string(),
                batch_id: batch_id.to_string(),
                row_number,
                raw_data: raw.clone(),
                fields: StagedFields::from_mapped(entity_type, &mapped),
                validation_status: ValidationStatus::Pending,
                validation_errors: Vec::new(),
                imported_record_id: None,
            };

            match self.store.insert_staging_row(&row).await {
                Ok(()) => outcome.staged_ids.push(row.id),
                Err(e) => {
                    outcome.insert_failures += 1;
                    logger
                        .error(
                            &format!("第 {} 行暂存失败: {}", row_number, e),
                            Some(json!({ "row_number": row_number, "raw_data": raw })),
                        )
                        .await?;
                }
            }
        }

        info!(
            staged = outcome.rows_staged(),
            skipped = outcome.rows_skipped,
            failures = outcome.insert_failures,
            "暂存完成"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::data_cleaner::DataCleaner as Cleaner;
    use crate::importer::field_mapper::SynonymFieldMapper;
    use crate::importer::import_traits::FieldMapper;
    use crate::domain::batch::ImportBatch;
    use crate::repository::SqliteImportStore;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_row_numbers_include_skipped_rows() {
        let store = SqliteImportStore::in_memory().unwrap();
        let batch = ImportBatch::new(
            "b1".to_string(),
            "IMP-20250101-0001".to_string(),
            EntityType::Ar,
            "ar.csv".to_string(),
            10,
            "tester".to_string(),
        );
        store.insert_batch(&batch).await.unwrap();

        let records = vec![
            raw(&[("Invoice", "INV-1"), ("Customer ID", "C1"), ("Balance", "10")]),
            raw(&[("Invoice", "Total"), ("Customer ID", ""), ("Balance", "10")]),
            raw(&[("Invoice", "INV-2"), ("Customer ID", "C2"), ("Balance", "5")]),
        ];
        let headers: Vec<String> = vec!["Invoice".into(), "Customer ID".into(), "Balance".into()];
        let mapping = SynonymFieldMapper.suggest_mapping(EntityType::Ar, &headers);

        let cleaner = Cleaner;
        let adapter = StagingAdapter::new(&store, &cleaner);
        let outcome = adapter
            .stage_rows("b1", EntityType::Ar, &records, &mapping)
            .await
            .unwrap();

        assert_eq!(outcome.rows_staged(), 2);
        assert_eq!(outcome.rows_skipped, 1);

        let rows = store
            .list_staging_rows(EntityType::Ar, "b1", None, None, 0)
            .await
            .unwrap();
        let numbers: Vec<i64> = rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert!(rows.iter().all(|r| r.validation_status == ValidationStatus::Pending));
    }

    #[tokio::test]
    async fn test_interior_blank_line_counted_as_skipped() {
        use crate::importer::file_parser::{parse_text, TextEncoding};

        let store = SqliteImportStore::in_memory().unwrap();
        let batch = ImportBatch::new(
            "b2".to_string(),
            "IMP-20250101-0002".to_string(),
            EntityType::Customers,
            "c.csv".to_string(),
            10,
            "tester".to_string(),
        );
        store.insert_batch(&batch).await.unwrap();

        let parsed = parse_text(
            "Customer Name,Email\nAcme,a@acme.com\n\nBeta,b@beta.io\n",
            TextEncoding::Utf8,
        );
        let mapping = SynonymFieldMapper.suggest_mapping(EntityType::Customers, &parsed.headers);

        let cleaner = Cleaner;
        let adapter = StagingAdapter::new(&store, &cleaner);
        let outcome = adapter
            .stage_rows("b2", EntityType::Customers, &parsed.records, &mapping)
            .await
            .unwrap();

        assert_eq!(outcome.rows_staged(), 2);
        assert_eq!(outcome.rows_skipped, 1);

        let rows = store
            .list_staging_rows(EntityType::Customers, "b2", None, None, 0)
            .await
            .unwrap();
        let numbers: Vec<i64> = rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }
}
