// ==========================================
// 现场服务管理系统 - 校验执行器
// ==========================================
// 职责: 按 row_number 顺序逐行执行校验规则并回写结果
// 红线: 每轮校验每行恰好访问一次; 检查点观察取消标记
// 红线: validated_rows 按间隔落库，最后一行无条件落库
// ==========================================

use crate::config::ImportSettings;
use crate::domain::batch::ImportBatch;
use crate::domain::types::ValidationStatus;
use crate::engine::cancellation::{is_checkpoint, should_flush, CancellationProbe};
use crate::engine::event_log::BatchEventLogger;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_traits::RowValidator;
use crate::repository::import_store::{BatchLogRepository, BatchRepository, StagingRepository};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

/// 单轮校验结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rows_valid: i64,
    pub rows_error: i64,
}

impl ValidationReport {
    pub fn rows_checked(&self) -> i64 {
        self.rows_valid + self.rows_error
    }
}

pub struct ValidationRunner<'a, S>
where
    S: StagingRepository + BatchRepository + BatchLogRepository + ?Sized,
{
    store: &'a S,
    validator: &'a dyn RowValidator,
    probe: &'a dyn CancellationProbe,
    settings: &'a ImportSettings,
}

impl<'a, S> ValidationRunner<'a, S>
where
    S: StagingRepository + BatchRepository + BatchLogRepository + ?Sized,
{
    pub fn new(
        store: &'a S,
        validator: &'a dyn RowValidator,
        probe: &'a dyn CancellationProbe,
        settings: &'a ImportSettings,
    ) -> Self {
        Self {
            store,
            validator,
            probe,
            settings,
        }
    }

    /// 执行一轮完整校验
    ///
    /// # 返回
    /// - Ok(ValidationReport): 有效/错误行数（已写入批次）
    /// - Err(Cancelled): 检查点观察到取消标记
    #[instrument(skip(self, batch), fields(batch_id = %batch.batch_id, entity_type = %batch.entity_type))]
    pub async fn run(&self, batch: &ImportBatch) -> ImportResult<ValidationReport> {
        let batch_id = batch.batch_id.as_str();
        let entity_type = batch.entity_type;
        let logger = BatchEventLogger::new(self.store, batch_id);

        // 新一轮: 全部回到 pending，进度清零
        self.store.reset_validation(entity_type, batch_id).await?;
        self.store.reset_validation_progress(batch_id).await?;

        let rows = self
            .store
            .list_staging_rows(entity_type, batch_id, None, None, 0)
            .await?;
        let total = rows.len();
        let mut report = ValidationReport::default();

        for (idx, row) in rows.iter().enumerate() {
            if is_checkpoint(idx, self.settings.validation_checkpoint_rows)
                && self.probe.is_cancelled(batch_id).await?
            {
                self.store
                    .set_validated_rows(batch_id, report.rows_valid)
                    .await?;
                logger
                    .warning(
                        &format!("校验已取消: 停止前已处理 {} / {} 行", idx, total),
                        Some(json!({ "processed": idx, "rows_total": total })),
                    )
                    .await?;
                return Err(ImportError::Cancelled {
                    stage: "校验".to_string(),
                    processed: idx as i64,
                });
            }

            let errors = self.validator.validate(&row.fields);
            let status = if errors.is_empty() {
                report.rows_valid += 1;
                ValidationStatus::Valid
            } else {
                report.rows_error += 1;
                ValidationStatus::Error
            };
            debug!(row_number = row.row_number, status = status.as_str(), "行校验完成");

            self.store
                .update_validation(entity_type, &row.id, status, &errors)
                .await?;

            let visited = idx + 1;
            if should_flush(visited, total, self.settings.validation_progress_flush_rows) {
                self.store
                    .set_validated_rows(batch_id, report.rows_valid)
                    .await?;
            }
        }

        self.store
            .finish_validation(batch_id, report.rows_valid, report.rows_error, Utc::now())
            .await?;

        let message = format!(
            "校验完成: {} 行有效, {} 行错误",
            report.rows_valid, report.rows_error
        );
        let details = Some(json!({
            "rows_valid": report.rows_valid,
            "rows_error": report.rows_error,
        }));
        if report.rows_error == 0 {
            logger.info(&message, details).await?;
        } else {
            logger.warning(&message, details).await?;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::staging::{CustomerFields, StagedFields, StagingRow};
    use crate::domain::types::EntityType;
    use crate::importer::dq_validator::DqValidator;
    use crate::repository::SqliteImportStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct NeverCancel;

    #[async_trait]
    impl CancellationProbe for NeverCancel {
        async fn is_cancelled(&self, _batch_id: &str) -> ImportResult<bool> {
            Ok(false)
        }
    }

    struct AlwaysCancel;

    #[async_trait]
    impl CancellationProbe for AlwaysCancel {
        async fn is_cancelled(&self, _batch_id: &str) -> ImportResult<bool> {
            Ok(true)
        }
    }

    async fn seed(store: &SqliteImportStore, names: &[&str]) -> ImportBatch {
        let batch = ImportBatch::new(
            "b1".to_string(),
            "IMP-20250101-0001".to_string(),
            EntityType::Customers,
            "customers.csv".to_string(),
            64,
            "tester".to_string(),
        );
        store.insert_batch(&batch).await.unwrap();

        for (idx, name) in names.iter().enumerate() {
            let row = StagingRow {
                id: format!("row-{}", idx + 1),
                batch_id: "b1".to_string(),
                row_number: (idx + 1) as i64,
                raw_data: HashMap::new(),
                fields: StagedFields::Customers(CustomerFields {
                    name: if name.is_empty() { None } else { Some(name.to_string()) },
                    ..Default::default()
                }),
                validation_status: ValidationStatus::Pending,
                validation_errors: Vec::new(),
                imported_record_id: None,
            };
            store.insert_staging_row(&row).await.unwrap();
        }
        batch
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = SqliteImportStore::in_memory().unwrap();
        let batch = seed(&store, &["Acme", "", "Beta"]).await;
        let settings = ImportSettings::default();
        let runner = ValidationRunner::new(&store, &DqValidator, &NeverCancel, &settings);

        let first = runner.run(&batch).await.unwrap();
        let snapshot_a = store
            .list_staging_rows(EntityType::Customers, "b1", None, None, 0)
            .await
            .unwrap();
        let second = runner.run(&batch).await.unwrap();
        let snapshot_b = store
            .list_staging_rows(EntityType::Customers, "b1", None, None, 0)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.rows_error, 1);
        for (a, b) in snapshot_a.iter().zip(snapshot_b.iter()) {
            assert_eq!(a.validation_status, b.validation_status);
            assert_eq!(a.validation_errors, b.validation_errors);
        }

        let stored = store.find_batch("b1").await.unwrap().unwrap();
        assert_eq!(stored.validated_rows, 2);
        assert!(stored.validated_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_at_checkpoint() {
        let store = SqliteImportStore::in_memory().unwrap();
        let names: Vec<String> = (0..5).map(|i| format!("Customer {}", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let batch = seed(&store, &refs).await;

        let settings = ImportSettings {
            validation_checkpoint_rows: 2,
            ..ImportSettings::default()
        };
        let runner = ValidationRunner::new(&store, &DqValidator, &AlwaysCancel, &settings);
        let err = runner.run(&batch).await.unwrap_err();
        match err {
            ImportError::Cancelled { processed, .. } => assert_eq!(processed, 2),
            other => panic!("unexpected error: {:?}", other),
        }

        let pending = store
            .count_staging_rows(EntityType::Customers, "b1", Some(ValidationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending, 3);
    }
}
