// ==========================================
// 现场服务管理系统 - 提交器
// ==========================================
// 职责: 有效暂存行 → 正式业务记录（新增或按去重键更新）
// 红线: 只提交 validation_status = 'valid' 的行，按 row_number 顺序
// 红线: 单行失败只计数并记录，不中断提交
// 红线: 新建记录带 import_batch_id; 更新记录不改写该标记
// ==========================================

mod ar;
mod customers;
mod history;
mod items;
mod vendors;

use crate::config::ImportSettings;
use crate::domain::batch::{CommitSummary, ImportBatch};
use crate::domain::staging::{StagedFields, StagingRow};
use crate::domain::types::ValidationStatus;
use crate::engine::cancellation::{is_checkpoint, should_flush, CancellationProbe};
use crate::engine::event_log::BatchEventLogger;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::import_store::ImportStore;
use serde_json::json;
use tracing::{debug, instrument};

/// 单行提交结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Created(String),
    Updated(String),
    Skipped(String), // 跳过原因
}

/// 单行提交所需的上下文
pub(crate) struct CommitContext<'a, S>
where
    S: ImportStore + ?Sized,
{
    pub store: &'a S,
    pub batch_id: &'a str,
    pub actor: &'a str,
}

/// 必填字段（校验已保证，缺失时作为单行错误）
pub(crate) fn require<'f>(value: &'f Option<String>, field: &str) -> ImportResult<&'f str> {
    value
        .as_deref()
        .ok_or_else(|| ImportError::RowRejected(format!("必填字段为空: {}", field)))
}

pub struct Committer<'a, S>
where
    S: ImportStore + ?Sized,
{
    store: &'a S,
    probe: &'a dyn CancellationProbe,
    settings: &'a ImportSettings,
    actor: &'a str,
}

impl<'a, S> Committer<'a, S>
where
    S: ImportStore + ?Sized,
{
    pub fn new(
        store: &'a S,
        probe: &'a dyn CancellationProbe,
        settings: &'a ImportSettings,
        actor: &'a str,
    ) -> Self {
        Self {
            store,
            probe,
            settings,
            actor,
        }
    }

    /// 提交批次的全部有效行
    ///
    /// # 返回
    /// - Ok(CommitSummary): 已落库的汇总（含单行错误数）
    /// - Err(Cancelled): 检查点观察到取消标记，已提交的行保持提交
    #[instrument(skip(self, batch), fields(batch_id = %batch.batch_id, entity_type = %batch.entity_type))]
    pub async fn run(&self, batch: &ImportBatch) -> ImportResult<CommitSummary> {
        let batch_id = batch.batch_id.as_str();
        let logger = BatchEventLogger::new(self.store, batch_id);

        let rows = self
            .store
            .list_staging_rows(
                batch.entity_type,
                batch_id,
                Some(ValidationStatus::Valid),
                None,
                0,
            )
            .await?;
        let total = rows.len();
        let mut summary = CommitSummary::default();

        logger
            .info(
                &format!("开始提交: {} 行有效数据", total),
                Some(json!({ "rows_valid": total })),
            )
            .await?;

        for (idx, row) in rows.iter().enumerate() {
            if is_checkpoint(idx, self.settings.commit_checkpoint_rows)
                && self.probe.is_cancelled(batch_id).await?
            {
                self.store
                    .set_committed_rows(batch_id, summary.imported())
                    .await?;
                self.store.set_commit_summary(batch_id, &summary).await?;
                logger
                    .warning(
                        &format!("提交已取消: 停止前已处理 {} / {} 行", idx, total),
                        Some(json!({
                            "processed": idx,
                            "rows_valid": total,
                            "created": summary.created,
                            "updated": summary.updated,
                        })),
                    )
                    .await?;
                return Err(ImportError::Cancelled {
                    stage: "提交".to_string(),
                    processed: idx as i64,
                });
            }

            match self.commit_and_link(row).await {
                Ok(RowOutcome::Created(id)) => {
                    debug!(row_number = row.row_number, record_id = %id, "新建记录");
                    summary.created += 1;
                }
                Ok(RowOutcome::Updated(id)) => {
                    debug!(row_number = row.row_number, record_id = %id, "更新记录");
                    summary.updated += 1;
                }
                Ok(RowOutcome::Skipped(reason)) => {
                    debug!(row_number = row.row_number, reason = %reason, "跳过行");
                    summary.skipped += 1;
                }
                Err(e) => {
                    summary.errors += 1;
                    let failure = ImportError::RowCommit {
                        row: row.row_number,
                        message: e.to_string(),
                    };
                    logger
                        .error(
                            &failure.to_string(),
                            Some(json!({
                                "row_number": row.row_number,
                                "raw_data": row.raw_data,
                            })),
                        )
                        .await?;
                }
            }

            let visited = idx + 1;
            if should_flush(visited, total, self.settings.commit_progress_flush_rows) {
                self.store
                    .set_committed_rows(batch_id, summary.imported())
                    .await?;
            }
        }

        self.store.set_commit_summary(batch_id, &summary).await?;

        let message = format!(
            "提交完成: 新建 {} / 更新 {} / 跳过 {} / 错误 {}",
            summary.created, summary.updated, summary.skipped, summary.errors
        );
        let details = Some(serde_json::to_value(summary)?);
        if summary.errors == 0 {
            logger.info(&message, details).await?;
        } else {
            logger.warning(&message, details).await?;
        }

        Ok(summary)
    }

    /// 提交单行并回写暂存行的 imported_record_id
    async fn commit_and_link(&self, row: &StagingRow) -> ImportResult<RowOutcome> {
        let ctx = CommitContext {
            store: self.store,
            batch_id: &row.batch_id,
            actor: self.actor,
        };

        let outcome = match &row.fields {
            StagedFields::Customers(f) => customers::commit_customer(&ctx, f).await?,
            StagedFields::Ar(f) => ar::commit_invoice(&ctx, f).await?,
            StagedFields::Vendors(f) => vendors::commit_vendor(&ctx, f).await?,
            StagedFields::Items(f) => items::commit_part(&ctx, f).await?,
            StagedFields::History(f) => history::commit_history(&ctx, f).await?,
        };

        if let RowOutcome::Created(id) | RowOutcome::Updated(id) = &outcome {
            self.store
                .link_imported_record(row.entity_type(), &row.id, id)
                .await?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests;
