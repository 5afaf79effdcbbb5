// ==========================================
// 现场服务管理系统 - 批次删除
// ==========================================
// 允许阶段: cancelled / failed / rolled_back / ready_to_commit
// 红线: completed 必须先回滚; 删除前复核无残留业务记录（提交中途取消/失败的批次也可能已写入）
// 顺序: 暂存行 → 事件 → 回滚日志 → 批次（子先于父）
// ==========================================

use crate::domain::types::ImportPhase;
use crate::engine::batch_state::BatchStateMachine;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::import_store::ImportStore;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// 删除明细
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownReport {
    pub staging_rows: usize,
    pub events: usize,
    pub rollback_entries: usize,
}

pub struct BatchTeardown<'a, S>
where
    S: ImportStore + ?Sized,
{
    store: &'a S,
}

impl<'a, S> BatchTeardown<'a, S>
where
    S: ImportStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, batch_id: &str) -> ImportResult<TeardownReport> {
        let batch = BatchStateMachine::new(self.store).load(batch_id).await?;

        if !ImportPhase::DELETABLE.contains(&batch.phase) {
            return Err(ImportError::invalid_phase("delete", batch.phase));
        }

        let remaining = self.store.count_live_records(batch_id).await?;
        if !remaining.is_empty() {
            return Err(ImportError::LiveRecordsRemain {
                customers: remaining.customers,
                invoices: remaining.invoices,
            });
        }

        let report = TeardownReport {
            staging_rows: self
                .store
                .delete_staging_rows(batch.entity_type, batch_id)
                .await?,
            events: self.store.delete_events(batch_id).await?,
            rollback_entries: self.store.delete_rollback_entries(batch_id).await?,
        };
        self.store.delete_batch_record(batch_id).await?;

        info!(
            batch_id,
            staging_rows = report.staging_rows,
            events = report.events,
            rollback_entries = report.rollback_entries,
            "批次已删除"
        );
        Ok(report)
    }
}
