// ==========================================
// 现场服务管理系统 - 批次状态机
// ==========================================
// 主路径: uploading → mapping → validating → ready_to_commit → committing → completed
// 旁路: cancelled / failed（任意非终态）, rolled_back（仅 completed）
// 红线: 所有迁移走 CAS，并发取消不会被收尾循环覆盖
// ==========================================

use crate::domain::batch::{ImportBatch, PhaseTransition};
use crate::domain::types::ImportPhase;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::import_store::BatchRepository;
use chrono::Utc;
use tracing::{info, instrument, warn};

pub struct BatchStateMachine<'a, S>
where
    S: BatchRepository + ?Sized,
{
    store: &'a S,
}

impl<'a, S> BatchStateMachine<'a, S>
where
    S: BatchRepository + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// 读取批次，不存在时返回 BatchNotFound
    pub async fn load(&self, batch_id: &str) -> ImportResult<ImportBatch> {
        self.store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ImportError::BatchNotFound(batch_id.to_string()))
    }

    /// 执行一次 CAS 迁移
    ///
    /// # 返回
    /// - Err(InvalidPhase): 当前阶段不在 transition.from 中（附带实际阶段）
    #[instrument(skip(self, transition), fields(to = %transition.to))]
    pub async fn apply(
        &self,
        action: &str,
        batch_id: &str,
        transition: PhaseTransition,
    ) -> ImportResult<()> {
        if let Some(illegal) = transition
            .from
            .iter()
            .find(|from| !from.can_transition_to(transition.to))
        {
            return Err(ImportError::InternalError(format!(
                "非法阶段迁移: {} → {}",
                illegal, transition.to
            )));
        }

        if self.store.transition_phase(batch_id, &transition).await? {
            info!(batch_id, action, to = %transition.to, "批次阶段迁移");
            return Ok(());
        }

        let current = self.load(batch_id).await?;
        warn!(batch_id, action, phase = %current.phase, "阶段不匹配，迁移未生效");
        Err(ImportError::invalid_phase(action, current.phase))
    }

    pub async fn start_mapping(&self, batch_id: &str) -> ImportResult<()> {
        let mut t = PhaseTransition::new(&[ImportPhase::Uploading], ImportPhase::Mapping);
        t.started_at = Some(Utc::now());
        self.apply("start_mapping", batch_id, t).await
    }

    /// 进入校验（首次或重新校验）
    pub async fn start_validation(&self, batch_id: &str) -> ImportResult<()> {
        let t = PhaseTransition::new(
            &[
                ImportPhase::Mapping,
                ImportPhase::Validating,
                ImportPhase::ReadyToCommit,
            ],
            ImportPhase::Validating,
        );
        self.apply("validate", batch_id, t).await
    }

    /// 校验结束: 无错误 → ready_to_commit，否则停留在 validating（带错误可提交）
    pub async fn finish_validation(&self, batch_id: &str, rows_error: i64) -> ImportResult<ImportPhase> {
        let to = if rows_error == 0 {
            ImportPhase::ReadyToCommit
        } else {
            ImportPhase::Validating
        };
        let t = PhaseTransition::new(&[ImportPhase::Validating], to);
        self.apply("finish_validation", batch_id, t).await?;
        Ok(to)
    }

    /// 用户发起提交: ready_to_commit，或已完成校验但存在错误行的 validating
    pub async fn start_commit(&self, batch: &ImportBatch) -> ImportResult<()> {
        let allowed = match batch.phase {
            ImportPhase::ReadyToCommit => true,
            ImportPhase::Validating => batch.validated_at.is_some(),
            _ => false,
        };
        if !allowed {
            return Err(ImportError::invalid_phase("commit", batch.phase));
        }

        let t = PhaseTransition::new(&[batch.phase], ImportPhase::Committing);
        self.apply("commit", &batch.batch_id, t).await
    }

    pub async fn complete_commit(&self, batch_id: &str) -> ImportResult<()> {
        let mut t = PhaseTransition::new(&[ImportPhase::Committing], ImportPhase::Completed);
        t.completed_at = Some(Utc::now());
        self.apply("complete_commit", batch_id, t).await
    }

    /// 任意进行中阶段 → cancelled（同时置取消标记）
    pub async fn cancel(&self, batch_id: &str) -> ImportResult<()> {
        let mut t = PhaseTransition::new(&ImportPhase::IN_PROGRESS, ImportPhase::Cancelled);
        t.cancel_requested = true;
        t.completed_at = Some(Utc::now());
        self.apply("cancel", batch_id, t).await
    }

    /// 致命错误 → failed
    pub async fn fail(
        &self,
        batch_id: &str,
        from: &[ImportPhase],
        error_summary: &str,
    ) -> ImportResult<()> {
        let mut t = PhaseTransition::new(from, ImportPhase::Failed);
        t.completed_at = Some(Utc::now());
        t.error_summary = Some(error_summary.to_string());
        self.apply("fail", batch_id, t).await
    }

    pub async fn mark_rolled_back(&self, batch_id: &str) -> ImportResult<()> {
        let mut t = PhaseTransition::new(&[ImportPhase::Completed], ImportPhase::RolledBack);
        t.rolled_back_at = Some(Utc::now());
        self.apply("rollback", batch_id, t).await
    }
}
