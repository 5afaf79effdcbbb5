// ==========================================
// 现场服务管理系统 - 回滚引擎
// ==========================================
// 职责: 补偿删除已完成批次新建的业务记录
// 前置: phase = completed 且 supports_rollback
// 红线: 删除前必须通过依赖安全性判定; 不可删记录保留并记 skipped
// 红线: 部分回滚仍是成功终态; 回滚过程抛出异常时批次保持 completed
// ==========================================

use crate::domain::batch::ImportBatch;
use crate::domain::event::{RollbackLogEntry, RollbackResult, SkippedRecord};
use crate::domain::types::{EntityType, ImportPhase, RollbackAction};
use crate::engine::batch_state::BatchStateMachine;
use crate::engine::event_log::BatchEventLogger;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::import_store::ImportStore;
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 回滚候选记录
struct Candidate {
    id: String,
    label: String,
}

pub struct RollbackEngine<'a, S>
where
    S: ImportStore + ?Sized,
{
    store: &'a S,
}

impl<'a, S> RollbackEngine<'a, S>
where
    S: ImportStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// 回滚批次
    ///
    /// # 返回
    /// - Ok(RollbackResult): success = true，含删除/跳过明细
    /// - Err(InvalidPhase / RollbackNotSupported): 前置条件不满足
    #[instrument(skip(self))]
    pub async fn rollback(&self, batch_id: &str) -> ImportResult<RollbackResult> {
        let machine = BatchStateMachine::new(self.store);
        let batch = machine.load(batch_id).await?;

        if batch.phase != ImportPhase::Completed {
            return Err(ImportError::invalid_phase("rollback", batch.phase));
        }
        if !batch.supports_rollback {
            return Err(ImportError::RollbackNotSupported(batch.entity_type));
        }

        let logger = BatchEventLogger::new(self.store, batch_id);
        self.store.mark_rollback_requested(batch_id).await?;
        logger.info("开始回滚", None).await?;

        let result = match self.compensate(&batch).await {
            Ok(result) => result,
            Err(e) => {
                logger
                    .error(&format!("回滚失败，批次保持 completed: {}", e), None)
                    .await?;
                return Err(e);
            }
        };

        machine.mark_rolled_back(batch_id).await?;

        let message = format!("回滚完成: 删除 {} 条, 跳过 {} 条", result.deleted, result.skipped);
        let details = Some(json!({ "deleted": result.deleted, "skipped": result.skipped }));
        if result.skipped == 0 {
            logger.info(&message, details).await?;
        } else {
            logger.warning(&message, details).await?;
        }

        Ok(result)
    }

    /// 遍历本批次新建的记录并逐条判定、删除
    async fn compensate(&self, batch: &ImportBatch) -> ImportResult<RollbackResult> {
        let entity_type = batch.entity_type;
        let candidates: Vec<Candidate> = match entity_type {
            EntityType::Customers => self
                .store
                .list_batch_customers(&batch.batch_id)
                .await?
                .into_iter()
                .map(|c| Candidate {
                    label: format!("客户 {}", c.name),
                    id: c.id,
                })
                .collect(),
            EntityType::Ar => self
                .store
                .list_batch_invoices(&batch.batch_id)
                .await?
                .into_iter()
                .map(|i| Candidate {
                    label: format!("发票 {}", i.invoice_number),
                    id: i.id,
                })
                .collect(),
            other => return Err(ImportError::RollbackNotSupported(other)),
        };

        let mut result = RollbackResult {
            success: true,
            ..Default::default()
        };

        for candidate in candidates {
            let check = match entity_type {
                EntityType::Customers => self.store.can_delete_customer(&candidate.id).await?,
                _ => self.store.can_delete_invoice(&candidate.id).await?,
            };

            let skip_reason = if check.allowed {
                let deleted = match entity_type {
                    EntityType::Customers => self.store.delete_customer_cascade(&candidate.id).await,
                    _ => self.store.delete_invoice_cascade(&candidate.id).await,
                };
                match deleted {
                    Ok(()) => None,
                    Err(e) => Some(format!("{} 删除失败: {}", candidate.label, e)),
                }
            } else {
                Some(format!(
                    "{} 无法删除: {}",
                    candidate.label,
                    check.reason.unwrap_or_default()
                ))
            };

            let (action, reason) = match skip_reason {
                None => {
                    info!(entity_id = %candidate.id, "{} 已删除", candidate.label);
                    result.deleted += 1;
                    (RollbackAction::Deleted, None)
                }
                Some(reason) => {
                    warn!(entity_id = %candidate.id, reason = %reason, "回滚跳过");
                    result.skipped += 1;
                    result.skipped_records.push(SkippedRecord {
                        entity_type,
                        entity_id: candidate.id.clone(),
                        label: candidate.label.clone(),
                        reason: reason.clone(),
                    });
                    (RollbackAction::Skipped, Some(reason))
                }
            };

            self.store
                .append_rollback_entry(&RollbackLogEntry {
                    id: Uuid::new_v4().to_string(),
                    batch_id: batch.batch_id.clone(),
                    entity_type,
                    entity_id: candidate.id,
                    action,
                    reason,
                    created_at: Utc::now(),
                })
                .await?;
        }

        Ok(result)
    }
}
