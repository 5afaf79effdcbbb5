// ==========================================
// 现场服务管理系统 - 批次事件日志
// ==========================================
// 职责: 追加写 import_batch_log，并同步输出到 tracing
// 红线: 事件只追加，不修改；仅随批次整体删除
// ==========================================

use crate::domain::event::BatchLogEvent;
use crate::domain::types::LogLevel;
use crate::importer::error::ImportResult;
use crate::repository::import_store::{BatchLogRepository, BatchRepository};
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

// ==========================================
// BatchEventLogger - 单批次事件写入器
// ==========================================
pub struct BatchEventLogger<'a, S>
where
    S: BatchRepository + BatchLogRepository + ?Sized,
{
    store: &'a S,
    batch_id: String,
}

impl<'a, S> BatchEventLogger<'a, S>
where
    S: BatchRepository + BatchLogRepository + ?Sized,
{
    pub fn new(store: &'a S, batch_id: &str) -> Self {
        Self {
            store,
            batch_id: batch_id.to_string(),
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub async fn info(&self, message: &str, details: Option<Value>) -> ImportResult<()> {
        self.append(LogLevel::Info, message, details).await
    }

    pub async fn warning(&self, message: &str, details: Option<Value>) -> ImportResult<()> {
        self.append(LogLevel::Warning, message, details).await
    }

    /// 写入 error 事件，并刷新批次的 last_error_message / last_error_at
    pub async fn error(&self, message: &str, details: Option<Value>) -> ImportResult<()> {
        let now = Utc::now();
        self.append(LogLevel::Error, message, details).await?;
        self.store.record_error(&self.batch_id, message, now).await?;
        Ok(())
    }

    async fn append(
        &self,
        level: LogLevel,
        message: &str,
        details: Option<Value>,
    ) -> ImportResult<()> {
        match level {
            LogLevel::Info => info!(batch_id = %self.batch_id, details = ?details, "{}", message),
            LogLevel::Warning => warn!(batch_id = %self.batch_id, details = ?details, "{}", message),
            LogLevel::Error => error!(batch_id = %self.batch_id, details = ?details, "{}", message),
        }

        let event = BatchLogEvent {
            id: Uuid::new_v4().to_string(),
            batch_id: self.batch_id.clone(),
            level,
            message: message.to_string(),
            details,
            created_at: Utc::now(),
        };
        self.store.append_event(&event).await?;
        Ok(())
    }
}
