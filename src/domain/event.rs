// ==========================================
// 现场服务管理系统 - 批次事件与回滚日志
// ==========================================
// 红线: 两类日志均为追加写，仅随批次整体删除
// ==========================================

use crate::domain::types::{EntityType, LogLevel, RollbackAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BatchLogEvent - 批次事件
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLogEvent {
    pub id: String,
    pub batch_id: String,
    pub level: LogLevel,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// RollbackLogEntry - 补偿删除记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackLogEntry {
    pub id: String,
    pub batch_id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: RollbackAction,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// RollbackResult - 回滚汇总
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackResult {
    pub success: bool,
    pub deleted: usize,
    pub skipped: usize,
    pub skipped_records: Vec<SkippedRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub label: String,
    pub reason: String,
}
