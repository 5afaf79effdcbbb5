// ==========================================
// 现场服务管理系统 - 导入批次领域模型
// ==========================================
// 对齐: v0.1_import_schema.sql import_batch 表
// 红线: 计数器在单次运行内单调不减; 控制标记只写 true 不复位
// ==========================================

use crate::domain::types::{EntityType, ImportPhase, LegacyStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportBatch - 导入批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    // ===== 标识 =====
    pub batch_id: String,     // 批次 ID（UUID）
    pub batch_number: String, // 可读批次号（IMP-YYYYMMDD-NNNN）

    // ===== 分类 =====
    pub entity_type: EntityType,

    // ===== 源文件描述 =====
    pub file_name: String,
    pub file_size: i64,           // 字节数
    pub encoding: Option<String>, // 探测到的编码

    // ===== 生命周期 =====
    pub phase: ImportPhase,

    // ===== 计数器 =====
    pub rows_total: i64,     // 暂存行数（不含跳过行）
    pub rows_skipped: i64,   // 导入时被跳过的行（汇总行/空行）
    pub rows_valid: i64,     // 最近一次校验的有效行数
    pub rows_error: i64,     // 最近一次校验的错误行数
    pub rows_imported: i64,  // created + updated
    pub validated_rows: i64, // 校验进度（已访问且有效）
    pub committed_rows: i64, // 提交进度（created + updated 累计）

    // ===== 控制标记 =====
    pub is_cancel_requested: bool,
    pub is_rollback_requested: bool,

    // ===== 能力标记 =====
    pub supports_rollback: bool,

    // ===== 审计字段 =====
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub validated_at: Option<DateTime<Utc>>, // 最近一次校验完成时间
    pub completed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,

    // ===== 错误面 =====
    pub last_error_message: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub error_summary: Option<String>,

    // ===== 提交汇总 =====
    pub commit_summary: Option<CommitSummary>,
}

impl ImportBatch {
    /// 创建处于 uploading 阶段的新批次
    pub fn new(
        batch_id: String,
        batch_number: String,
        entity_type: EntityType,
        file_name: String,
        file_size: i64,
        created_by: String,
    ) -> Self {
        Self {
            batch_id,
            batch_number,
            entity_type,
            file_name,
            file_size,
            encoding: None,
            phase: ImportPhase::Uploading,
            rows_total: 0,
            rows_skipped: 0,
            rows_valid: 0,
            rows_error: 0,
            rows_imported: 0,
            validated_rows: 0,
            committed_rows: 0,
            is_cancel_requested: false,
            is_rollback_requested: false,
            supports_rollback: entity_type.supports_rollback(),
            created_by,
            created_at: Utc::now(),
            started_at: None,
            validated_at: None,
            completed_at: None,
            rolled_back_at: None,
            last_error_message: None,
            last_error_at: None,
            error_summary: None,
            commit_summary: None,
        }
    }

    pub fn status(&self) -> LegacyStatus {
        self.phase.legacy_status()
    }

    /// 校验已结束且存在错误行（仍可提交有效行）
    pub fn is_validated_with_errors(&self) -> bool {
        self.phase == ImportPhase::Validating && self.validated_at.is_some() && self.rows_error > 0
    }

    /// 进度百分比（0-100）
    pub fn progress_percentage(&self) -> f64 {
        fn ratio(done: i64, total: i64) -> f64 {
            if total <= 0 {
                return 0.0;
            }
            ((done as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
        }

        match self.phase {
            ImportPhase::Uploading | ImportPhase::Mapping => 0.0,
            ImportPhase::Validating if self.validated_at.is_some() => 100.0,
            ImportPhase::Validating => ratio(self.validated_rows, self.rows_total),
            ImportPhase::ReadyToCommit => 100.0,
            ImportPhase::Committing => ratio(self.committed_rows, self.rows_valid),
            ImportPhase::Completed | ImportPhase::RolledBack => 100.0,
            ImportPhase::Failed | ImportPhase::Cancelled => {
                if self.rows_valid > 0 && self.committed_rows > 0 {
                    ratio(self.committed_rows, self.rows_valid)
                } else {
                    ratio(self.validated_rows, self.rows_total)
                }
            }
        }
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            batch_id: self.batch_id.clone(),
            batch_number: self.batch_number.clone(),
            entity_type: self.entity_type,
            phase: self.phase,
            status: self.status(),
            rows_total: self.rows_total,
            validated_rows: self.validated_rows,
            error_rows: self.rows_error,
            committed_rows: self.committed_rows,
            progress_percentage: self.progress_percentage(),
            last_error: self.last_error_message.clone(),
            validation_complete: self.validated_at.is_some(),
        }
    }
}

// ==========================================
// BatchProgress - 批次进度视图（对外契约）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    pub batch_id: String,
    pub batch_number: String,
    pub entity_type: EntityType,
    pub phase: ImportPhase,
    pub status: LegacyStatus,
    pub rows_total: i64,
    pub validated_rows: i64,
    pub error_rows: i64,
    pub committed_rows: i64,
    pub progress_percentage: f64,
    pub last_error: Option<String>,
    pub validation_complete: bool,
}

// ==========================================
// CommitSummary - 提交汇总
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub created: i64,
    pub updated: i64,
    pub skipped: i64,
    pub errors: i64,
}

impl CommitSummary {
    pub fn imported(&self) -> i64 {
        self.created + self.updated
    }

    pub fn processed(&self) -> i64 {
        self.created + self.updated + self.skipped + self.errors
    }
}

// ==========================================
// PhaseTransition - 阶段迁移请求（CAS 语义）
// ==========================================
// 仅当批次当前阶段 ∈ from 时才生效
#[derive(Debug, Clone)]
pub struct PhaseTransition {
    pub from: Vec<ImportPhase>,
    pub to: ImportPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rolled_back_at: Option<DateTime<Utc>>,
    pub error_summary: Option<String>,
    pub cancel_requested: bool,
}

impl PhaseTransition {
    pub fn new(from: &[ImportPhase], to: ImportPhase) -> Self {
        Self {
            from: from.to_vec(),
            to,
            started_at: None,
            completed_at: None,
            rolled_back_at: None,
            error_summary: None,
            cancel_requested: false,
        }
    }
}
