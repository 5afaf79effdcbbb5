// ==========================================
// 现场服务管理系统 - 导入领域类型定义
// ==========================================
// 职责: 实体类型 / 批次阶段 / 校验状态 / 日志级别
// 红线: phase 为唯一状态源, status 只能由 phase 派生
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 导入实体类型 (Entity Type)
// ==========================================
// 序列化格式: 小写 (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Customers, // 客户
    Ar,        // 应收账款（期初发票）
    Vendors,   // 供应商
    Items,     // 配件/库存
    History,   // 历史单据（发票/收款/工单）
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Customers,
        EntityType::Ar,
        EntityType::Vendors,
        EntityType::Items,
        EntityType::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Customers => "customers",
            EntityType::Ar => "ar",
            EntityType::Vendors => "vendors",
            EntityType::Items => "items",
            EntityType::History => "history",
        }
    }

    /// 暂存表名（静态字符串，可安全拼接进 SQL）
    pub fn staging_table(&self) -> &'static str {
        match self {
            EntityType::Customers => "import_staging_customers",
            EntityType::Ar => "import_staging_ar",
            EntityType::Vendors => "import_staging_vendors",
            EntityType::Items => "import_staging_items",
            EntityType::History => "import_staging_history",
        }
    }

    /// 是否存在补偿删除路径
    pub fn supports_rollback(&self) -> bool {
        matches!(self, EntityType::Customers | EntityType::Ar)
    }

    /// 目标字段目录（映射器与暂存共用）
    pub fn target_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::Customers => &[
                "name",
                "email",
                "phone",
                "address",
                "city",
                "state",
                "postal_code",
                "external_customer_id",
                "notes",
            ],
            EntityType::Ar => &[
                "invoice_number",
                "customer_identifier",
                "customer_name",
                "issue_date",
                "due_date",
                "total_amount",
                "balance_due",
                "description",
            ],
            EntityType::Vendors => &[
                "name",
                "email",
                "phone",
                "address",
                "city",
                "state",
                "postal_code",
                "vendor_code",
                "external_vendor_id",
            ],
            EntityType::Items => &[
                "sku",
                "name",
                "description",
                "category",
                "unit_cost",
                "unit_price",
                "quantity_on_hand",
            ],
            EntityType::History => &[
                "record_type",
                "customer_identifier",
                "customer_name",
                "document_number",
                "document_date",
                "amount",
                "description",
            ],
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "customers" => Ok(EntityType::Customers),
            "ar" => Ok(EntityType::Ar),
            "vendors" => Ok(EntityType::Vendors),
            "items" => Ok(EntityType::Items),
            "history" => Ok(EntityType::History),
            other => Err(format!("未知的导入实体类型: {}", other)),
        }
    }
}

// ==========================================
// 批次阶段 (Import Phase)
// ==========================================
// 主路径: uploading → mapping → validating → ready_to_commit → committing → completed
// 旁路: cancelled / failed（任意非终态可达）, rolled_back（仅 completed 可达）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Uploading,
    Mapping,
    Validating,
    ReadyToCommit,
    Committing,
    Completed,
    Failed,
    Cancelled,
    RolledBack,
}

impl ImportPhase {
    /// 可取消的进行中阶段
    pub const IN_PROGRESS: [ImportPhase; 5] = [
        ImportPhase::Uploading,
        ImportPhase::Mapping,
        ImportPhase::Validating,
        ImportPhase::ReadyToCommit,
        ImportPhase::Committing,
    ];

    /// 允许删除批次的阶段（completed 必须先回滚）
    pub const DELETABLE: [ImportPhase; 4] = [
        ImportPhase::Cancelled,
        ImportPhase::Failed,
        ImportPhase::RolledBack,
        ImportPhase::ReadyToCommit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportPhase::Uploading => "uploading",
            ImportPhase::Mapping => "mapping",
            ImportPhase::Validating => "validating",
            ImportPhase::ReadyToCommit => "ready_to_commit",
            ImportPhase::Committing => "committing",
            ImportPhase::Completed => "completed",
            ImportPhase::Failed => "failed",
            ImportPhase::Cancelled => "cancelled",
            ImportPhase::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportPhase::Completed
                | ImportPhase::Failed
                | ImportPhase::Cancelled
                | ImportPhase::RolledBack
        )
    }

    /// 状态机合法迁移表
    pub fn can_transition_to(&self, next: ImportPhase) -> bool {
        use ImportPhase::*;
        match (self, next) {
            (Uploading, Mapping) => true,
            (Mapping, Validating) => true,
            (Validating, Validating) => true,
            (Validating, ReadyToCommit) => true,
            // 重新校验会回到 validating
            (ReadyToCommit, Validating) => true,
            (Validating, Committing) | (ReadyToCommit, Committing) => true,
            (Committing, Completed) => true,
            (Completed, RolledBack) => true,
            (from, Cancelled) | (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// 派生兼容旧版的粗粒度 status
    pub fn legacy_status(&self) -> LegacyStatus {
        match self {
            ImportPhase::Uploading | ImportPhase::Mapping => LegacyStatus::Pending,
            ImportPhase::Validating => LegacyStatus::Validating,
            ImportPhase::ReadyToCommit => LegacyStatus::Validated,
            ImportPhase::Committing => LegacyStatus::Importing,
            ImportPhase::Completed => LegacyStatus::Completed,
            ImportPhase::Failed | ImportPhase::Cancelled => LegacyStatus::Failed,
            ImportPhase::RolledBack => LegacyStatus::RolledBack,
        }
    }
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImportPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(ImportPhase::Uploading),
            "mapping" => Ok(ImportPhase::Mapping),
            "validating" => Ok(ImportPhase::Validating),
            "ready_to_commit" => Ok(ImportPhase::ReadyToCommit),
            "committing" => Ok(ImportPhase::Committing),
            "completed" => Ok(ImportPhase::Completed),
            "failed" => Ok(ImportPhase::Failed),
            "cancelled" => Ok(ImportPhase::Cancelled),
            "rolled_back" => Ok(ImportPhase::RolledBack),
            other => Err(format!("未知的批次阶段: {}", other)),
        }
    }
}

// ==========================================
// 兼容状态 (Legacy Status)
// ==========================================
// 仅在边界处由 phase 派生，不落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyStatus {
    Pending,
    Validating,
    Validated,
    Importing,
    Completed,
    Failed,
    RolledBack,
}

impl fmt::Display for LegacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LegacyStatus::Pending => "pending",
            LegacyStatus::Validating => "validating",
            LegacyStatus::Validated => "validated",
            LegacyStatus::Importing => "importing",
            LegacyStatus::Completed => "completed",
            LegacyStatus::Failed => "failed",
            LegacyStatus::RolledBack => "rolled_back",
        };
        write!(f, "{}", s)
    }
}

// ==========================================
// 暂存行校验状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pending,
    Valid,
    Error,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Valid => "valid",
            ValidationStatus::Error => "error",
        }
    }
}

impl FromStr for ValidationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ValidationStatus::Pending),
            "valid" => Ok(ValidationStatus::Valid),
            "error" => Ok(ValidationStatus::Error),
            other => Err(format!("未知的校验状态: {}", other)),
        }
    }
}

// ==========================================
// 批次日志级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(LogLevel::Info),
            "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("未知的日志级别: {}", other)),
        }
    }
}

// ==========================================
// 回滚动作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackAction {
    Deleted,
    Skipped,
}

impl RollbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackAction::Deleted => "deleted",
            RollbackAction::Skipped => "skipped",
        }
    }
}

impl FromStr for RollbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deleted" => Ok(RollbackAction::Deleted),
            "skipped" => Ok(RollbackAction::Skipped),
            other => Err(format!("未知的回滚动作: {}", other)),
        }
    }
}

// ==========================================
// 历史单据类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRecordType {
    Invoice,
    Payment,
    Ticket,
}

impl HistoryRecordType {
    /// 大小写不敏感解析
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "invoice" => Some(HistoryRecordType::Invoice),
            "payment" => Some(HistoryRecordType::Payment),
            "ticket" => Some(HistoryRecordType::Ticket),
            _ => None,
        }
    }
}
