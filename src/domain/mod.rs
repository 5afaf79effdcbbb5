// ==========================================
// 现场服务管理系统 - 导入领域模型层
// ==========================================
// 职责: 批次 / 暂存行 / 业务实体 / 日志 的数据结构
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod batch;
pub mod event;
pub mod live;
pub mod staging;
pub mod types;

// 重导出核心类型
pub use batch::{BatchProgress, CommitSummary, ImportBatch, PhaseTransition};
pub use event::{BatchLogEvent, RollbackLogEntry, RollbackResult, SkippedRecord};
pub use live::{
    Customer, CustomerLocation, DeletionCheck, GlEntry, Invoice, InvoiceLineItem, Part, Ticket,
    Vendor,
};
pub use staging::{
    ArFields, CustomerFields, FieldError, HistoryFields, ItemFields, MappedRow, RawRow,
    StagedFields, StagingRow, VendorFields,
};
pub use types::{
    EntityType, HistoryRecordType, ImportPhase, LegacyStatus, LogLevel, RollbackAction,
    ValidationStatus,
};
