// ==========================================
// 现场服务管理系统 - 数据导入核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 分阶段导入管道（暂存 → 校验 → 提交 → 回滚 / 删除）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 批次/暂存行/业务实体
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 状态机与处理循环
pub mod engine;

// 导入层 - 解析/映射/清洗/校验
pub mod importer;

// 配置层 - config_kv
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 调用方接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{EntityType, ImportPhase, LegacyStatus, LogLevel, ValidationStatus};

// 领域实体
pub use domain::{
    BatchLogEvent, BatchProgress, CommitSummary, ImportBatch, RollbackLogEntry, RollbackResult,
    StagingRow,
};

// 引擎
pub use engine::{CancellationProbe, ImportPipeline, TeardownReport, ValidationReport};

// 仓储
pub use repository::{ImportStore, SqliteImportStore};

// API
pub use api::{ApiError, ApiResult, FilePreview, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "现场服务管理系统 - 数据导入";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(DB_VERSION, "v0.1");
    }
}
