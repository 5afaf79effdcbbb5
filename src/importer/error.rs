// ==========================================
// 现场服务管理系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类: 入库错误 / 阶段错误 / 取消信号 / 单行错误 / 致命错误
// 说明: 字段级校验错误挂在暂存行上，不走此类型
// ==========================================

use crate::domain::types::{EntityType, ImportPhase};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 入库错误 =====
    #[error("文件无数据行: {0}")]
    EmptyFile(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("未知的导入实体类型: {0}")]
    UnknownEntityType(String),

    // ===== 阶段/前置条件错误 =====
    #[error("批次不存在: {0}")]
    BatchNotFound(String),

    #[error("操作 {action} 不允许在当前阶段执行: phase={phase}")]
    InvalidPhase { action: String, phase: ImportPhase },

    #[error("实体类型 {0} 不支持回滚")]
    RollbackNotSupported(EntityType),

    #[error("批次仍有 {customers} 个客户 / {invoices} 张发票引用该批次，禁止删除")]
    LiveRecordsRemain { customers: i64, invoices: i64 },

    // ===== 取消信号（控制流，不是系统错误）=====
    #[error("{stage} 已取消: 停止前已处理 {processed} 行")]
    Cancelled { stage: String, processed: i64 },

    // ===== 单行提交错误 =====
    #[error("第 {row} 行提交失败: {message}")]
    RowCommit { row: i64, message: String },

    /// 单行数据无法落库（引用不存在、字段不可解析等），只影响该行
    #[error("{0}")]
    RowRejected(String),

    // ===== 数据访问 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("JSON 处理失败: {0}")]
    JsonError(String),

    #[error("CSV 写出失败: {0}")]
    CsvError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    pub fn invalid_phase(action: &str, phase: ImportPhase) -> Self {
        ImportError::InvalidPhase {
            action: action.to_string(),
            phase,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ImportError::Cancelled { .. })
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::JsonError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
