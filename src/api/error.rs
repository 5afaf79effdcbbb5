// ==========================================
// 现场服务管理系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换导入/仓储错误为调用方可区分的错误
// 约定: 所有错误信息必须包含显式原因（阶段、批次、字段）
// ==========================================

use crate::domain::types::ImportPhase;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 操作与批次当前阶段不匹配
    #[error("阶段不匹配: 操作 {action} 不允许在阶段 {phase} 执行")]
    PhaseMismatch { action: String, phase: ImportPhase },

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 控制流
    // ==========================================
    #[error("操作已取消: {0}")]
    Cancelled(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) | RepositoryError::InternalError(msg) => {
                ApiError::InternalError(msg)
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::InvalidPhase { action, phase } => ApiError::PhaseMismatch { action, phase },
            ImportError::BatchNotFound(id) => ApiError::NotFound(format!("批次(id={})不存在", id)),
            ImportError::EmptyFile(_) | ImportError::FileReadError(_) => {
                ApiError::ImportError(err.to_string())
            }
            ImportError::UnknownEntityType(_) => ApiError::InvalidInput(err.to_string()),
            ImportError::RollbackNotSupported(_)
            | ImportError::LiveRecordsRemain { .. }
            | ImportError::RowCommit { .. }
            | ImportError::RowRejected(_) => ApiError::BusinessRuleViolation(err.to_string()),
            ImportError::Cancelled { .. } => ApiError::Cancelled(err.to_string()),
            ImportError::Repository(e) => e.into(),
            ImportError::Other(e) => ApiError::Other(e),
            ImportError::JsonError(_)
            | ImportError::CsvError(_)
            | ImportError::InternalError(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
