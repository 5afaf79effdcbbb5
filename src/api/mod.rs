// ==========================================
// 现场服务管理系统 - API 层
// ==========================================
// 职责: 提供导入管道的调用方接口（UI / CLI）
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{FilePreview, ImportApi, StagingRowPage};
