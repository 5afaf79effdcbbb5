// ==========================================
// 现场服务管理系统 - 导入层
// ==========================================
// 职责: 外部平面文件 → 暂存行
// 流程: 解析 → 映射 → 规范化 → 暂存 → 校验规则
// 支持: CSV / TSV / 分号分隔文本
// ==========================================

// 模块声明
pub mod data_cleaner;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod import_traits;
pub mod staging_adapter;

// 重导出核心类型
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use dq_validator::DqValidator as DqValidatorImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::{ColumnMapping, SynonymFieldMapper};
pub use file_parser::{DelimitedTextParser, Delimiter, ParsedFile, TextEncoding};
pub use staging_adapter::{StagingAdapter, StagingOutcome};

// 重导出 Trait 接口
pub use import_traits::{DataCleaner, FieldMapper, FileParser, RowValidator};
