// ==========================================
// 现场服务管理系统 - 导入组件 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 流程: 解析 → 映射 → 规范化 → 暂存 → 校验 → 提交
// ==========================================

use crate::domain::staging::{FieldError, RawRow, StagedFields};
use crate::domain::types::EntityType;
use crate::importer::field_mapper::ColumnMapping;
use crate::importer::file_parser::ParsedFile;
use chrono::NaiveDate;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 原始文件字节 → 无类型行记录
// 实现者: DelimitedTextParser
pub trait FileParser: Send + Sync {
    /// 解码并解析文件
    ///
    /// # 返回
    /// - ParsedFile: 记录可能为空（调用方必须视为错误）
    fn parse_bytes(&self, bytes: &[u8]) -> ParsedFile;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 源列名 → 目标字段的自动映射建议
// 实现者: SynonymFieldMapper
pub trait FieldMapper: Send + Sync {
    /// 生成映射建议
    ///
    /// # 参数
    /// - entity_type: 目标实体
    /// - headers: 源文件列名（按文件顺序）
    ///
    /// # 返回
    /// - ColumnMapping: 未匹配的字段缺省（不填默认值）
    fn suggest_mapping(&self, entity_type: EntityType, headers: &[String]) -> ColumnMapping;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 单元格文本 → 领域值（纯函数）
// 实现者: DataCleaner
pub trait DataCleaner: Send + Sync {
    /// 货币文本 → 数值（空 → 0，无法解析 → NaN）
    fn normalize_currency(&self, value: &str) -> f64;

    /// 日期文本 → ISO 日历日期（失败 → None）
    fn normalize_date(&self, value: &str) -> Option<NaiveDate>;

    /// 判断行是否应在入库时跳过
    fn should_skip_row(&self, entity_type: EntityType, row: &RawRow) -> bool;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 暂存行 → 有序字段错误列表（空 = 有效）
// 实现者: DqValidator
pub trait RowValidator: Send + Sync {
    fn validate(&self, fields: &StagedFields) -> Vec<FieldError>;
}
