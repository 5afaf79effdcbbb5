// ==========================================
// 现场服务管理系统 - 数据导入API
// ==========================================
// 职责: 封装导入管道的调用方契约
// 能力: 预览 / 建批 / 校验 / 提交 / 进度 / 行与日志查询 / 取消 / 回滚 / 删除 / 错误行导出
// 约定: 对不适用阶段的调用返回 PhaseMismatch，不静默忽略
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportSettings};
use crate::domain::batch::{BatchProgress, CommitSummary, ImportBatch};
use crate::domain::event::{BatchLogEvent, RollbackLogEntry, RollbackResult};
use crate::domain::staging::{RawRow, StagingRow};
use crate::domain::types::{EntityType, LogLevel, ValidationStatus};
use crate::engine::orchestrator::{CreateBatchRequest, ImportPipeline};
use crate::engine::teardown::TeardownReport;
use crate::engine::validation::ValidationReport;
use crate::importer::field_mapper::ColumnMapping;
use crate::repository::import_store::ImportStore;
use crate::repository::SqliteImportStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// 文件预览响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePreview {
    /// 探测到的编码
    pub encoding: String,
    /// 探测到的分隔符
    pub delimiter: String,
    pub headers: Vec<String>,
    /// 数据行总数
    pub total_rows: usize,
    /// 前 N 行
    pub rows: Vec<RawRow>,
    /// 自动映射建议
    pub suggested_mapping: ColumnMapping,
    /// 未匹配的目标字段
    pub unmapped_fields: Vec<String>,
}

/// 暂存行分页响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingRowPage {
    pub rows: Vec<StagingRow>,
    /// 满足过滤条件的总记录数
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// ==========================================
// ImportApi
// ==========================================
pub struct ImportApi<S>
where
    S: ImportStore + 'static,
{
    pipeline: ImportPipeline<S>,
}

impl ImportApi<SqliteImportStore> {
    /// 打开数据库并按 config_kv 加载配置
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub async fn open(db_path: &str) -> ApiResult<Self> {
        let store = Arc::new(SqliteImportStore::new(db_path)?);
        let config = ConfigManager::from_connection(store.connection())?;
        let settings = ImportSettings::load(&config).await?;
        Ok(Self::new(ImportPipeline::new(store, settings)))
    }
}

impl<S> ImportApi<S>
where
    S: ImportStore + 'static,
{
    pub fn new(pipeline: ImportPipeline<S>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &ImportPipeline<S> {
        &self.pipeline
    }

    // ==========================================
    // 预览 / 建批
    // ==========================================

    /// 解析文件并给出映射建议，不创建批次
    ///
    /// # 参数
    /// - limit: 预览行数（None = preview_page_limit，超过 preview_page_max 截断）
    pub fn preview_file(
        &self,
        entity_type: EntityType,
        content: &[u8],
        limit: Option<i64>,
    ) -> ApiResult<FilePreview> {
        let parsed = self.pipeline.parse(content);
        if parsed.is_empty() {
            return Err(ApiError::ImportError("文件无数据行".to_string()));
        }

        let limit = self.pipeline.settings().clamp_page_size(limit) as usize;
        let mapping = self.pipeline.suggest_mapping(entity_type, &parsed.headers);
        let unmapped_fields = mapping
            .unmapped_fields(entity_type)
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(FilePreview {
            encoding: parsed.encoding.label().to_string(),
            delimiter: parsed.delimiter.to_string(),
            total_rows: parsed.records.len(),
            rows: parsed.records.iter().take(limit).cloned().collect(),
            headers: parsed.headers,
            suggested_mapping: mapping,
            unmapped_fields,
        })
    }

    #[instrument(skip(self, content, mapping_overrides))]
    pub async fn create_batch(
        &self,
        entity_type: &str,
        file_name: &str,
        content: Vec<u8>,
        mapping_overrides: BTreeMap<String, String>,
        actor: Option<String>,
    ) -> ApiResult<ImportBatch> {
        let entity_type = entity_type
            .parse::<EntityType>()
            .map_err(ApiError::InvalidInput)?;
        if file_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件名不能为空".to_string()));
        }

        let request = CreateBatchRequest {
            entity_type,
            file_name: file_name.to_string(),
            content,
            mapping_overrides,
            actor,
        };
        Ok(self.pipeline.create_batch(request).await?)
    }

    // ==========================================
    // 校验 / 提交
    // ==========================================

    pub async fn validate_batch(&self, batch_id: &str) -> ApiResult<ValidationReport> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.validate(batch_id).await?)
    }

    pub async fn commit_batch(&self, batch_id: &str, actor: Option<&str>) -> ApiResult<CommitSummary> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.commit(batch_id, actor).await?)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub async fn get_batch(&self, batch_id: &str) -> ApiResult<ImportBatch> {
        require_batch_id(batch_id)?;
        self.pipeline
            .store()
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("批次(id={})不存在", batch_id)))
    }

    pub async fn get_progress(&self, batch_id: &str) -> ApiResult<BatchProgress> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.progress(batch_id).await?)
    }

    /// 批次列表（按创建时间倒序）
    pub async fn list_batches(&self, limit: Option<i64>, offset: i64) -> ApiResult<Vec<ImportBatch>> {
        let limit = self.pipeline.settings().clamp_page_size(limit);
        Ok(self
            .pipeline
            .store()
            .list_batches(limit, offset.max(0))
            .await?)
    }

    /// 暂存行分页（预览/错误行）
    pub async fn list_rows(
        &self,
        batch_id: &str,
        status: Option<ValidationStatus>,
        limit: Option<i64>,
        offset: i64,
    ) -> ApiResult<StagingRowPage> {
        let batch = self.get_batch(batch_id).await?;
        let limit = self.pipeline.settings().clamp_page_size(limit);
        let offset = offset.max(0);
        let store = self.pipeline.store();

        let rows = store
            .list_staging_rows(batch.entity_type, batch_id, status, Some(limit), offset)
            .await?;
        let total = store
            .count_staging_rows(batch.entity_type, batch_id, status)
            .await?;

        Ok(StagingRowPage {
            rows,
            total,
            limit,
            offset,
        })
    }

    pub async fn list_logs(
        &self,
        batch_id: &str,
        level: Option<LogLevel>,
    ) -> ApiResult<Vec<BatchLogEvent>> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.store().list_events(batch_id, level).await?)
    }

    pub async fn list_rollback_log(&self, batch_id: &str) -> ApiResult<Vec<RollbackLogEntry>> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.store().list_rollback_entries(batch_id).await?)
    }

    // ==========================================
    // 取消 / 回滚 / 删除
    // ==========================================

    pub async fn cancel(&self, batch_id: &str) -> ApiResult<BatchProgress> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.cancel(batch_id).await?.progress())
    }

    pub async fn rollback(&self, batch_id: &str) -> ApiResult<RollbackResult> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.rollback(batch_id).await?)
    }

    pub async fn delete(&self, batch_id: &str) -> ApiResult<TeardownReport> {
        require_batch_id(batch_id)?;
        Ok(self.pipeline.delete(batch_id).await?)
    }

    // ==========================================
    // 错误行导出
    // ==========================================

    /// 导出错误行为 CSV: row_number, field, message, raw_data(JSON)
    pub async fn export_error_rows_csv(&self, batch_id: &str) -> ApiResult<String> {
        let batch = self.get_batch(batch_id).await?;
        let rows = self
            .pipeline
            .store()
            .list_staging_rows(
                batch.entity_type,
                batch_id,
                Some(ValidationStatus::Error),
                None,
                0,
            )
            .await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["row_number", "field", "message", "raw_data"])
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        for row in &rows {
            let raw: BTreeMap<&String, &String> = row.raw_data.iter().collect();
            let raw_json =
                serde_json::to_string(&raw).map_err(|e| ApiError::InternalError(e.to_string()))?;
            let row_number = row.row_number.to_string();
            for error in &row.validation_errors {
                writer
                    .write_record([
                        row_number.as_str(),
                        error.field.as_str(),
                        error.message.as_str(),
                        raw_json.as_str(),
                    ])
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;
            }
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ApiError::InternalError(e.to_string()))
    }
}

fn require_batch_id(batch_id: &str) -> ApiResult<()> {
    if batch_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("batch_id 不能为空".to_string()));
    }
    Ok(())
}
