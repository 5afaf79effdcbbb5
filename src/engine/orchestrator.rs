// ==========================================
// 现场服务管理系统 - 导入管道编排器
// ==========================================
// 用途: 协调 解析 → 映射 → 暂存 → 校验 → 提交 → 回滚/删除 的执行顺序
// 模型: 每批次单一逻辑工作者; 多批次可并发运行（按 batch_id 分区）
// 红线: 取消信号由编排器统一转换为 cancelled 阶段
// 红线: 提交阶段逃逸的异常 → failed，并写入 error_summary
// ==========================================

use crate::config::ImportSettings;
use crate::domain::batch::{BatchProgress, CommitSummary, ImportBatch};
use crate::domain::event::RollbackResult;
use crate::domain::types::{EntityType, ImportPhase};
use crate::engine::batch_state::BatchStateMachine;
use crate::engine::cancellation::{CancellationProbe, StoreCancelProbe};
use crate::engine::committer::Committer;
use crate::engine::event_log::BatchEventLogger;
use crate::engine::rollback::RollbackEngine;
use crate::engine::teardown::{BatchTeardown, TeardownReport};
use crate::engine::validation::{ValidationReport, ValidationRunner};
use crate::importer::data_cleaner::DataCleaner as SkipRowCleaner;
use crate::importer::dq_validator::DqValidator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{ColumnMapping, SynonymFieldMapper};
use crate::importer::file_parser::{DelimitedTextParser, ParsedFile};
use crate::importer::import_traits::{DataCleaner, FieldMapper, FileParser, RowValidator};
use crate::importer::staging_adapter::StagingAdapter;
use crate::repository::error::RepositoryError;
use crate::repository::import_store::ImportStore;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 批次号冲突时的最大重试次数（删除批次后日序号可能回落）
const BATCH_NUMBER_ATTEMPTS: i64 = 5;

// ==========================================
// CreateBatchRequest - 建批请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub entity_type: EntityType,
    pub file_name: String,
    #[serde(skip)]
    pub content: Vec<u8>,
    /// 用户对自动映射的覆写（目标字段 → 源列名，空值 = 取消映射）
    #[serde(default)]
    pub mapping_overrides: BTreeMap<String, String>,
    pub actor: Option<String>,
}

/// 生成可读批次号 IMP-YYYYMMDD-NNNN
pub fn format_batch_number(day: NaiveDate, sequence: i64) -> String {
    format!("IMP-{}-{:04}", day.format("%Y%m%d"), sequence)
}

// ==========================================
// ImportPipeline - 导入管道
// ==========================================
pub struct ImportPipeline<S>
where
    S: ImportStore + 'static,
{
    store: Arc<S>,
    settings: ImportSettings,

    // 导入组件
    parser: Box<dyn FileParser>,
    mapper: Box<dyn FieldMapper>,
    cleaner: Box<dyn DataCleaner>,
    validator: Box<dyn RowValidator>,

    // 取消探针
    probe: Arc<dyn CancellationProbe>,
}

impl<S> ImportPipeline<S>
where
    S: ImportStore + 'static,
{
    /// 使用默认组件创建管道
    ///
    /// # 参数
    /// - store: 数据访问层
    /// - settings: 配置快照
    pub fn new(store: Arc<S>, settings: ImportSettings) -> Self {
        let probe: Arc<dyn CancellationProbe> = Arc::new(StoreCancelProbe::new(Arc::clone(&store)));
        Self {
            store,
            settings,
            parser: Box::new(DelimitedTextParser),
            mapper: Box::new(SynonymFieldMapper),
            cleaner: Box::new(SkipRowCleaner),
            validator: Box::new(DqValidator),
            probe,
        }
    }

    /// 替换取消探针
    pub fn with_cancel_probe(mut self, probe: Arc<dyn CancellationProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// 替换导入组件
    pub fn with_components(
        mut self,
        parser: Box<dyn FileParser>,
        mapper: Box<dyn FieldMapper>,
        cleaner: Box<dyn DataCleaner>,
        validator: Box<dyn RowValidator>,
    ) -> Self {
        self.parser = parser;
        self.mapper = mapper;
        self.cleaner = cleaner;
        self.validator = validator;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    // ==========================================
    // 预览（不建批）
    // ==========================================

    pub fn parse(&self, content: &[u8]) -> ParsedFile {
        self.parser.parse_bytes(content)
    }

    pub fn suggest_mapping(&self, entity_type: EntityType, headers: &[String]) -> ColumnMapping {
        self.mapper.suggest_mapping(entity_type, headers)
    }

    // ==========================================
    // 建批: 解析 → 映射 → 暂存
    // ==========================================

    /// 创建批次并完成暂存
    ///
    /// # 返回
    /// - Ok(ImportBatch): 处于 validating 阶段、等待校验的批次
    /// - Err(EmptyFile): 文件无数据行（批次已置 failed）
    #[instrument(skip(self, request), fields(entity_type = %request.entity_type, file_name = %request.file_name))]
    pub async fn create_batch(&self, request: CreateBatchRequest) -> ImportResult<ImportBatch> {
        let actor = request
            .actor
            .clone()
            .unwrap_or_else(|| self.settings.default_actor.clone());
        let batch = self
            .insert_new_batch(
                request.entity_type,
                &request.file_name,
                request.content.len() as i64,
                &actor,
            )
            .await?;
        let batch_id = batch.batch_id.as_str();
        let machine = BatchStateMachine::new(self.store.as_ref());
        let logger = BatchEventLogger::new(self.store.as_ref(), batch_id);

        logger
            .info(
                &format!("批次已创建: {} ({})", batch.batch_number, request.file_name),
                Some(json!({ "file_size": batch.file_size, "entity_type": request.entity_type })),
            )
            .await?;

        // === 步骤 1: 解析 ===
        let parsed = self.parser.parse_bytes(&request.content);
        self.store
            .set_encoding(batch_id, parsed.encoding.label())
            .await?;

        if parsed.is_empty() {
            let message = format!("文件无数据行: {}", request.file_name);
            logger.error(&message, None).await?;
            machine
                .fail(batch_id, &[ImportPhase::Uploading], &message)
                .await?;
            return Err(ImportError::EmptyFile(request.file_name));
        }
        machine.start_mapping(batch_id).await?;

        // === 步骤 2: 映射 ===
        let mut mapping = self
            .mapper
            .suggest_mapping(request.entity_type, &parsed.headers)
            .with_overrides(&request.mapping_overrides);
        mapping.retain_known(request.entity_type);
        logger
            .info(
                &format!(
                    "字段映射: {} 个字段已匹配, 编码 {}, 分隔符 {}",
                    mapping.len(),
                    parsed.encoding.label(),
                    parsed.delimiter
                ),
                Some(json!({
                    "mapping": mapping,
                    "unmapped": mapping.unmapped_fields(request.entity_type),
                })),
            )
            .await?;

        // === 步骤 3: 暂存 ===
        let adapter = StagingAdapter::new(self.store.as_ref(), self.cleaner.as_ref());
        let outcome = adapter
            .stage_rows(batch_id, request.entity_type, &parsed.records, &mapping)
            .await?;
        self.store
            .set_ingest_counts(batch_id, outcome.rows_staged(), outcome.rows_skipped)
            .await?;
        logger
            .info(
                &format!(
                    "暂存完成: {} 行, 跳过 {} 行",
                    outcome.rows_staged(),
                    outcome.rows_skipped
                ),
                Some(json!({
                    "rows_staged": outcome.rows_staged(),
                    "rows_skipped": outcome.rows_skipped,
                    "insert_failures": outcome.insert_failures,
                })),
            )
            .await?;

        machine.start_validation(batch_id).await?;
        machine.load(batch_id).await
    }

    /// 分配批次号并插入批次记录
    async fn insert_new_batch(
        &self,
        entity_type: EntityType,
        file_name: &str,
        file_size: i64,
        actor: &str,
    ) -> ImportResult<ImportBatch> {
        let today = Utc::now().date_naive();
        let mut sequence = self.store.max_batch_sequence_on(today).await? + 1;

        for _ in 0..BATCH_NUMBER_ATTEMPTS {
            let batch = ImportBatch::new(
                Uuid::new_v4().to_string(),
                format_batch_number(today, sequence),
                entity_type,
                file_name.to_string(),
                file_size,
                actor.to_string(),
            );
            match self.store.insert_batch(&batch).await {
                Ok(()) => {
                    info!(batch_id = %batch.batch_id, batch_number = %batch.batch_number, "批次已创建");
                    return Ok(batch);
                }
                Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                    warn!(sequence, error = %msg, "批次号冲突，递增重试");
                    sequence += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ImportError::InternalError(format!(
            "无法分配批次号: 连续 {} 次冲突",
            BATCH_NUMBER_ATTEMPTS
        )))
    }

    // ==========================================
    // 校验
    // ==========================================

    /// 执行（或重新执行）校验
    #[instrument(skip(self))]
    pub async fn validate(&self, batch_id: &str) -> ImportResult<ValidationReport> {
        let machine = BatchStateMachine::new(self.store.as_ref());
        machine.start_validation(batch_id).await?;
        let batch = machine.load(batch_id).await?;

        let runner = ValidationRunner::new(
            self.store.as_ref(),
            self.validator.as_ref(),
            self.probe.as_ref(),
            &self.settings,
        );

        match runner.run(&batch).await {
            Ok(report) => {
                match machine.finish_validation(batch_id, report.rows_error).await {
                    Ok(_) => Ok(report),
                    Err(ImportError::InvalidPhase {
                        phase: ImportPhase::Cancelled,
                        ..
                    }) => Err(ImportError::Cancelled {
                        stage: "校验".to_string(),
                        processed: report.rows_checked(),
                    }),
                    Err(e) => Err(e),
                }
            }
            Err(e) if e.is_cancelled() => {
                self.settle_cancel(batch_id).await?;
                Err(e)
            }
            Err(e) => {
                BatchEventLogger::new(self.store.as_ref(), batch_id)
                    .error(&format!("校验中断: {}", e), None)
                    .await?;
                Err(e)
            }
        }
    }

    // ==========================================
    // 提交
    // ==========================================

    /// 提交有效行
    ///
    /// # 参数
    /// - actor: 操作人（None = 配置的默认 actor）
    #[instrument(skip(self))]
    pub async fn commit(&self, batch_id: &str, actor: Option<&str>) -> ImportResult<CommitSummary> {
        let machine = BatchStateMachine::new(self.store.as_ref());
        let batch = machine.load(batch_id).await?;
        machine.start_commit(&batch).await?;

        let actor = actor.unwrap_or(&self.settings.default_actor);
        let committer = Committer::new(self.store.as_ref(), self.probe.as_ref(), &self.settings, actor);

        match committer.run(&batch).await {
            Ok(summary) => match machine.complete_commit(batch_id).await {
                Ok(()) => Ok(summary),
                Err(ImportError::InvalidPhase {
                    phase: ImportPhase::Cancelled,
                    ..
                }) => Err(ImportError::Cancelled {
                    stage: "提交".to_string(),
                    processed: summary.processed(),
                }),
                Err(e) => Err(e),
            },
            Err(e) if e.is_cancelled() => {
                self.settle_cancel(batch_id).await?;
                Err(e)
            }
            Err(e) => {
                let message = e.to_string();
                BatchEventLogger::new(self.store.as_ref(), batch_id)
                    .error(&format!("提交失败: {}", message), None)
                    .await?;
                machine
                    .fail(batch_id, &[ImportPhase::Committing], &message)
                    .await?;
                Err(e)
            }
        }
    }

    // ==========================================
    // 取消 / 回滚 / 删除 / 进度
    // ==========================================

    /// 请求取消（进行中阶段立即转为 cancelled，运行中的循环在下一检查点停止）
    #[instrument(skip(self))]
    pub async fn cancel(&self, batch_id: &str) -> ImportResult<ImportBatch> {
        let machine = BatchStateMachine::new(self.store.as_ref());
        let batch = machine.load(batch_id).await?;
        if !ImportPhase::IN_PROGRESS.contains(&batch.phase) {
            return Err(ImportError::invalid_phase("cancel", batch.phase));
        }

        self.store.request_cancel(batch_id).await?;
        machine.cancel(batch_id).await?;
        BatchEventLogger::new(self.store.as_ref(), batch_id)
            .warning(
                &format!("已请求取消 (阶段 {})", batch.phase),
                Some(json!({ "phase": batch.phase })),
            )
            .await?;
        machine.load(batch_id).await
    }

    pub async fn rollback(&self, batch_id: &str) -> ImportResult<RollbackResult> {
        RollbackEngine::new(self.store.as_ref()).rollback(batch_id).await
    }

    pub async fn delete(&self, batch_id: &str) -> ImportResult<TeardownReport> {
        BatchTeardown::new(self.store.as_ref()).delete(batch_id).await
    }

    pub async fn progress(&self, batch_id: &str) -> ImportResult<BatchProgress> {
        let batch = BatchStateMachine::new(self.store.as_ref())
            .load(batch_id)
            .await?;
        Ok(batch.progress())
    }

    /// 循环观察到取消后落定 cancelled 阶段（已被外部取消时为空操作）
    async fn settle_cancel(&self, batch_id: &str) -> ImportResult<()> {
        match BatchStateMachine::new(self.store.as_ref()).cancel(batch_id).await {
            Ok(()) | Err(ImportError::InvalidPhase { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
