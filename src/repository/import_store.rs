// ==========================================
// 现场服务管理系统 - 导入 Store Trait
// ==========================================
// 职责: 定义导入管道的数据访问接口（不包含业务逻辑）
// 分组: 批次 / 暂存行 / 业务记录 / 日志 / 删除安全性判定
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::batch::{CommitSummary, ImportBatch, PhaseTransition};
use crate::domain::event::{BatchLogEvent, RollbackLogEntry};
use crate::domain::live::{
    Customer, CustomerLocation, DeletionCheck, GlEntry, Invoice, InvoiceLineItem, Part, Ticket,
    Vendor,
};
use crate::domain::staging::{FieldError, StagingRow};
use crate::domain::types::{EntityType, LogLevel, ValidationStatus};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

// ==========================================
// BatchRepository Trait
// ==========================================
// 用途: import_batch 表读写
// 实现者: SqliteImportStore
#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn insert_batch(&self, batch: &ImportBatch) -> RepositoryResult<()>;

    async fn find_batch(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>>;

    /// 按创建时间倒序分页
    async fn list_batches(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<ImportBatch>>;

    /// 指定日期（UTC）已用批次号中的最大序号，无批次时为 0
    async fn max_batch_sequence_on(&self, day: NaiveDate) -> RepositoryResult<i64>;

    /// 阶段迁移（CAS）
    ///
    /// # 返回
    /// - Ok(true): 当前阶段 ∈ transition.from，已迁移
    /// - Ok(false): 当前阶段不匹配（例如已被并发取消），未做任何修改
    async fn transition_phase(
        &self,
        batch_id: &str,
        transition: &PhaseTransition,
    ) -> RepositoryResult<bool>;

    async fn set_encoding(&self, batch_id: &str, encoding: &str) -> RepositoryResult<()>;

    /// 记录入库结果（暂存行数 + 跳过行数）
    async fn set_ingest_counts(
        &self,
        batch_id: &str,
        rows_total: i64,
        rows_skipped: i64,
    ) -> RepositoryResult<()>;

    /// 新一轮校验开始: 清零校验进度与 validated_at
    async fn reset_validation_progress(&self, batch_id: &str) -> RepositoryResult<()>;

    async fn set_validated_rows(&self, batch_id: &str, validated_rows: i64) -> RepositoryResult<()>;

    /// 校验结束: 写入有效/错误行数与完成时间
    async fn finish_validation(
        &self,
        batch_id: &str,
        rows_valid: i64,
        rows_error: i64,
        validated_at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    async fn set_committed_rows(&self, batch_id: &str, committed_rows: i64) -> RepositoryResult<()>;

    /// 写入提交汇总（同时更新 rows_imported = created + updated）
    async fn set_commit_summary(
        &self,
        batch_id: &str,
        summary: &CommitSummary,
    ) -> RepositoryResult<()>;

    // ===== 控制标记（只写 true）=====

    /// 置取消标记
    ///
    /// # 返回
    /// - Ok(true): 批次存在
    async fn request_cancel(&self, batch_id: &str) -> RepositoryResult<bool>;

    async fn is_cancel_requested(&self, batch_id: &str) -> RepositoryResult<bool>;

    async fn mark_rollback_requested(&self, batch_id: &str) -> RepositoryResult<()>;

    // ===== 错误面 =====

    async fn record_error(
        &self,
        batch_id: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<()>;

    /// 删除批次主记录（子记录必须已先删除）
    async fn delete_batch_record(&self, batch_id: &str) -> RepositoryResult<usize>;
}

// ==========================================
// StagingRepository Trait
// ==========================================
// 用途: import_staging_* 表读写（按实体类型选表）
#[async_trait]
pub trait StagingRepository: Send + Sync {
    /// 插入单条暂存行（表由 row.fields 的实体类型决定）
    async fn insert_staging_row(&self, row: &StagingRow) -> RepositoryResult<()>;

    /// 按 row_number 升序读取
    ///
    /// # 参数
    /// - status: None = 全部
    /// - limit: None = 不分页
    async fn list_staging_rows(
        &self,
        entity_type: EntityType,
        batch_id: &str,
        status: Option<ValidationStatus>,
        limit: Option<i64>,
        offset: i64,
    ) -> RepositoryResult<Vec<StagingRow>>;

    async fn count_staging_rows(
        &self,
        entity_type: EntityType,
        batch_id: &str,
        status: Option<ValidationStatus>,
    ) -> RepositoryResult<i64>;

    async fn update_validation(
        &self,
        entity_type: EntityType,
        row_id: &str,
        status: ValidationStatus,
        errors: &[FieldError],
    ) -> RepositoryResult<()>;

    /// 重置批次全部暂存行为 pending
    async fn reset_validation(&self, entity_type: EntityType, batch_id: &str)
        -> RepositoryResult<usize>;

    async fn link_imported_record(
        &self,
        entity_type: EntityType,
        row_id: &str,
        record_id: &str,
    ) -> RepositoryResult<()>;

    async fn delete_staging_rows(
        &self,
        entity_type: EntityType,
        batch_id: &str,
    ) -> RepositoryResult<usize>;
}

// ==========================================
// LiveRecordRepository Trait
// ==========================================
// 用途: 导入目标业务表（客户/发票/供应商/配件/工单）
#[async_trait]
pub trait LiveRecordRepository: Send + Sync {
    // ===== 客户 =====
    async fn find_customer(&self, customer_id: &str) -> RepositoryResult<Option<Customer>>;

    async fn find_customer_by_external_id(
        &self,
        external_customer_id: &str,
    ) -> RepositoryResult<Option<Customer>>;

    /// 插入客户及其主地址（同一事务）
    async fn insert_customer(
        &self,
        customer: &Customer,
        location: Option<&CustomerLocation>,
    ) -> RepositoryResult<()>;

    /// 更新客户可变字段; location 存在时更新主地址（无主地址则新增）
    async fn update_customer(
        &self,
        customer: &Customer,
        location: Option<&CustomerLocation>,
    ) -> RepositoryResult<()>;

    // ===== 发票 =====
    async fn find_invoice_for_customer(
        &self,
        customer_id: &str,
        external_invoice_number: &str,
    ) -> RepositoryResult<Option<Invoice>>;

    /// 插入发票、明细行与总账分录（同一事务）
    async fn insert_invoice(
        &self,
        invoice: &Invoice,
        line_items: &[InvoiceLineItem],
        gl_entries: &[GlEntry],
    ) -> RepositoryResult<()>;

    // ===== 供应商 =====
    async fn find_vendor_by_code(&self, vendor_code: &str) -> RepositoryResult<Option<Vendor>>;

    async fn find_vendor_by_external_id(
        &self,
        external_vendor_id: &str,
    ) -> RepositoryResult<Option<Vendor>>;

    async fn insert_vendor(&self, vendor: &Vendor) -> RepositoryResult<()>;

    async fn update_vendor(&self, vendor: &Vendor) -> RepositoryResult<()>;

    // ===== 配件 =====
    async fn find_part_by_sku(&self, sku: &str) -> RepositoryResult<Option<Part>>;

    async fn insert_part(&self, part: &Part) -> RepositoryResult<()>;

    async fn update_part(&self, part: &Part) -> RepositoryResult<()>;

    // ===== 工单 =====
    async fn find_ticket(
        &self,
        customer_id: &str,
        ticket_number: &str,
    ) -> RepositoryResult<Option<Ticket>>;

    async fn insert_ticket(&self, ticket: &Ticket) -> RepositoryResult<()>;

    // ===== 回滚支持 =====

    /// 由该批次新建的客户（按创建时间）
    async fn list_batch_customers(&self, batch_id: &str) -> RepositoryResult<Vec<Customer>>;

    /// 由该批次新建的发票（按创建时间）
    async fn list_batch_invoices(&self, batch_id: &str) -> RepositoryResult<Vec<Invoice>>;

    /// 删除客户及其地址（同一事务）
    async fn delete_customer_cascade(&self, customer_id: &str) -> RepositoryResult<()>;

    /// 删除发票及其明细行、关联总账分录（同一事务）
    async fn delete_invoice_cascade(&self, invoice_id: &str) -> RepositoryResult<()>;

    /// 仍带该批次标记的客户数 / 发票数
    async fn count_live_records(&self, batch_id: &str) -> RepositoryResult<LiveRecordCounts>;
}

/// 批次残留业务记录计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveRecordCounts {
    pub customers: i64,
    pub invoices: i64,
}

impl LiveRecordCounts {
    pub fn is_empty(&self) -> bool {
        self.customers == 0 && self.invoices == 0
    }
}

// ==========================================
// BatchLogRepository Trait
// ==========================================
// 用途: import_batch_log / import_rollback_log（追加写）
#[async_trait]
pub trait BatchLogRepository: Send + Sync {
    async fn append_event(&self, event: &BatchLogEvent) -> RepositoryResult<()>;

    /// 按时间升序
    async fn list_events(
        &self,
        batch_id: &str,
        level: Option<LogLevel>,
    ) -> RepositoryResult<Vec<BatchLogEvent>>;

    async fn delete_events(&self, batch_id: &str) -> RepositoryResult<usize>;

    async fn append_rollback_entry(&self, entry: &RollbackLogEntry) -> RepositoryResult<()>;

    async fn list_rollback_entries(&self, batch_id: &str)
        -> RepositoryResult<Vec<RollbackLogEntry>>;

    async fn delete_rollback_entries(&self, batch_id: &str) -> RepositoryResult<usize>;
}

// ==========================================
// DependencyChecker Trait
// ==========================================
// 用途: 删除安全性判定（策略对管道不透明）
#[async_trait]
pub trait DependencyChecker: Send + Sync {
    /// 客户无工单/发票/收款依赖时可删除
    async fn can_delete_customer(&self, customer_id: &str) -> RepositoryResult<DeletionCheck>;

    /// 发票无收款依赖时可删除
    async fn can_delete_invoice(&self, invoice_id: &str) -> RepositoryResult<DeletionCheck>;
}

// ==========================================
// ImportStore - 管道所需的完整 Store 能力
// ==========================================
pub trait ImportStore:
    BatchRepository + StagingRepository + LiveRecordRepository + BatchLogRepository + DependencyChecker
{
}

impl<T> ImportStore for T where
    T: BatchRepository
        + StagingRepository
        + LiveRecordRepository
        + BatchLogRepository
        + DependencyChecker
{
}
