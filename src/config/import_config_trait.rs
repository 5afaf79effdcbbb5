// ==========================================
// 现场服务管理系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
// 约定: 配置缺失或非法时返回默认值，不返回错误
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 校验阶段 =====

    /// 校验循环中检查取消标记的间隔（行）
    ///
    /// # 默认值
    /// - 25
    async fn get_validation_checkpoint_rows(&self) -> RepositoryResult<usize>;

    /// validated_rows 落库间隔（行）
    ///
    /// # 默认值
    /// - 50
    async fn get_validation_progress_flush_rows(&self) -> RepositoryResult<usize>;

    // ===== 提交阶段 =====

    /// 提交循环中检查取消标记的间隔（行）
    ///
    /// # 默认值
    /// - 10
    async fn get_commit_checkpoint_rows(&self) -> RepositoryResult<usize>;

    /// committed_rows 落库间隔（行）
    ///
    /// # 默认值
    /// - 20
    async fn get_commit_progress_flush_rows(&self) -> RepositoryResult<usize>;

    // ===== 预览分页 =====

    /// # 默认值
    /// - 100
    async fn get_preview_page_limit(&self) -> RepositoryResult<i64>;

    /// 单页上限（请求值超过时截断）
    ///
    /// # 默认值
    /// - 500
    async fn get_preview_page_max(&self) -> RepositoryResult<i64>;

    // ===== 审计 =====

    /// 未提供操作人时使用的 actor
    ///
    /// # 默认值
    /// - "system"
    async fn get_default_actor(&self) -> RepositoryResult<String>;
}
