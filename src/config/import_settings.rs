// ==========================================
// 现场服务管理系统 - 导入配置快照
// ==========================================
// 用途: 每条管道加载一次的不可变配置
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub validation_checkpoint_rows: usize,
    pub validation_progress_flush_rows: usize,
    pub commit_checkpoint_rows: usize,
    pub commit_progress_flush_rows: usize,
    pub preview_page_limit: i64,
    pub preview_page_max: i64,
    pub default_actor: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            validation_checkpoint_rows: 25,
            validation_progress_flush_rows: 50,
            commit_checkpoint_rows: 10,
            commit_progress_flush_rows: 20,
            preview_page_limit: 100,
            preview_page_max: 500,
            default_actor: "system".to_string(),
        }
    }
}

impl ImportSettings {
    /// 从配置读取器加载快照
    pub async fn load(reader: &dyn ImportConfigReader) -> RepositoryResult<Self> {
        Ok(Self {
            validation_checkpoint_rows: reader.get_validation_checkpoint_rows().await?,
            validation_progress_flush_rows: reader.get_validation_progress_flush_rows().await?,
            commit_checkpoint_rows: reader.get_commit_checkpoint_rows().await?,
            commit_progress_flush_rows: reader.get_commit_progress_flush_rows().await?,
            preview_page_limit: reader.get_preview_page_limit().await?,
            preview_page_max: reader.get_preview_page_max().await?,
            default_actor: reader.get_default_actor().await?,
        })
    }

    /// 规范化分页大小: 缺省 → preview_page_limit，超限 → preview_page_max
    pub fn clamp_page_size(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(n) if n > 0 => n.min(self.preview_page_max),
            _ => self.preview_page_limit.min(self.preview_page_max),
        }
    }
}
