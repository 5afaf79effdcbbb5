// ==========================================
// 现场服务管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    // 校验
    pub const VALIDATION_CHECKPOINT_ROWS: &str = "import.validation_checkpoint_rows";
    pub const VALIDATION_PROGRESS_FLUSH_ROWS: &str = "import.validation_progress_flush_rows";

    // 提交
    pub const COMMIT_CHECKPOINT_ROWS: &str = "import.commit_checkpoint_rows";
    pub const COMMIT_PROGRESS_FLUSH_ROWS: &str = "import.commit_progress_flush_rows";

    // 预览分页
    pub const PREVIEW_PAGE_LIMIT: &str = "import.preview_page_limit";
    pub const PREVIEW_PAGE_MAX: &str = "import.preview_page_max";

    // 审计
    pub const DEFAULT_ACTOR: &str = "import.default_actor";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 import.* 配置的快照
    pub fn get_import_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' AND key LIKE 'import.%' ORDER BY key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    /// 读取正整数配置，缺失或非法时回退默认值
    fn get_positive_or_default(&self, key: &str, default: i64) -> RepositoryResult<i64> {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<i64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default,
                    "配置值非法，使用默认值"
                );
                Ok(default)
            }
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_validation_checkpoint_rows(&self) -> RepositoryResult<usize> {
        Ok(self.get_positive_or_default(config_keys::VALIDATION_CHECKPOINT_ROWS, 25)? as usize)
    }

    async fn get_validation_progress_flush_rows(&self) -> RepositoryResult<usize> {
        Ok(self.get_positive_or_default(config_keys::VALIDATION_PROGRESS_FLUSH_ROWS, 50)? as usize)
    }

    async fn get_commit_checkpoint_rows(&self) -> RepositoryResult<usize> {
        Ok(self.get_positive_or_default(config_keys::COMMIT_CHECKPOINT_ROWS, 10)? as usize)
    }

    async fn get_commit_progress_flush_rows(&self) -> RepositoryResult<usize> {
        Ok(self.get_positive_or_default(config_keys::COMMIT_PROGRESS_FLUSH_ROWS, 20)? as usize)
    }

    async fn get_preview_page_limit(&self) -> RepositoryResult<i64> {
        self.get_positive_or_default(config_keys::PREVIEW_PAGE_LIMIT, 100)
    }

    async fn get_preview_page_max(&self) -> RepositoryResult<i64> {
        self.get_positive_or_default(config_keys::PREVIEW_PAGE_MAX, 500)
    }

    async fn get_default_actor(&self) -> RepositoryResult<String> {
        let value = self.get_global_config_value(config_keys::DEFAULT_ACTOR)?;
        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "system".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::import_settings::ImportSettings;

    fn setup_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let manager = setup_manager();
        let settings = ImportSettings::load(&manager).await.unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_and_invalid_fallback() {
        let manager = setup_manager();
        manager
            .set_global_config_value(config_keys::COMMIT_CHECKPOINT_ROWS, "2")
            .unwrap();
        manager
            .set_global_config_value(config_keys::VALIDATION_CHECKPOINT_ROWS, "-5")
            .unwrap();
        manager
            .set_global_config_value(config_keys::PREVIEW_PAGE_MAX, "abc")
            .unwrap();
        manager
            .set_global_config_value(config_keys::DEFAULT_ACTOR, "importer-bot")
            .unwrap();

        let settings = ImportSettings::load(&manager).await.unwrap();
        assert_eq!(settings.commit_checkpoint_rows, 2);
        assert_eq!(settings.validation_checkpoint_rows, 25);
        assert_eq!(settings.preview_page_max, 500);
        assert_eq!(settings.default_actor, "importer-bot");

        let snapshot = manager.get_import_config_snapshot().unwrap();
        assert_eq!(snapshot.len(), 4);
    }
}
