// ==========================================
// 现场服务管理系统 - 导入 Store 实现（rusqlite）
// ==========================================
// 职责: 实现 BatchRepository / StagingRepository / LiveRecordRepository /
//       BatchLogRepository / DependencyChecker
// 红线: Repository 不含业务规则，只做数据 CRUD
// 并发: 单连接 Arc<Mutex<Connection>>，锁只在同步块内持有，不跨 .await
// ==========================================

mod batch;
mod core;
mod live;
mod logs;
mod staging;


pub use self::core::SqliteImportStore;
