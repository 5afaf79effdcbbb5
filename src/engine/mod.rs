// ==========================================
// 现场服务管理系统 - 引擎层
// ==========================================
// 职责: 批次状态机、校验/提交循环、回滚与删除
// 红线: Engine 不拼 SQL, 所有数据访问经由 Store trait
// ==========================================

pub mod batch_state;
pub mod cancellation;
pub mod committer;
pub mod event_log;
pub mod orchestrator;
pub mod rollback;
pub mod teardown;
pub mod validation;

// 重导出核心引擎
pub use batch_state::BatchStateMachine;
pub use cancellation::{CancellationProbe, StoreCancelProbe};
pub use committer::{Committer, RowOutcome};
pub use event_log::BatchEventLogger;
pub use orchestrator::{format_batch_number, CreateBatchRequest, ImportPipeline};
pub use rollback::RollbackEngine;
pub use teardown::{BatchTeardown, TeardownReport};
pub use validation::{ValidationReport, ValidationRunner};
