// ==========================================
// 现场服务管理系统 - 协作式取消探针
// ==========================================
// 职责: 校验/提交循环在检查点询问批次是否已被请求取消
// 说明: 取消是观察式而非抢占式，当前行的 I/O 总会先完成
// ==========================================

use crate::importer::error::ImportResult;
use crate::repository::import_store::BatchRepository;
use async_trait::async_trait;
use std::sync::Arc;

// ==========================================
// CancellationProbe Trait
// ==========================================
// 实现者: StoreCancelProbe（读取 import_batch.is_cancel_requested）
#[async_trait]
pub trait CancellationProbe: Send + Sync {
    async fn is_cancelled(&self, batch_id: &str) -> ImportResult<bool>;
}

/// 基于 Store 取消标记的默认探针
pub struct StoreCancelProbe<S>
where
    S: BatchRepository + ?Sized,
{
    store: Arc<S>,
}

impl<S> StoreCancelProbe<S>
where
    S: BatchRepository + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S> CancellationProbe for StoreCancelProbe<S>
where
    S: BatchRepository + ?Sized,
{
    async fn is_cancelled(&self, batch_id: &str) -> ImportResult<bool> {
        Ok(self.store.is_cancel_requested(batch_id).await?)
    }
}

/// 检查点判定: 第 0 行之后每 interval 行检查一次
pub fn is_checkpoint(visited: usize, interval: usize) -> bool {
    interval > 0 && visited > 0 && visited % interval == 0
}

/// 进度落库判定: 每 interval 行一次，最后一行无条件
pub fn should_flush(visited: usize, total: usize, interval: usize) -> bool {
    visited == total || (interval > 0 && visited % interval == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_schedule() {
        let hits: Vec<usize> = (0..30).filter(|i| is_checkpoint(*i, 10)).collect();
        assert_eq!(hits, vec![10, 20]);
        assert!(!is_checkpoint(5, 0));
    }

    #[test]
    fn test_flush_schedule() {
        assert!(should_flush(20, 45, 20));
        assert!(!should_flush(21, 45, 20));
        assert!(should_flush(45, 45, 20));
    }
}
