// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供临时数据库、API 实例与常用导入文件
// ==========================================

#![allow(dead_code)]

use field_service_import::api::ImportApi;
use field_service_import::config::ImportSettings;
use field_service_import::engine::{CancellationProbe, ImportPipeline};
use field_service_import::repository::SqliteImportStore;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// 创建临时测试数据库文件
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();
    Ok((temp_file, db_path))
}

/// 打开基于临时数据库的 ImportApi（schema 与配置自动初始化）
pub async fn open_test_api() -> (NamedTempFile, ImportApi<SqliteImportStore>) {
    let (temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let api = ImportApi::open(&db_path).await.expect("Failed to open api");
    (temp_file, api)
}

/// 使用自定义配置与取消探针构建 ImportApi
pub fn build_api(
    store: Arc<SqliteImportStore>,
    settings: ImportSettings,
    probe: Option<Arc<dyn CancellationProbe>>,
) -> ImportApi<SqliteImportStore> {
    let mut pipeline = ImportPipeline::new(store, settings);
    if let Some(probe) = probe {
        pipeline = pipeline.with_cancel_probe(probe);
    }
    ImportApi::new(pipeline)
}

/// 建批 + 校验，返回 batch_id
pub async fn stage_and_validate(
    api: &ImportApi<SqliteImportStore>,
    entity: &str,
    content: &str,
) -> String {
    let batch = api
        .create_batch(
            entity,
            &format!("{}.csv", entity),
            content.as_bytes().to_vec(),
            BTreeMap::new(),
            Some("tester".to_string()),
        )
        .await
        .expect("Failed to create batch");
    api.validate_batch(&batch.batch_id)
        .await
        .expect("Failed to validate batch");
    batch.batch_id
}

/// 建批 + 校验 + 提交，返回 batch_id
pub async fn import_and_commit(
    api: &ImportApi<SqliteImportStore>,
    entity: &str,
    content: &str,
) -> String {
    let batch_id = stage_and_validate(api, entity, content).await;
    api.commit_batch(&batch_id, None)
        .await
        .expect("Failed to commit batch");
    batch_id
}

// ==========================================
// 测试文件
// ==========================================

pub const CUSTOMERS_CSV: &str = "\
Customer Name,Email,City,Customer ID
Acme Plumbing,ops@acme.com,Springfield,EXT-1
Beta Heating,office@beta.io,Shelbyville,EXT-2
";

/// 生成 n 个客户行
pub fn customers_csv(count: usize) -> String {
    let mut text = String::from("Customer Name,Email,City,Customer ID\n");
    for i in 1..=count {
        text.push_str(&format!(
            "Customer {i},c{i}@example.com,Springfield,EXT-{i}\n"
        ));
    }
    text
}

/// 应收报表: 第 2 行为汇总行
pub const AR_WITH_TOTAL_CSV: &str = "\
Invoice,Customer ID,Customer Name,Balance,Issue Date
INV-100,EXT-1,Acme Plumbing,\"$1,250.00\",2024-11-01
Total,,,\"$1,250.00\",
INV-101,EXT-2,Beta Heating,$300.00,2024-11-15
";

pub const HISTORY_CSV: &str = "\
Type,Customer ID,Number,Date,Amount
invoice,EXT-1,H-1,2024-06-01,$500.00
payment,EXT-1,P-1,2024-06-10,$500.00
ticket,EXT-2,T-1,2024-06-12,$120.00
";
