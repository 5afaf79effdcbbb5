// ==========================================
// 导入管道端到端测试
// ==========================================
// 测试目标: 建批 → 校验 → 提交 的完整流程与各实体提交语义
// ==========================================

mod test_helpers;

use field_service_import::domain::types::{
    EntityType, ImportPhase, LegacyStatus, LogLevel, ValidationStatus,
};
use field_service_import::logging;
use field_service_import::repository::LiveRecordRepository;
use std::collections::BTreeMap;

#[tokio::test]
async fn test_ar_total_row_skipped_and_row_numbers_preserved() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let batch = api
        .create_batch(
            "ar",
            "ar_aging.csv",
            test_helpers::AR_WITH_TOTAL_CSV.as_bytes().to_vec(),
            BTreeMap::new(),
            None,
        )
        .await
        .expect("建批应该成功");

    assert_eq!(batch.phase, ImportPhase::Validating);
    assert_eq!(batch.rows_total, 2);
    assert_eq!(batch.rows_skipped, 1);
    assert!(batch.batch_number.starts_with("IMP-"));
    assert_eq!(batch.encoding.as_deref(), Some("utf-8"));

    let page = api.list_rows(&batch.batch_id, None, None, 0).await.unwrap();
    let numbers: Vec<i64> = page.rows.iter().map(|r| r.row_number).collect();
    assert_eq!(numbers, vec![1, 3]);
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_interior_blank_line_keeps_source_row_numbers() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let csv = "Customer Name,Email\nAcme,a@acme.com\n\nBeta,b@beta.io\n";
    let batch = api
        .create_batch("customers", "c.csv", csv.as_bytes().to_vec(), BTreeMap::new(), None)
        .await
        .unwrap();
    assert_eq!(batch.rows_total, 2);
    assert_eq!(batch.rows_skipped, 1);

    let page = api.list_rows(&batch.batch_id, None, None, 0).await.unwrap();
    let numbers: Vec<i64> = page.rows.iter().map(|r| r.row_number).collect();
    assert_eq!(numbers, vec![1, 3]);
}

#[tokio::test]
async fn test_customer_full_flow_and_dedup_on_second_import() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let first = test_helpers::stage_and_validate(&api, "customers", test_helpers::CUSTOMERS_CSV).await;
    let batch = api.get_batch(&first).await.unwrap();
    assert_eq!(batch.phase, ImportPhase::ReadyToCommit);
    assert_eq!(batch.rows_valid, 2);
    assert_eq!(batch.rows_error, 0);

    let summary = api.commit_batch(&first, Some("alice")).await.unwrap();
    assert_eq!(summary.created, 2);

    let progress = api.get_progress(&first).await.unwrap();
    assert_eq!(progress.phase, ImportPhase::Completed);
    assert_eq!(progress.status, LegacyStatus::Completed);
    assert_eq!(progress.committed_rows, 2);
    assert!((progress.progress_percentage - 100.0).abs() < f64::EPSILON);

    // 第二次导入同一外部编号 → 更新而非新建
    let renamed = "Customer Name,Email,City,Customer ID\nAcme Plumbing & Heating,ops@acme.com,Springfield,EXT-1\n";
    let second = test_helpers::stage_and_validate(&api, "customers", renamed).await;
    let summary = api.commit_batch(&second, None).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);

    let store = api.pipeline().store();
    let customer = store
        .find_customer_by_external_id("EXT-1")
        .await
        .unwrap()
        .expect("客户应该存在");
    assert_eq!(customer.name, "Acme Plumbing & Heating");
    assert_eq!(customer.import_batch_id.as_deref(), Some(first.as_str()));
    assert_eq!(customer.updated_by.as_deref(), Some("system"));

    let batches = api.list_batches(None, 0).await.unwrap();
    assert_eq!(batches.len(), 2);
    assert_ne!(batches[0].batch_number, batches[1].batch_number);
}

#[tokio::test]
async fn test_ar_commit_creates_invoices_against_imported_customers() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    test_helpers::import_and_commit(&api, "customers", test_helpers::CUSTOMERS_CSV).await;
    let ar = test_helpers::stage_and_validate(&api, "ar", test_helpers::AR_WITH_TOTAL_CSV).await;
    let summary = api.commit_batch(&ar, None).await.unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.errors, 0);

    let store = api.pipeline().store();
    let acme = store.find_customer_by_external_id("EXT-1").await.unwrap().unwrap();
    let invoice = store
        .find_invoice_for_customer(&acme.id, "INV-100")
        .await
        .unwrap()
        .expect("发票应该存在");
    assert!((invoice.balance_due - 1250.0).abs() < 1e-9);
    assert_eq!(invoice.status, "open");

    let rows = api
        .list_rows(&ar, Some(ValidationStatus::Valid), None, 0)
        .await
        .unwrap();
    assert!(rows.rows.iter().all(|r| r.imported_record_id.is_some()));
}

#[tokio::test]
async fn test_ar_rows_with_unknown_customer_logged_as_row_failures() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    // 未先导入客户 → 每张发票都找不到客户
    let ar = test_helpers::stage_and_validate(&api, "ar", test_helpers::AR_WITH_TOTAL_CSV).await;
    let summary = api.commit_batch(&ar, None).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.errors, 2);

    let errors = api.list_logs(&ar, Some(LogLevel::Error)).await.unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].message.contains("第 1 行提交失败: 未找到外部编号为 EXT-1 的客户"));
    assert!(errors.iter().all(|e| !e.message.contains("内部错误")));
}

#[tokio::test]
async fn test_history_payment_rows_skipped() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    test_helpers::import_and_commit(&api, "customers", test_helpers::CUSTOMERS_CSV).await;
    let history = test_helpers::stage_and_validate(&api, "history", test_helpers::HISTORY_CSV).await;
    let summary = api.commit_batch(&history, None).await.unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 0);

    let batch = api.get_batch(&history).await.unwrap();
    assert_eq!(batch.commit_summary, Some(summary));
    assert!(!batch.supports_rollback);

    // 重复导入: 发票与工单均已存在 → 全部跳过
    let again = test_helpers::stage_and_validate(&api, "history", test_helpers::HISTORY_CSV).await;
    let summary = api.commit_batch(&again, None).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.skipped, 3);
}

#[tokio::test]
async fn test_validation_is_idempotent_and_errors_block_ready_phase() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let csv = "Customer Name,Email,Customer ID\nAcme,not-an-email,EXT-1\n,ok@beta.io,EXT-2\nGamma,g@gamma.com,EXT-3\n";
    let batch_id = test_helpers::stage_and_validate(&api, "customers", csv).await;

    let first = api.get_batch(&batch_id).await.unwrap();
    assert_eq!(first.phase, ImportPhase::Validating);
    assert_eq!(first.rows_valid, 1);
    assert_eq!(first.rows_error, 2);
    assert!(first.validated_at.is_some());

    let report = api.validate_batch(&batch_id).await.unwrap();
    assert_eq!(report.rows_valid, 1);
    assert_eq!(report.rows_error, 2);

    let errors = api
        .list_rows(&batch_id, Some(ValidationStatus::Error), None, 0)
        .await
        .unwrap();
    assert_eq!(errors.total, 2);
    assert!(errors.rows.iter().all(|r| !r.validation_errors.is_empty()));

    // 存在错误行时仍可提交有效行
    let summary = api.commit_batch(&batch_id, None).await.unwrap();
    assert_eq!(summary.created, 1);
}

#[tokio::test]
async fn test_vendor_and_item_commit() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let vendors = "Vendor Name,Vendor Code,Email\nPipe Supply Co,PSC,sales@psc.com\n";
    let id = test_helpers::import_and_commit(&api, "vendors", vendors).await;
    assert_eq!(
        api.get_batch(&id).await.unwrap().commit_summary.map(|s| s.created),
        Some(1)
    );

    let items = "SKU,Item Name,Unit Cost,Unit Price,Qty On Hand\nVLV-1,Ball Valve,$4.50,$9.99,\"1,200\"\n";
    let id = test_helpers::import_and_commit(&api, "items", items).await;
    let part = api
        .pipeline()
        .store()
        .find_part_by_sku("VLV-1")
        .await
        .unwrap()
        .expect("配件应该存在");
    assert_eq!(part.quantity_on_hand, Some(1200));
    assert_eq!(api.get_batch(&id).await.unwrap().phase, ImportPhase::Completed);
}

#[tokio::test]
async fn test_concurrent_batches_progress_independently() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let first = test_helpers::customers_csv(30);
    let second = "Vendor Name,Vendor Code\nAlpha Parts,AP\nBravo Parts,BP\n";

    let results = futures::future::join_all(vec![
        test_helpers::import_and_commit(&api, "customers", &first),
        test_helpers::import_and_commit(&api, "vendors", second),
    ])
    .await;

    let customers = api.get_batch(&results[0]).await.unwrap();
    let vendors = api.get_batch(&results[1]).await.unwrap();
    assert_eq!(customers.entity_type, EntityType::Customers);
    assert_eq!(customers.committed_rows, 30);
    assert_eq!(vendors.committed_rows, 2);
    assert_eq!(customers.phase, ImportPhase::Completed);
    assert_eq!(vendors.phase, ImportPhase::Completed);
}
