// ==========================================
// ImportApi 测试
// ==========================================
// 测试目标: 预览、输入校验、分页、错误行导出、配置加载
// ==========================================

mod test_helpers;

use field_service_import::api::{ApiError, ImportApi};
use field_service_import::config::{config_keys, ConfigManager};
use field_service_import::domain::staging::StagedFields;
use field_service_import::domain::types::{EntityType, ValidationStatus};
use field_service_import::logging;
use std::collections::BTreeMap;

#[tokio::test]
async fn test_preview_file_reports_mapping_and_encoding() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let mut content = vec![0xEF, 0xBB, 0xBF];
    content.extend_from_slice(b"Invoice #;Customer ID;Open Balance\nINV-1;EXT-1;$10.00\nINV-2;EXT-2;$20.00\n");

    let preview = api.preview_file(EntityType::Ar, &content, Some(1)).unwrap();
    assert_eq!(preview.encoding, "utf-8-bom");
    assert_eq!(preview.delimiter, "semicolon");
    assert_eq!(preview.total_rows, 2);
    assert_eq!(preview.rows.len(), 1);
    assert_eq!(preview.suggested_mapping.get("invoice_number"), Some("Invoice #"));
    assert_eq!(preview.suggested_mapping.get("balance_due"), Some("Open Balance"));
    assert!(preview.unmapped_fields.contains(&"due_date".to_string()));

    // 预览不创建批次
    assert!(api.list_batches(None, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_input_rejected() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let err = api
        .create_batch("widgets", "w.csv", b"a\n1\n".to_vec(), BTreeMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = api
        .create_batch("customers", "  ", b"Name\nAcme\n".to_vec(), BTreeMap::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    assert!(matches!(
        api.validate_batch("").await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        api.get_progress("no-such-batch").await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_mapping_overrides_applied() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let mut overrides = BTreeMap::new();
    overrides.insert("email".to_string(), "Contact".to_string());

    let batch = api
        .create_batch(
            "customers",
            "c.csv",
            b"Name,Contact\nAcme,ops@acme.com\n".to_vec(),
            overrides,
            None,
        )
        .await
        .unwrap();

    let page = api.list_rows(&batch.batch_id, None, None, 0).await.unwrap();
    match &page.rows[0].fields {
        StagedFields::Customers(f) => {
            assert_eq!(f.name.as_deref(), Some("Acme"));
            assert_eq!(f.email.as_deref(), Some("ops@acme.com"));
        }
        other => panic!("unexpected fields: {:?}", other),
    }
}

#[tokio::test]
async fn test_list_rows_pagination() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let csv = test_helpers::customers_csv(12);
    let batch_id = test_helpers::stage_and_validate(&api, "customers", &csv).await;

    let page = api
        .list_rows(&batch_id, Some(ValidationStatus::Valid), Some(5), 10)
        .await
        .unwrap();
    assert_eq!(page.total, 12);
    assert_eq!(page.limit, 5);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].row_number, 11);
}

#[tokio::test]
async fn test_export_error_rows_csv() {
    logging::init_test();
    let (_temp_file, api) = test_helpers::open_test_api().await;

    let csv = "Customer Name,Email\nAcme,bad-email\nBeta,b@beta.io\n";
    let batch_id = test_helpers::stage_and_validate(&api, "customers", csv).await;

    let exported = api.export_error_rows_csv(&batch_id).await.unwrap();
    let mut reader = csv::Reader::from_reader(exported.as_bytes());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["row_number", "field", "message", "raw_data"]
    );

    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0][0], "1");
    assert_eq!(&records[0][1], "email");
    let raw: serde_json::Value = serde_json::from_str(&records[0][3]).unwrap();
    assert_eq!(raw["Email"], "bad-email");
}

#[tokio::test]
async fn test_settings_loaded_from_config_kv() {
    logging::init_test();
    let (_temp_file, db_path) = test_helpers::create_test_db().unwrap();

    // 先打开一次以初始化 schema
    drop(ImportApi::open(&db_path).await.unwrap());

    let config = ConfigManager::new(&db_path).unwrap();
    config
        .set_global_config_value(config_keys::PREVIEW_PAGE_LIMIT, "3")
        .unwrap();
    config
        .set_global_config_value(config_keys::DEFAULT_ACTOR, "importer-bot")
        .unwrap();
    drop(config);

    let api = ImportApi::open(&db_path).await.unwrap();
    assert_eq!(api.pipeline().settings().preview_page_limit, 3);
    assert_eq!(api.pipeline().settings().default_actor, "importer-bot");

    let batch = api
        .create_batch(
            "customers",
            "c.csv",
            test_helpers::CUSTOMERS_CSV.as_bytes().to_vec(),
            BTreeMap::new(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(batch.created_by, "importer-bot");
}
