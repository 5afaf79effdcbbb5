use super::*;
use crate::domain::staging::{ArFields, CustomerFields, HistoryFields, ItemFields, VendorFields};
use crate::domain::types::{EntityType, LogLevel};
use crate::repository::import_store::{
    BatchLogRepository, BatchRepository, LiveRecordRepository, StagingRepository,
};
use crate::repository::SqliteImportStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

struct NeverCancel;

#[async_trait]
impl CancellationProbe for NeverCancel {
    async fn is_cancelled(&self, _batch_id: &str) -> ImportResult<bool> {
        Ok(false)
    }
}

/// 第 n 次检查时返回已取消
struct CancelOnCheck {
    target: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl CancellationProbe for CancelOnCheck {
    async fn is_cancelled(&self, _batch_id: &str) -> ImportResult<bool> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(n >= self.target)
    }
}

async fn seed_batch(store: &SqliteImportStore, batch_id: &str, entity_type: EntityType) -> ImportBatch {
    let batch = ImportBatch::new(
        batch_id.to_string(),
        format!("IMP-20250101-{}", batch_id),
        entity_type,
        "file.csv".to_string(),
        64,
        "tester".to_string(),
    );
    store.insert_batch(&batch).await.unwrap();
    batch
}

async fn seed_rows(store: &SqliteImportStore, batch_id: &str, fields: Vec<StagedFields>) {
    for (idx, f) in fields.into_iter().enumerate() {
        let row = StagingRow {
            id: format!("{}-{}", batch_id, idx + 1),
            batch_id: batch_id.to_string(),
            row_number: (idx + 1) as i64,
            raw_data: HashMap::new(),
            fields: f,
            validation_status: ValidationStatus::Valid,
            validation_errors: Vec::new(),
            imported_record_id: None,
        };
        store.insert_staging_row(&row).await.unwrap();
    }
}

fn customer(name: &str, external_id: &str) -> StagedFields {
    StagedFields::Customers(CustomerFields {
        name: Some(name.to_string()),
        external_customer_id: Some(external_id.to_string()),
        city: Some("Springfield".to_string()),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_customers_second_import_updates() {
    let store = SqliteImportStore::in_memory().unwrap();
    let settings = ImportSettings::default();

    let first = seed_batch(&store, "c1", EntityType::Customers).await;
    seed_rows(&store, "c1", vec![customer("Acme", "EXT-1"), customer("Beta", "EXT-2")]).await;
    let summary = Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&first)
        .await
        .unwrap();
    assert_eq!(summary.created, 2);

    let second = seed_batch(&store, "c2", EntityType::Customers).await;
    seed_rows(&store, "c2", vec![customer("Acme Renamed", "EXT-1")]).await;
    let summary = Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&second)
        .await
        .unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 0);

    let updated = store.find_customer_by_external_id("EXT-1").await.unwrap().unwrap();
    assert_eq!(updated.name, "Acme Renamed");
    assert_eq!(updated.import_batch_id.as_deref(), Some("c1"));

    let rows = store
        .list_staging_rows(EntityType::Customers, "c2", None, None, 0)
        .await
        .unwrap();
    assert_eq!(rows[0].imported_record_id.as_deref(), Some(updated.id.as_str()));

    let stored = store.find_batch("c2").await.unwrap().unwrap();
    assert_eq!(stored.committed_rows, 1);
    assert_eq!(stored.rows_imported, 1);
}

#[tokio::test]
async fn test_ar_skips_existing_and_errors_on_unknown_customer() {
    let store = SqliteImportStore::in_memory().unwrap();
    let settings = ImportSettings::default();

    let cust = seed_batch(&store, "c1", EntityType::Customers).await;
    seed_rows(&store, "c1", vec![customer("Acme", "EXT-1")]).await;
    Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&cust)
        .await
        .unwrap();

    let invoice = |number: &str, customer_ref: &str| {
        StagedFields::Ar(ArFields {
            invoice_number: Some(number.to_string()),
            customer_identifier: Some(customer_ref.to_string()),
            balance_due: Some("$1,200.00".to_string()),
            issue_date: Some("2024-12-01".to_string()),
            ..Default::default()
        })
    };

    let ar = seed_batch(&store, "a1", EntityType::Ar).await;
    seed_rows(
        &store,
        "a1",
        vec![
            invoice("INV-1", "EXT-1"),
            invoice("INV-1", "EXT-1"),
            invoice("INV-2", "EXT-404"),
        ],
    )
    .await;
    let summary = Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&ar)
        .await
        .unwrap();

    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors, 1);

    let invoices = store.list_batch_invoices("a1").await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].balance_due, 1200.0);
    assert_eq!(invoices[0].status, "open");

    let errors = store.list_events("a1", Some(LogLevel::Error)).await.unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("第 3 行"));
    let warnings = store.list_events("a1", Some(LogLevel::Warning)).await.unwrap();
    assert_eq!(warnings.len(), 1);
}

#[tokio::test]
async fn test_history_payment_always_skipped() {
    let store = SqliteImportStore::in_memory().unwrap();
    let settings = ImportSettings::default();

    let cust = seed_batch(&store, "c1", EntityType::Customers).await;
    seed_rows(&store, "c1", vec![customer("Acme", "EXT-1")]).await;
    Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&cust)
        .await
        .unwrap();

    let doc = |record_type: &str, number: &str| {
        StagedFields::History(HistoryFields {
            record_type: Some(record_type.to_string()),
            customer_identifier: Some("EXT-1".to_string()),
            document_number: Some(number.to_string()),
            document_date: Some("2023-06-15".to_string()),
            amount: Some("250".to_string()),
            ..Default::default()
        })
    };

    let history = seed_batch(&store, "h1", EntityType::History).await;
    seed_rows(
        &store,
        "h1",
        vec![doc("Payment", "PMT-1"), doc("ticket", "T-100"), doc("INVOICE", "H-1")],
    )
    .await;
    let summary = Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&history)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.errors, 0);

    let acme = store.find_customer_by_external_id("EXT-1").await.unwrap().unwrap();
    assert!(store.find_ticket(&acme.id, "T-100").await.unwrap().is_some());
    let paid = store
        .find_invoice_for_customer(&acme.id, "H-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(paid.status, "paid");
    assert_eq!(paid.balance_due, 0.0);
}

#[tokio::test]
async fn test_vendor_and_item_dedup() {
    let store = SqliteImportStore::in_memory().unwrap();
    let settings = ImportSettings::default();

    let vendors = seed_batch(&store, "v1", EntityType::Vendors).await;
    seed_rows(
        &store,
        "v1",
        vec![
            StagedFields::Vendors(VendorFields {
                name: Some("Parts Co".to_string()),
                vendor_code: Some("PC".to_string()),
                ..Default::default()
            }),
            StagedFields::Vendors(VendorFields {
                name: Some("Parts Company".to_string()),
                vendor_code: Some("PC".to_string()),
                email: Some("ap@parts.co".to_string()),
                ..Default::default()
            }),
        ],
    )
    .await;
    let summary = Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&vendors)
        .await
        .unwrap();
    assert_eq!((summary.created, summary.updated), (1, 1));
    let vendor = store.find_vendor_by_code("PC").await.unwrap().unwrap();
    assert_eq!(vendor.name, "Parts Company");
    assert_eq!(vendor.email.as_deref(), Some("ap@parts.co"));

    let items = seed_batch(&store, "i1", EntityType::Items).await;
    seed_rows(
        &store,
        "i1",
        vec![
            StagedFields::Items(ItemFields {
                sku: Some("FLT-16".to_string()),
                name: Some("Filter 16x25".to_string()),
                unit_cost: Some("4.50".to_string()),
                ..Default::default()
            }),
            StagedFields::Items(ItemFields {
                sku: Some("FLT-16".to_string()),
                name: Some("Filter 16x25x1".to_string()),
                quantity_on_hand: Some("12".to_string()),
                ..Default::default()
            }),
        ],
    )
    .await;
    let summary = Committer::new(&store, &NeverCancel, &settings, "tester")
        .run(&items)
        .await
        .unwrap();
    assert_eq!((summary.created, summary.updated), (1, 1));
    let part = store.find_part_by_sku("FLT-16").await.unwrap().unwrap();
    assert_eq!(part.unit_cost, Some(4.5));
    assert_eq!(part.quantity_on_hand, Some(12));
}

#[tokio::test]
async fn test_cancel_observed_at_checkpoint() {
    let store = SqliteImportStore::in_memory().unwrap();
    let settings = ImportSettings {
        commit_checkpoint_rows: 2,
        ..ImportSettings::default()
    };

    let batch = seed_batch(&store, "c1", EntityType::Customers).await;
    let rows = (0..6)
        .map(|i| customer(&format!("Customer {}", i), &format!("EXT-{}", i)))
        .collect();
    seed_rows(&store, "c1", rows).await;

    let probe = CancelOnCheck {
        target: 2,
        calls: AtomicUsize::new(0),
    };
    let err = Committer::new(&store, &probe, &settings, "tester")
        .run(&batch)
        .await
        .unwrap_err();
    match err {
        ImportError::Cancelled { processed, .. } => assert_eq!(processed, 4),
        other => panic!("unexpected error: {:?}", other),
    }

    // 已提交的行保持提交
    assert_eq!(store.list_batch_customers("c1").await.unwrap().len(), 4);
    let stored = store.find_batch("c1").await.unwrap().unwrap();
    assert_eq!(stored.committed_rows, 4);
    let warnings = store.list_events("c1", Some(LogLevel::Warning)).await.unwrap();
    assert_eq!(warnings.len(), 1);
}
