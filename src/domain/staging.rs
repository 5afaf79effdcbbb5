// ==========================================
// 现场服务管理系统 - 暂存行领域模型
// ==========================================
// 对齐: v0.1_import_schema.sql import_staging_* 表（共用信封列）
// 红线: row_number 入库时分配一次，永不重排
// 红线: 存在校验错误的行不得提交
// ==========================================

use crate::domain::types::{EntityType, ValidationStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 原始行（列名 → 原值），原样保存用于审计与错误展示
pub type RawRow = HashMap<String, String>;

/// 映射后的行（目标字段 → 原值）
pub type MappedRow = BTreeMap<String, String>;

// ==========================================
// FieldError - 字段级校验错误
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ==========================================
// StagingRow - 暂存行（信封 + 实体字段）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingRow {
    // ===== 信封 =====
    pub id: String,
    pub batch_id: String,
    pub row_number: i64, // 1 基，对应原始解析序列中的位置（含被跳过行）
    pub raw_data: RawRow,

    // ===== 实体字段 =====
    pub fields: StagedFields,

    // ===== 校验结果 =====
    pub validation_status: ValidationStatus,
    pub validation_errors: Vec<FieldError>,

    // ===== 提交关联 =====
    pub imported_record_id: Option<String>,
}

impl StagingRow {
    pub fn entity_type(&self) -> EntityType {
        self.fields.entity_type()
    }
}

// ==========================================
// StagedFields - 各实体的强类型字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum StagedFields {
    Customers(CustomerFields),
    Ar(ArFields),
    Vendors(VendorFields),
    Items(ItemFields),
    History(HistoryFields),
}

impl StagedFields {
    pub fn entity_type(&self) -> EntityType {
        match self {
            StagedFields::Customers(_) => EntityType::Customers,
            StagedFields::Ar(_) => EntityType::Ar,
            StagedFields::Vendors(_) => EntityType::Vendors,
            StagedFields::Items(_) => EntityType::Items,
            StagedFields::History(_) => EntityType::History,
        }
    }

    /// 由映射后的行构造实体字段（空白 → None）
    pub fn from_mapped(entity_type: EntityType, row: &MappedRow) -> Self {
        let get = |key: &str| -> Option<String> {
            row.get(key).and_then(|v| {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };

        match entity_type {
            EntityType::Customers => StagedFields::Customers(CustomerFields {
                name: get("name"),
                email: get("email"),
                phone: get("phone"),
                address: get("address"),
                city: get("city"),
                state: get("state"),
                postal_code: get("postal_code"),
                external_customer_id: get("external_customer_id"),
                notes: get("notes"),
            }),
            EntityType::Ar => StagedFields::Ar(ArFields {
                invoice_number: get("invoice_number"),
                customer_identifier: get("customer_identifier"),
                customer_name: get("customer_name"),
                issue_date: get("issue_date"),
                due_date: get("due_date"),
                total_amount: get("total_amount"),
                balance_due: get("balance_due"),
                description: get("description"),
            }),
            EntityType::Vendors => StagedFields::Vendors(VendorFields {
                name: get("name"),
                email: get("email"),
                phone: get("phone"),
                address: get("address"),
                city: get("city"),
                state: get("state"),
                postal_code: get("postal_code"),
                vendor_code: get("vendor_code"),
                external_vendor_id: get("external_vendor_id"),
            }),
            EntityType::Items => StagedFields::Items(ItemFields {
                sku: get("sku"),
                name: get("name"),
                description: get("description"),
                category: get("category"),
                unit_cost: get("unit_cost"),
                unit_price: get("unit_price"),
                quantity_on_hand: get("quantity_on_hand"),
            }),
            EntityType::History => StagedFields::History(HistoryFields {
                record_type: get("record_type"),
                customer_identifier: get("customer_identifier"),
                customer_name: get("customer_name"),
                document_number: get("document_number"),
                document_date: get("document_date"),
                amount: get("amount"),
                description: get("description"),
            }),
        }
    }

    /// 去重键（自然标识）
    pub fn dedup_key(&self) -> Option<String> {
        match self {
            StagedFields::Customers(f) => f.external_customer_id.clone(),
            StagedFields::Ar(f) => match (&f.customer_identifier, &f.invoice_number) {
                (Some(c), Some(i)) => Some(format!("{}/{}", c, i)),
                _ => None,
            },
            StagedFields::Vendors(f) => f.vendor_code.clone().or_else(|| f.external_vendor_id.clone()),
            StagedFields::Items(f) => f.sku.clone(),
            StagedFields::History(f) => match (&f.record_type, &f.document_number) {
                (Some(t), Some(n)) => Some(format!("{}/{}", t.to_lowercase(), n)),
                _ => None,
            },
        }
    }

    /// 展示用标签（用于日志/回滚原因）
    pub fn display_label(&self) -> String {
        match self {
            StagedFields::Customers(f) => f.name.clone().unwrap_or_default(),
            StagedFields::Ar(f) => f.invoice_number.clone().unwrap_or_default(),
            StagedFields::Vendors(f) => f.name.clone().unwrap_or_default(),
            StagedFields::Items(f) => f.sku.clone().or_else(|| f.name.clone()).unwrap_or_default(),
            StagedFields::History(f) => f.document_number.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub external_customer_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArFields {
    pub invoice_number: Option<String>,
    pub customer_identifier: Option<String>, // 对应 customers.external_customer_id
    pub customer_name: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub total_amount: Option<String>,
    pub balance_due: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub vendor_code: Option<String>,
    pub external_vendor_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFields {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_cost: Option<String>,
    pub unit_price: Option<String>,
    pub quantity_on_hand: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryFields {
    pub record_type: Option<String>,
    pub customer_identifier: Option<String>,
    pub customer_name: Option<String>,
    pub document_number: Option<String>,
    pub document_date: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mapped_trims_and_nulls() {
        let mut row = MappedRow::new();
        row.insert("name".to_string(), "  Acme HVAC ".to_string());
        row.insert("email".to_string(), "   ".to_string());

        let fields = StagedFields::from_mapped(EntityType::Customers, &row);
        match fields {
            StagedFields::Customers(f) => {
                assert_eq!(f.name.as_deref(), Some("Acme HVAC"));
                assert_eq!(f.email, None);
                assert_eq!(f.phone, None);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_vendor_dedup_key_prefers_code() {
        let fields = StagedFields::Vendors(VendorFields {
            vendor_code: Some("V-01".to_string()),
            external_vendor_id: Some("EXT-9".to_string()),
            ..Default::default()
        });
        assert_eq!(fields.dedup_key().as_deref(), Some("V-01"));

        let fields = StagedFields::Vendors(VendorFields {
            external_vendor_id: Some("EXT-9".to_string()),
            ..Default::default()
        });
        assert_eq!(fields.dedup_key().as_deref(), Some("EXT-9"));
    }

    #[test]
    fn test_fields_json_is_tagged() {
        let fields = StagedFields::Items(ItemFields {
            sku: Some("SKU-1".to_string()),
            ..Default::default()
        });
        let json = serde_json::to_string(&fields).unwrap();
        assert!(json.contains("\"entity\":\"items\""));
        let back: StagedFields = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fields);
    }
}
