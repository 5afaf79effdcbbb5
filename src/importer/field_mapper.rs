// ==========================================
// 现场服务管理系统 - 字段映射器实现
// ==========================================
// 职责: 源列名 → 目标字段 自动映射（同义词子串匹配）+ 用户覆盖
// 规则: 大小写不敏感; 每个目标字段按列顺序扫描，首个命中列胜出
// 未命中的目标字段保持缺省，不填默认值
// ==========================================

use crate::domain::staging::{MappedRow, RawRow};
use crate::domain::types::EntityType;
use crate::importer::import_traits::FieldMapper;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ColumnMapping - 列映射（目标字段 → 源列名）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    fields: BTreeMap<String, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &str) -> Option<&str> {
        self.fields.get(target).map(String::as_str)
    }

    /// 设置或覆盖单个字段的映射
    pub fn set(&mut self, target: &str, header: &str) {
        self.fields.insert(target.to_string(), header.to_string());
    }

    pub fn remove(&mut self, target: &str) -> Option<String> {
        self.fields.remove(target)
    }

    /// 合并用户覆盖（覆盖优先）
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (target, header) in overrides {
            if header.trim().is_empty() {
                self.fields.remove(target);
            } else {
                self.fields.insert(target.clone(), header.clone());
            }
        }
        self
    }

    /// 丢弃不属于该实体字段目录的映射
    pub fn retain_known(&mut self, entity_type: EntityType) {
        let known = entity_type.target_fields();
        self.fields.retain(|target, _| known.contains(&target.as_str()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn unmapped_fields(&self, entity_type: EntityType) -> Vec<&'static str> {
        entity_type
            .target_fields()
            .iter()
            .copied()
            .filter(|f| !self.fields.contains_key(*f))
            .collect()
    }

    /// 应用映射: 原始行 → 目标字段行（源列缺失时跳过该字段）
    pub fn apply(&self, raw: &RawRow) -> MappedRow {
        self.fields
            .iter()
            .filter_map(|(target, header)| {
                raw.get(header).map(|value| (target.clone(), value.clone()))
            })
            .collect()
    }
}

// ==========================================
// 同义词表（全部小写，子串匹配）
// ==========================================
fn synonyms(entity_type: EntityType, target: &str) -> &'static [&'static str] {
    match (entity_type, target) {
        // ===== 客户 / 供应商 通用联系字段 =====
        (EntityType::Customers, "name") => &["customer name", "company", "name"],
        (EntityType::Vendors, "name") => &["vendor name", "supplier name", "company", "name"],
        (EntityType::Customers | EntityType::Vendors, "email") => &["email", "e-mail", "mail"],
        (EntityType::Customers | EntityType::Vendors, "phone") => {
            &["phone", "telephone", "tel", "mobile", "cell"]
        }
        (EntityType::Customers | EntityType::Vendors, "address") => {
            &["address", "street", "addr"]
        }
        (EntityType::Customers | EntityType::Vendors, "city") => &["city", "town"],
        (EntityType::Customers | EntityType::Vendors, "state") => {
            &["state", "province", "region"]
        }
        (EntityType::Customers | EntityType::Vendors, "postal_code") => {
            &["postal", "zip", "postcode", "post code"]
        }
        (EntityType::Customers, "external_customer_id") => &[
            "external_customer_id",
            "customer id",
            "customer_id",
            "customer #",
            "customer no",
            "account",
            "external id",
        ],
        (EntityType::Customers, "notes") => &["notes", "note", "comment", "memo"],
        (EntityType::Vendors, "vendor_code") => &["vendor_code", "vendor code", "code"],
        (EntityType::Vendors, "external_vendor_id") => &[
            "external_vendor_id",
            "vendor id",
            "vendor_id",
            "vendor #",
            "supplier id",
            "external id",
        ],

        // ===== 应收账款 =====
        (EntityType::Ar, "invoice_number") => &[
            "invoice_number",
            "invoice number",
            "invoice #",
            "invoice#",
            "invoice no",
            "inv #",
            "invoice",
            "num",
        ],
        (EntityType::Ar | EntityType::History, "customer_identifier") => &[
            "customer_identifier",
            "customer id",
            "customer_id",
            "customer #",
            "customer no",
            "account",
            "external id",
        ],
        (EntityType::Ar | EntityType::History, "customer_name") => {
            &["customer name", "customer_name", "client", "name"]
        }
        (EntityType::Ar, "issue_date") => &["issue_date", "issue date", "invoice date", "date"],
        (EntityType::Ar, "due_date") => &["due_date", "due date", "due"],
        (EntityType::Ar, "total_amount") => &[
            "total_amount",
            "total amount",
            "original amount",
            "invoice amount",
            "amount",
            "total",
        ],
        (EntityType::Ar, "balance_due") => &[
            "balance_due",
            "balance due",
            "balance",
            "amount_due",
            "amount due",
            "outstanding",
            "open balance",
        ],
        (EntityType::Ar | EntityType::Items | EntityType::History, "description") => {
            &["description", "memo", "details", "desc"]
        }

        // ===== 配件 =====
        (EntityType::Items, "sku") => &["sku", "part number", "part #", "part no", "item code"],
        (EntityType::Items, "name") => &["item name", "part name", "product", "name", "item"],
        (EntityType::Items, "category") => &["category", "type", "group", "class"],
        (EntityType::Items, "unit_cost") => &["unit_cost", "unit cost", "cost"],
        (EntityType::Items, "unit_price") => {
            &["unit_price", "unit price", "sales price", "price", "rate"]
        }
        (EntityType::Items, "quantity_on_hand") => &[
            "quantity_on_hand",
            "quantity on hand",
            "qty on hand",
            "on hand",
            "quantity",
            "qty",
            "stock",
        ],

        // ===== 历史单据 =====
        (EntityType::History, "record_type") => {
            &["record_type", "record type", "transaction type", "type"]
        }
        (EntityType::History, "document_number") => &[
            "document_number",
            "document number",
            "doc #",
            "doc no",
            "number",
            "num",
            "ref",
        ],
        (EntityType::History, "document_date") => {
            &["document_date", "document date", "transaction date", "date"]
        }
        (EntityType::History, "amount") => &["amount", "total", "value"],

        _ => &[],
    }
}

// ==========================================
// SynonymFieldMapper - 同义词映射器
// ==========================================
pub struct SynonymFieldMapper;

impl FieldMapper for SynonymFieldMapper {
    fn suggest_mapping(&self, entity_type: EntityType, headers: &[String]) -> ColumnMapping {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut mapping = ColumnMapping::new();

        for target in entity_type.target_fields() {
            let candidates = synonyms(entity_type, target);
            let hit = lowered
                .iter()
                .position(|header| candidates.iter().any(|syn| header.contains(syn)));

            if let Some(idx) = hit {
                mapping.set(target, &headers[idx]);
            }
        }

        mapping
    }
}
