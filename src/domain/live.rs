// ==========================================
// 现场服务管理系统 - 业务实体（导入目标）
// ==========================================
// 用途: 提交阶段写入的正式业务记录
// 红线: 由导入新建的记录必须带 import_batch_id，更新的记录不改写该标记
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub external_customer_id: Option<String>,
    pub import_batch_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// 客户地址（客户的直属子记录）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerLocation {
    pub id: String,
    pub customer_id: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub is_primary: bool,
    pub import_batch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub total: f64,
    pub balance_due: f64,
    pub status: String,
    pub external_invoice_number: Option<String>,
    pub import_batch_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: String,
    pub invoice_id: String,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

// 总账分录（期初应收过账）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlEntry {
    pub id: String,
    pub invoice_id: Option<String>,
    pub account: String,
    pub debit: f64,
    pub credit: f64,
    pub entry_date: NaiveDate,
    pub memo: Option<String>,
    pub import_batch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub vendor_code: Option<String>,
    pub external_vendor_id: Option<String>,
    pub import_batch_id: Option<String>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit_cost: Option<f64>,
    pub unit_price: Option<f64>,
    pub quantity_on_hand: Option<i64>,
    pub import_batch_id: Option<String>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
}

// 历史工单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub customer_id: String,
    pub ticket_number: String,
    pub ticket_date: NaiveDate,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub status: String,
    pub import_batch_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// 删除安全性判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl DeletionCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}
