// ==========================================
// 现场服务管理系统 - 暂存行校验器实现
// ==========================================
// 职责: 按实体类型的规则集校验暂存行 → 有序字段错误列表
// 红线: 纯函数，不抛出; 同一输入永远得到同一输出（可重复执行）
// ==========================================

use crate::domain::staging::{
    ArFields, CustomerFields, FieldError, HistoryFields, ItemFields, StagedFields, VendorFields,
};
use crate::domain::types::HistoryRecordType;
use crate::importer::data_cleaner::{parse_currency, parse_date, parse_non_negative_integer};
use crate::importer::import_traits::RowValidator;
use regex::Regex;
use std::sync::OnceLock;

const MIN_PHONE_DIGITS: usize = 10;

/// 静态正则只编译一次; 编译失败时为 None，对应字段按无效处理
fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok()).as_ref()
}

fn phone_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9\s()+\-]+$").ok()).as_ref()
}

// ==========================================
// 单字段规则
// ==========================================

fn require(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>, label: &str) {
    if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
        errors.push(FieldError::new(field, format!("{}不能为空", label)));
    }
}

fn check_email(errors: &mut Vec<FieldError>, value: &Option<String>) {
    if let Some(email) = value {
        if !email_regex().is_some_and(|re| re.is_match(email.trim())) {
            errors.push(FieldError::new("email", format!("邮箱格式无效: {}", email)));
        }
    }
}

fn check_phone(errors: &mut Vec<FieldError>, value: &Option<String>) {
    if let Some(phone) = value {
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        if !phone_regex().is_some_and(|re| re.is_match(phone.trim())) {
            errors.push(FieldError::new("phone", format!("电话号码含非法字符: {}", phone)));
        } else if digits < MIN_PHONE_DIGITS {
            errors.push(FieldError::new(
                "phone",
                format!("电话号码至少需要 {} 位数字: {}", MIN_PHONE_DIGITS, phone),
            ));
        }
    }
}

fn check_date(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>) {
    if let Some(text) = value {
        if parse_date(text).is_none() {
            errors.push(FieldError::new(field, format!("日期无效: {}", text)));
        }
    }
}

fn check_non_negative_amount(errors: &mut Vec<FieldError>, field: &str, value: &Option<String>) {
    if let Some(text) = value {
        let amount = parse_currency(text);
        if amount.is_nan() {
            errors.push(FieldError::new(field, format!("不是有效数字: {}", text)));
        } else if amount < 0.0 {
            errors.push(FieldError::new(field, format!("不能为负数: {}", text)));
        }
    }
}

// ==========================================
// 各实体规则集
// ==========================================

fn validate_contact(
    errors: &mut Vec<FieldError>,
    name: &Option<String>,
    email: &Option<String>,
    phone: &Option<String>,
) {
    require(errors, "name", name, "名称");
    check_email(errors, email);
    check_phone(errors, phone);
}

fn validate_customer(f: &CustomerFields) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_contact(&mut errors, &f.name, &f.email, &f.phone);
    errors
}

fn validate_vendor(f: &VendorFields) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_contact(&mut errors, &f.name, &f.email, &f.phone);
    errors
}

fn validate_ar(f: &ArFields) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require(&mut errors, "invoice_number", &f.invoice_number, "发票号");
    require(&mut errors, "balance_due", &f.balance_due, "未结余额");
    check_non_negative_amount(&mut errors, "balance_due", &f.balance_due);
    require(&mut errors, "customer_identifier", &f.customer_identifier, "客户标识");
    check_date(&mut errors, "issue_date", &f.issue_date);
    check_date(&mut errors, "due_date", &f.due_date);
    errors
}

fn validate_item(f: &ItemFields) -> Vec<FieldError> {
    let mut errors = Vec::new();
    require(&mut errors, "name", &f.name, "名称");
    check_non_negative_amount(&mut errors, "unit_cost", &f.unit_cost);
    check_non_negative_amount(&mut errors, "unit_price", &f.unit_price);
    if let Some(qty) = &f.quantity_on_hand {
        if parse_non_negative_integer(qty).is_none() {
            errors.push(FieldError::new(
                "quantity_on_hand",
                format!("库存数量必须为非负整数: {}", qty),
            ));
        }
    }
    errors
}

fn validate_history(f: &HistoryFields) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match &f.record_type {
        None => errors.push(FieldError::new("record_type", "记录类型不能为空")),
        Some(t) if HistoryRecordType::parse(t).is_none() => errors.push(FieldError::new(
            "record_type",
            format!("记录类型必须为 invoice / payment / ticket 之一: {}", t),
        )),
        Some(_) => {}
    }

    require(&mut errors, "customer_identifier", &f.customer_identifier, "客户标识");
    require(&mut errors, "document_number", &f.document_number, "单据号");

    if f.document_date.is_none() {
        errors.push(FieldError::new("document_date", "单据日期不能为空"));
    } else {
        check_date(&mut errors, "document_date", &f.document_date);
    }

    if let Some(amount) = &f.amount {
        if parse_currency(amount).is_nan() {
            errors.push(FieldError::new("amount", format!("不是有效数字: {}", amount)));
        }
    }

    errors
}

// ==========================================
// DqValidator - 规则集分发
// ==========================================
pub struct DqValidator;

impl RowValidator for DqValidator {
    fn validate(&self, fields: &StagedFields) -> Vec<FieldError> {
        match fields {
            StagedFields::Customers(f) => validate_customer(f),
            StagedFields::Ar(f) => validate_ar(f),
            StagedFields::Vendors(f) => validate_vendor(f),
            StagedFields::Items(f) => validate_item(f),
            StagedFields::History(f) => validate_history(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_static_patterns_compile() {
        assert!(email_regex().is_some());
        assert!(phone_regex().is_some());
    }

    #[test]
    fn test_customer_rules() {
        let v = DqValidator;
        let ok = StagedFields::Customers(CustomerFields {
            name: s("Acme HVAC"),
            email: s("ops@acme.com"),
            phone: s("(512) 555-0100"),
            ..Default::default()
        });
        assert!(v.validate(&ok).is_empty());

        let bad = StagedFields::Customers(CustomerFields {
            name: None,
            email: s("not-an-email"),
            phone: s("555-0100"),
            ..Default::default()
        });
        let errors = v.validate(&bad);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "email", "phone"]);
    }

    #[test]
    fn test_phone_rejects_letters() {
        let v = DqValidator;
        let fields = StagedFields::Vendors(VendorFields {
            name: s("Parts Co"),
            phone: s("512-555-01OO ext"),
            ..Default::default()
        });
        let errors = v.validate(&fields);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "phone");
    }

    #[test]
    fn test_ar_rules() {
        let v = DqValidator;
        let ok = StagedFields::Ar(ArFields {
            invoice_number: s("INV-1"),
            customer_identifier: s("C-1"),
            balance_due: s("$1,200.00"),
            due_date: s("2024-02-01"),
            ..Default::default()
        });
        assert!(v.validate(&ok).is_empty());

        let bad = StagedFields::Ar(ArFields {
            invoice_number: s("INV-2"),
            balance_due: s("(50.00)"),
            issue_date: s("someday"),
            ..Default::default()
        });
        let errors = v.validate(&bad);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["balance_due", "customer_identifier", "issue_date"]);
    }

    #[test]
    fn test_item_rules() {
        let v = DqValidator;
        let bad = StagedFields::Items(ItemFields {
            name: s("Filter"),
            unit_cost: s("abc"),
            unit_price: s("-1"),
            quantity_on_hand: s("2.5"),
            ..Default::default()
        });
        let errors = v.validate(&bad);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["unit_cost", "unit_price", "quantity_on_hand"]);
    }

    #[test]
    fn test_history_rules() {
        let v = DqValidator;
        let ok = StagedFields::History(HistoryFields {
            record_type: s("PAYMENT"),
            customer_identifier: s("C-1"),
            document_number: s("P-100"),
            document_date: s("01/05/2023"),
            amount: s("-25.00"),
            ..Default::default()
        });
        assert!(v.validate(&ok).is_empty());

        let bad = StagedFields::History(HistoryFields {
            record_type: s("estimate"),
            customer_identifier: s("C-1"),
            document_number: s("E-1"),
            ..Default::default()
        });
        let errors = v.validate(&bad);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["record_type", "document_date"]);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let v = DqValidator;
        let fields = StagedFields::Customers(CustomerFields {
            email: s("x@"),
            ..Default::default()
        });
        assert_eq!(v.validate(&fields), v.validate(&fields));
    }
}
