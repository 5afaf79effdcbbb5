// ==========================================
// 现场服务管理系统 - 数据规范化器实现
// ==========================================
// 职责: 货币 / 日期 / 整数 文本规范化 + 入库跳过判定
// 红线: 纯函数，失败不抛出（货币 → NaN，日期 → None）
// ==========================================

use crate::domain::staging::RawRow;
use crate::domain::types::EntityType;
use crate::importer::import_traits::DataCleaner as DataCleanerTrait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// 应收报表中汇总行的发票列别名（精确匹配原始列名）
///
/// 已知局限: 若源文件发票列使用其他列名，汇总行不会被识别
pub const AR_INVOICE_HEADER_ALIASES: [&str; 3] = ["Invoice", "Invoice #", "Invoice#"];

const AR_SKIP_MARKERS: [&str; 3] = ["", "total", "payment"];

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];

/// 货币文本 → 数值
///
/// # 规则
/// - 空串 → 0
/// - 先去除货币符号、千分位逗号、空白
/// - 剩余部分整体包裹在括号内 → 负数（会计记法，`$(1.00)` 与 `($1.00)` 等价）
/// - 无法解析 → NaN（调用方必须视为无效）
pub fn parse_currency(value: &str) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();

    let (negative, body) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    match body.parse::<f64>() {
        Ok(n) if n.is_finite() => {
            if negative {
                -n
            } else {
                n
            }
        }
        _ => f64::NAN,
    }
}

/// 日期文本 → 日历日期（丢弃时间部分）
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

/// 非负整数文本（允许千分位逗号）
pub fn parse_non_negative_integer(value: &str) -> Option<i64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<i64>().ok().filter(|n| *n >= 0)
}

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn normalize_currency(&self, value: &str) -> f64 {
        parse_currency(value)
    }

    fn normalize_date(&self, value: &str) -> Option<NaiveDate> {
        parse_date(value)
    }

    fn should_skip_row(&self, entity_type: EntityType, row: &RawRow) -> bool {
        if row.values().all(|v| v.trim().is_empty()) {
            return true;
        }

        if entity_type == EntityType::Ar {
            let invoice_cell = AR_INVOICE_HEADER_ALIASES
                .iter()
                .find_map(|alias| row.get(*alias));
            if let Some(cell) = invoice_cell {
                let marker = cell.trim().to_lowercase();
                return AR_SKIP_MARKERS.contains(&marker.as_str());
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_currency_cases() {
        assert_eq!(parse_currency("$1,234.56"), 1234.56);
        assert_eq!(parse_currency("(123.45)"), -123.45);
        // 符号在括号内外均可
        assert_eq!(parse_currency("$(123.45)"), -123.45);
        assert_eq!(parse_currency("($123.45)"), -123.45);
        assert_eq!(parse_currency(" € ( 1,000 ) "), -1000.0);
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("  € 99 "), 99.0);
        assert_eq!(parse_currency("-15.5"), -15.5);
        assert!(parse_currency("abc").is_nan());
        assert!(parse_currency("$").is_nan());
        assert!(parse_currency("inf").is_nan());
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date("2024-03-15"), expected);
        assert_eq!(parse_date("03/15/2024"), expected);
        assert_eq!(parse_date("Mar 15, 2024"), expected);
        assert_eq!(parse_date("2024-03-15 08:30:00"), expected);
        assert_eq!(parse_date("2024-03-15T08:30:00Z"), expected);
        assert_eq!(parse_date("13/45/2024"), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_non_negative_integer() {
        assert_eq!(parse_non_negative_integer("1,200"), Some(1200));
        assert_eq!(parse_non_negative_integer("0"), Some(0));
        assert_eq!(parse_non_negative_integer("-3"), None);
        assert_eq!(parse_non_negative_integer("2.5"), None);
    }

    #[test]
    fn test_skip_blank_rows_for_every_entity() {
        let cleaner = DataCleaner;
        let blank = row(&[("Name", "  "), ("Email", "")]);
        for entity in EntityType::ALL {
            assert!(cleaner.should_skip_row(entity, &blank));
        }
    }

    #[test]
    fn test_ar_summary_rows_skipped() {
        let cleaner = DataCleaner;
        assert!(cleaner.should_skip_row(EntityType::Ar, &row(&[("Invoice", " Total "), ("Balance", "9")])));
        assert!(cleaner.should_skip_row(EntityType::Ar, &row(&[("Invoice #", "PAYMENT"), ("Balance", "9")])));
        assert!(cleaner.should_skip_row(EntityType::Ar, &row(&[("Invoice#", ""), ("Balance", "9")])));
        assert!(!cleaner.should_skip_row(EntityType::Ar, &row(&[("Invoice", "INV-1"), ("Balance", "9")])));

        // 其他列名不触发汇总行判定
        assert!(!cleaner.should_skip_row(EntityType::Ar, &row(&[("Inv No", "Total"), ("Balance", "9")])));
        // 非 AR 实体不做汇总行判定
        assert!(!cleaner.should_skip_row(EntityType::Customers, &row(&[("Invoice", "Total")])));
    }
}
