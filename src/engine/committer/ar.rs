// 期初应收提交: 客户按 external_customer_id 匹配，发票按 (客户, 外部发票号) 去重
// 已存在的发票跳过而不是报错; 新发票同时生成明细行与期初过账分录

use super::{require, CommitContext, RowOutcome};
use crate::domain::live::{GlEntry, Invoice, InvoiceLineItem};
use crate::domain::staging::ArFields;
use crate::importer::data_cleaner::{parse_currency, parse_date};
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::import_store::ImportStore;
use chrono::Utc;
use uuid::Uuid;

pub const ACCOUNTS_RECEIVABLE: &str = "accounts_receivable";
pub const OPENING_BALANCE_EQUITY: &str = "opening_balance_equity";

/// 金额文本 → 有限数值
pub(super) fn amount(value: &str, field: &str) -> ImportResult<f64> {
    let parsed = parse_currency(value);
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ImportError::RowRejected(format!(
            "{} 不是有效金额: {}",
            field, value
        )))
    }
}

pub(super) async fn commit_invoice<S>(
    ctx: &CommitContext<'_, S>,
    f: &ArFields,
) -> ImportResult<RowOutcome>
where
    S: ImportStore + ?Sized,
{
    let invoice_number = require(&f.invoice_number, "invoice_number")?;
    let customer_ref = require(&f.customer_identifier, "customer_identifier")?;
    let balance = amount(require(&f.balance_due, "balance_due")?, "balance_due")?;
    let total = match f.total_amount.as_deref() {
        Some(raw) => amount(raw, "total_amount")?,
        None => balance,
    };

    let customer = ctx
        .store
        .find_customer_by_external_id(customer_ref)
        .await?
        .ok_or_else(|| {
            ImportError::RowRejected(format!("未找到外部编号为 {} 的客户", customer_ref))
        })?;

    if ctx
        .store
        .find_invoice_for_customer(&customer.id, invoice_number)
        .await?
        .is_some()
    {
        return Ok(RowOutcome::Skipped(format!(
            "发票 {} 已存在于客户 {}",
            invoice_number, customer.name
        )));
    }

    let now = Utc::now();
    let issue_date = f.issue_date.as_deref().and_then(parse_date);
    let invoice = Invoice {
        id: Uuid::new_v4().to_string(),
        invoice_number: invoice_number.to_string(),
        customer_id: customer.id.clone(),
        issue_date,
        due_date: f.due_date.as_deref().and_then(parse_date),
        total,
        balance_due: balance,
        status: if balance > 0.0 { "open" } else { "paid" }.to_string(),
        external_invoice_number: Some(invoice_number.to_string()),
        import_batch_id: Some(ctx.batch_id.to_string()),
        created_by: ctx.actor.to_string(),
        created_at: now,
    };

    let description = f
        .description
        .clone()
        .unwrap_or_else(|| format!("期初余额 - 发票 {}", invoice_number));
    let line_item = InvoiceLineItem {
        id: Uuid::new_v4().to_string(),
        invoice_id: invoice.id.clone(),
        description,
        quantity: 1.0,
        unit_price: total,
        amount: total,
    };

    let entry_date = issue_date.unwrap_or_else(|| now.date_naive());
    let memo = Some(format!("期初应收导入: 发票 {}", invoice_number));
    let gl_entries = [
        GlEntry {
            id: Uuid::new_v4().to_string(),
            invoice_id: Some(invoice.id.clone()),
            account: ACCOUNTS_RECEIVABLE.to_string(),
            debit: balance,
            credit: 0.0,
            entry_date,
            memo: memo.clone(),
            import_batch_id: Some(ctx.batch_id.to_string()),
        },
        GlEntry {
            id: Uuid::new_v4().to_string(),
            invoice_id: Some(invoice.id.clone()),
            account: OPENING_BALANCE_EQUITY.to_string(),
            debit: 0.0,
            credit: balance,
            entry_date,
            memo,
            import_batch_id: Some(ctx.batch_id.to_string()),
        },
    ];

    ctx.store
        .insert_invoice(&invoice, &[line_item], &gl_entries)
        .await?;
    Ok(RowOutcome::Created(invoice.id))
}
