// 历史单据提交: 按 record_type 分派
// invoice → 已结清的历史发票（不生成过账分录）
// ticket  → 历史工单
// payment → 总是跳过（无收款核销逻辑）
// 已存在的历史单据跳过，不覆盖

use super::ar::amount;
use super::{require, CommitContext, RowOutcome};
use crate::domain::live::{Customer, Invoice, InvoiceLineItem, Ticket};
use crate::domain::staging::HistoryFields;
use crate::domain::types::HistoryRecordType;
use crate::importer::data_cleaner::parse_date;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::import_store::ImportStore;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

pub const PAYMENT_SKIP_REASON: &str = "收款记录暂不支持导入";

async fn resolve_customer<S>(ctx: &CommitContext<'_, S>, f: &HistoryFields) -> ImportResult<Customer>
where
    S: ImportStore + ?Sized,
{
    let customer_ref = require(&f.customer_identifier, "customer_identifier")?;
    ctx.store
        .find_customer_by_external_id(customer_ref)
        .await?
        .ok_or_else(|| {
            ImportError::RowRejected(format!("未找到外部编号为 {} 的客户", customer_ref))
        })
}

fn document_date(f: &HistoryFields) -> ImportResult<NaiveDate> {
    let raw = require(&f.document_date, "document_date")?;
    parse_date(raw)
        .ok_or_else(|| ImportError::RowRejected(format!("document_date 不是有效日期: {}", raw)))
}

pub(super) async fn commit_history<S>(
    ctx: &CommitContext<'_, S>,
    f: &HistoryFields,
) -> ImportResult<RowOutcome>
where
    S: ImportStore + ?Sized,
{
    let raw_type = require(&f.record_type, "record_type")?;
    let record_type = HistoryRecordType::parse(raw_type)
        .ok_or_else(|| ImportError::RowRejected(format!("未知的单据类型: {}", raw_type)))?;

    match record_type {
        HistoryRecordType::Payment => Ok(RowOutcome::Skipped(PAYMENT_SKIP_REASON.to_string())),
        HistoryRecordType::Invoice => commit_history_invoice(ctx, f).await,
        HistoryRecordType::Ticket => commit_history_ticket(ctx, f).await,
    }
}

async fn commit_history_invoice<S>(
    ctx: &CommitContext<'_, S>,
    f: &HistoryFields,
) -> ImportResult<RowOutcome>
where
    S: ImportStore + ?Sized,
{
    let number = require(&f.document_number, "document_number")?;
    let date = document_date(f)?;
    let total = match f.amount.as_deref() {
        Some(raw) => amount(raw, "amount")?,
        None => 0.0,
    };
    let customer = resolve_customer(ctx, f).await?;

    if ctx
        .store
        .find_invoice_for_customer(&customer.id, number)
        .await?
        .is_some()
    {
        return Ok(RowOutcome::Skipped(format!("历史发票 {} 已存在", number)));
    }

    let invoice = Invoice {
        id: Uuid::new_v4().to_string(),
        invoice_number: number.to_string(),
        customer_id: customer.id.clone(),
        issue_date: Some(date),
        due_date: None,
        total,
        balance_due: 0.0,
        status: "paid".to_string(),
        external_invoice_number: Some(number.to_string()),
        import_batch_id: Some(ctx.batch_id.to_string()),
        created_by: ctx.actor.to_string(),
        created_at: Utc::now(),
    };
    let line_item = InvoiceLineItem {
        id: Uuid::new_v4().to_string(),
        invoice_id: invoice.id.clone(),
        description: f
            .description
            .clone()
            .unwrap_or_else(|| format!("历史发票 {}", number)),
        quantity: 1.0,
        unit_price: total,
        amount: total,
    };

    ctx.store.insert_invoice(&invoice, &[line_item], &[]).await?;
    Ok(RowOutcome::Created(invoice.id))
}

async fn commit_history_ticket<S>(
    ctx: &CommitContext<'_, S>,
    f: &HistoryFields,
) -> ImportResult<RowOutcome>
where
    S: ImportStore + ?Sized,
{
    let number = require(&f.document_number, "document_number")?;
    let date = document_date(f)?;
    let ticket_amount = f
        .amount
        .as_deref()
        .map(|raw| amount(raw, "amount"))
        .transpose()?;
    let customer = resolve_customer(ctx, f).await?;

    if ctx.store.find_ticket(&customer.id, number).await?.is_some() {
        return Ok(RowOutcome::Skipped(format!("历史工单 {} 已存在", number)));
    }

    let ticket = Ticket {
        id: Uuid::new_v4().to_string(),
        customer_id: customer.id,
        ticket_number: number.to_string(),
        ticket_date: date,
        amount: ticket_amount,
        description: f.description.clone(),
        status: "completed".to_string(),
        import_batch_id: Some(ctx.batch_id.to_string()),
        created_by: ctx.actor.to_string(),
        created_at: Utc::now(),
    };
    ctx.store.insert_ticket(&ticket).await?;
    Ok(RowOutcome::Created(ticket.id))
}
