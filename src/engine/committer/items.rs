// 配件提交: 去重键 sku（无 sku 的行总是新建）

use super::ar::amount;
use super::{require, CommitContext, RowOutcome};
use crate::domain::live::Part;
use crate::domain::staging::ItemFields;
use crate::importer::data_cleaner::parse_non_negative_integer;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::import_store::ImportStore;
use chrono::Utc;
use uuid::Uuid;

fn optional_amount(value: &Option<String>, field: &str) -> ImportResult<Option<f64>> {
    value.as_deref().map(|raw| amount(raw, field)).transpose()
}

fn optional_quantity(value: &Option<String>) -> ImportResult<Option<i64>> {
    value
        .as_deref()
        .map(|raw| {
            parse_non_negative_integer(raw).ok_or_else(|| {
                ImportError::RowRejected(format!("quantity_on_hand 不是非负整数: {}", raw))
            })
        })
        .transpose()
}

pub(super) async fn commit_part<S>(
    ctx: &CommitContext<'_, S>,
    f: &ItemFields,
) -> ImportResult<RowOutcome>
where
    S: ImportStore + ?Sized,
{
    let name = require(&f.name, "name")?;
    let unit_cost = optional_amount(&f.unit_cost, "unit_cost")?;
    let unit_price = optional_amount(&f.unit_price, "unit_price")?;
    let quantity_on_hand = optional_quantity(&f.quantity_on_hand)?;
    let now = Utc::now();

    let existing = match f.sku.as_deref() {
        Some(sku) => ctx.store.find_part_by_sku(sku).await?,
        None => None,
    };

    if let Some(existing) = existing {
        let id = existing.id.clone();
        let updated = Part {
            name: name.to_string(),
            description: f.description.clone().or(existing.description.clone()),
            category: f.category.clone().or(existing.category.clone()),
            unit_cost: unit_cost.or(existing.unit_cost),
            unit_price: unit_price.or(existing.unit_price),
            quantity_on_hand: quantity_on_hand.or(existing.quantity_on_hand),
            updated_at: now,
            ..existing
        };
        ctx.store.update_part(&updated).await?;
        return Ok(RowOutcome::Updated(id));
    }

    let part = Part {
        id: Uuid::new_v4().to_string(),
        sku: f.sku.clone(),
        name: name.to_string(),
        description: f.description.clone(),
        category: f.category.clone(),
        unit_cost,
        unit_price,
        quantity_on_hand,
        import_batch_id: Some(ctx.batch_id.to_string()),
        created_by: ctx.actor.to_string(),
        updated_at: now,
    };
    ctx.store.insert_part(&part).await?;
    Ok(RowOutcome::Created(part.id))
}
