// 客户提交: 去重键 external_customer_id

use super::{require, CommitContext, RowOutcome};
use crate::domain::live::{Customer, CustomerLocation};
use crate::domain::staging::CustomerFields;
use crate::importer::error::ImportResult;
use crate::repository::import_store::ImportStore;
use chrono::Utc;
use uuid::Uuid;

fn build_location(
    customer_id: &str,
    f: &CustomerFields,
    batch_id: Option<&str>,
) -> Option<CustomerLocation> {
    if f.address.is_none() && f.city.is_none() && f.state.is_none() && f.postal_code.is_none() {
        return None;
    }

    Some(CustomerLocation {
        id: Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        address: f.address.clone(),
        city: f.city.clone(),
        state: f.state.clone(),
        postal_code: f.postal_code.clone(),
        is_primary: true,
        import_batch_id: batch_id.map(str::to_string),
    })
}

pub(super) async fn commit_customer<S>(
    ctx: &CommitContext<'_, S>,
    f: &CustomerFields,
) -> ImportResult<RowOutcome>
where
    S: ImportStore + ?Sized,
{
    let name = require(&f.name, "name")?;
    let now = Utc::now();

    if let Some(external_id) = f.external_customer_id.as_deref() {
        if let Some(existing) = ctx.store.find_customer_by_external_id(external_id).await? {
            let id = existing.id.clone();
            let updated = Customer {
                name: name.to_string(),
                email: f.email.clone().or(existing.email.clone()),
                phone: f.phone.clone().or(existing.phone.clone()),
                notes: f.notes.clone().or(existing.notes.clone()),
                updated_by: Some(ctx.actor.to_string()),
                updated_at: now,
                ..existing
            };
            let location = build_location(&id, f, None);
            ctx.store.update_customer(&updated, location.as_ref()).await?;
            return Ok(RowOutcome::Updated(id));
        }
    }

    let customer = Customer {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: f.email.clone(),
        phone: f.phone.clone(),
        notes: f.notes.clone(),
        external_customer_id: f.external_customer_id.clone(),
        import_batch_id: Some(ctx.batch_id.to_string()),
        created_by: ctx.actor.to_string(),
        created_at: now,
        updated_by: None,
        updated_at: now,
    };
    let location = build_location(&customer.id, f, Some(ctx.batch_id));
    ctx.store.insert_customer(&customer, location.as_ref()).await?;
    Ok(RowOutcome::Created(customer.id))
}
