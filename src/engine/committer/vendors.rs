// 供应商提交: 先按 vendor_code 去重，其次 external_vendor_id

use super::{require, CommitContext, RowOutcome};
use crate::domain::live::Vendor;
use crate::domain::staging::VendorFields;
use crate::importer::error::ImportResult;
use crate::repository::import_store::ImportStore;
use chrono::Utc;
use uuid::Uuid;

async fn find_existing<S>(ctx: &CommitContext<'_, S>, f: &VendorFields) -> ImportResult<Option<Vendor>>
where
    S: ImportStore + ?Sized,
{
    if let Some(code) = f.vendor_code.as_deref() {
        if let Some(vendor) = ctx.store.find_vendor_by_code(code).await? {
            return Ok(Some(vendor));
        }
    }
    if let Some(external_id) = f.external_vendor_id.as_deref() {
        return Ok(ctx.store.find_vendor_by_external_id(external_id).await?);
    }
    Ok(None)
}

pub(super) async fn commit_vendor<S>(
    ctx: &CommitContext<'_, S>,
    f: &VendorFields,
) -> ImportResult<RowOutcome>
where
    S: ImportStore + ?Sized,
{
    let name = require(&f.name, "name")?;
    let now = Utc::now();

    if let Some(existing) = find_existing(ctx, f).await? {
        let id = existing.id.clone();
        let updated = Vendor {
            name: name.to_string(),
            email: f.email.clone().or(existing.email.clone()),
            phone: f.phone.clone().or(existing.phone.clone()),
            address: f.address.clone().or(existing.address.clone()),
            city: f.city.clone().or(existing.city.clone()),
            state: f.state.clone().or(existing.state.clone()),
            postal_code: f.postal_code.clone().or(existing.postal_code.clone()),
            vendor_code: f.vendor_code.clone().or(existing.vendor_code.clone()),
            external_vendor_id: f
                .external_vendor_id
                .clone()
                .or(existing.external_vendor_id.clone()),
            updated_at: now,
            ..existing
        };
        ctx.store.update_vendor(&updated).await?;
        return Ok(RowOutcome::Updated(id));
    }

    let vendor = Vendor {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: f.email.clone(),
        phone: f.phone.clone(),
        address: f.address.clone(),
        city: f.city.clone(),
        state: f.state.clone(),
        postal_code: f.postal_code.clone(),
        vendor_code: f.vendor_code.clone(),
        external_vendor_id: f.external_vendor_id.clone(),
        import_batch_id: Some(ctx.batch_id.to_string()),
        created_by: ctx.actor.to_string(),
        updated_at: now,
    };
    ctx.store.insert_vendor(&vendor).await?;
    Ok(RowOutcome::Created(vendor.id))
}
