use crate::errors::AppError;
use crate::models::instance::TagPair;
use crate::services::Ctx;
use tracing::debug;
use uuid::Uuid;

const MAX_TAGS_PER_RESOURCE: usize = 50;

/// A tag joined with the record it lives on, for DescribeTags.
pub struct TagView {
    pub resource_id: Uuid,
    pub resource_type: &'static str,
    pub key: String,
}

/// Tags are plain strings on the record; AWS key/value pairs collapse to
/// `key` or `key=value`.
fn tag_string(pair: &TagPair) -> String {
    match pair.value.as_deref() {
        Some(value) if !value.is_empty() => format!("{}={}", pair.key, value),
        _ => pair.key.clone(),
    }
}

pub fn create_tags(
    ctx: &Ctx<'_>,
    resource_ids: &[Uuid],
    tags: &[TagPair],
) -> Result<(), AppError> {
    if tags.is_empty() {
        return Err(AppError::bad_request("At least one tag is required"));
    }
    for pair in tags {
        if pair.key.is_empty() || pair.key.len() > 128 {
            return Err(AppError::bad_request(format!(
                "Invalid tag key '{}'",
                pair.key
            )));
        }
    }

    for resource_id in resource_ids {
        let record = ctx
            .store
            .get(*resource_id)
            .filter(|r| r.account_id == ctx.account_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Resource '{}' not found", resource_id))
            })?;

        if record.tags.len() + tags.len() > MAX_TAGS_PER_RESOURCE {
            return Err(AppError::bad_request(format!(
                "Resource '{}' would exceed {} tags",
                resource_id, MAX_TAGS_PER_RESOURCE
            )));
        }

        for pair in tags {
            // duplicate adds are no-ops: the set stays unique
            let fresh = ctx.store.add_tag(*resource_id, &tag_string(pair));
            debug!(resource = %resource_id, tag = %pair.key, fresh = ?fresh, "tag added");
        }
    }
    Ok(())
}

pub fn delete_tags(
    ctx: &Ctx<'_>,
    resource_ids: &[Uuid],
    tags: &[TagPair],
) -> Result<(), AppError> {
    for resource_id in resource_ids {
        ctx.store
            .get(*resource_id)
            .filter(|r| r.account_id == ctx.account_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Resource '{}' not found", resource_id))
            })?;

        for pair in tags {
            ctx.store.remove_tag(*resource_id, &tag_string(pair));
        }
    }
    Ok(())
}

pub fn describe_tags(ctx: &Ctx<'_>) -> Vec<TagView> {
    use crate::models::EntityKind;

    let mut views = Vec::new();
    for kind in [
        EntityKind::Instance,
        EntityKind::Volume,
        EntityKind::Vpc,
        EntityKind::Subnet,
        EntityKind::SecurityGroup,
        EntityKind::BackupJob,
    ] {
        for record in ctx.store.list(&ctx.account_id, kind) {
            for tag in &record.tags {
                views.push(TagView {
                    resource_id: record.id,
                    resource_type: record.kind.as_str(),
                    key: tag.clone(),
                });
            }
        }
    }
    views
}

#[cfg(test)]
#[path = "tags_tests.rs"]
mod tests;
