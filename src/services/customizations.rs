use crate::errors::AppError;
use crate::models::ServiceStatus;
use crate::orchestrator::CustomizationSpec;
use crate::services::instances::get_owned_instance;
use crate::services::Ctx;
use crate::tasks;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

pub async fn describe_customizations(
    ctx: &Ctx<'_>,
) -> Result<Vec<CustomizationSpec>, AppError> {
    Ok(ctx.orchestrator.list_customizations().await?)
}

/// Applies a named customization spec to a running instance: backend POST
/// plus task wait in the lightweight deadline class.
pub async fn apply_customization(
    ctx: &Ctx<'_>,
    instance_id: Uuid,
    name: &str,
    args: &[(String, String)],
) -> Result<(), AppError> {
    let instance = get_owned_instance(ctx, instance_id)?;
    if instance.status != ServiceStatus::Active {
        return Err(AppError::conflict(format!(
            "Instance '{}' is {} and cannot be customized",
            instance_id,
            instance.status.as_str()
        )));
    }
    let resource = instance.resource_uuid.ok_or_else(|| {
        AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
    })?;

    let specs = ctx.orchestrator.list_customizations().await?;
    if !specs.iter().any(|spec| spec.name == name) {
        return Err(AppError::not_found(format!(
            "Customization '{}' not found",
            name
        )));
    }

    let payload = json!({
        "name": name,
        "args": args
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect::<Vec<_>>(),
    });

    ctx.store.set_status(instance_id, ServiceStatus::Updating);
    let result = async {
        let taskid = ctx
            .orchestrator
            .apply_customization(resource, &payload)
            .await?;
        tasks::wait_if_task(
            ctx.orchestrator,
            taskid.as_deref(),
            ctx.config.task_timeout(),
            ctx.config.poll_interval(),
        )
        .await
    }
    .await;

    if let Err(err) = result {
        ctx.store.set_error(instance_id, err.to_string());
        return Err(err.into());
    }
    ctx.store.set_status(instance_id, ServiceStatus::Active);

    info!(instance = %instance_id, customization = name, "customization applied");
    Ok(())
}
