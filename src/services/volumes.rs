use crate::errors::AppError;
use crate::models::status::project_volume_state;
use crate::models::{EntityKind, ServiceInstance, ServiceStatus};
use crate::orchestrator::OrchestratorError;
use crate::services::instances::get_owned_instance;
use crate::services::quota;
use crate::services::Ctx;
use crate::tasks;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateVolumeParams {
    pub name: String,
    pub size_gb: u64,
    pub volume_type: Option<String>,
    pub availability_zone: Option<String>,
}

pub struct VolumeView {
    pub record: ServiceInstance,
    pub state: &'static str,
}

pub async fn create_volume(
    ctx: &Ctx<'_>,
    params: CreateVolumeParams,
) -> Result<ServiceInstance, AppError> {
    if params.size_gb == 0 {
        return Err(AppError::bad_request("VolumeSize must be at least 1 GiB"));
    }

    ctx.orchestrator
        .check_quotas(&ctx.account_id, &quota::volume_quota(params.size_gb))
        .await
        .map_err(|err| match err {
            OrchestratorError::Api { message, .. } => AppError::quota_exceeded(message),
            other => other.into(),
        })?;

    let record = ServiceInstance::new(EntityKind::Volume, &params.name, &ctx.account_id)
        .with_config(json!({
            "boot": false,
            "size_gb": params.size_gb,
            "volume_type": &params.volume_type,
            "availability_zone": &params.availability_zone,
        }));
    let record_id = ctx.store.insert(record);
    ctx.store.set_status(record_id, ServiceStatus::Pending);

    let payload = json!({
        "name": &params.name,
        "size_gb": params.size_gb,
        "volume_type": &params.volume_type,
        "availability_zone": &params.availability_zone,
    });
    let created = match ctx.orchestrator.create_volume(&payload).await {
        Ok(created) => created,
        Err(err) => {
            ctx.store.set_error(record_id, err.to_string());
            return Err(err.into());
        }
    };
    ctx.store.set_resource_uuid(record_id, created.uuid);

    if let Err(err) = tasks::wait_if_task(
        ctx.orchestrator,
        created.taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await
    {
        ctx.store.set_error(record_id, err.to_string());
        return Err(err.into());
    }

    info!(volume = %record_id, resource = %created.uuid, "volume created");
    Ok(ctx
        .store
        .set_status(record_id, ServiceStatus::Active)
        .expect("record inserted above"))
}

pub fn describe_volumes(ctx: &Ctx<'_>, volume_ids: &[Uuid]) -> Vec<VolumeView> {
    ctx.store
        .list(&ctx.account_id, EntityKind::Volume)
        .into_iter()
        .filter(|r| volume_ids.is_empty() || volume_ids.contains(&r.id))
        .map(|record| {
            let state = project_volume_state(record.status, record.parent_id.is_some());
            VolumeView { record, state }
        })
        .collect()
}

pub async fn delete_volume(ctx: &Ctx<'_>, volume_id: Uuid) -> Result<(), AppError> {
    let volume = get_owned_volume(ctx, volume_id)?;
    if volume.parent_id.is_some() {
        return Err(AppError::conflict(format!(
            "Volume '{}' is attached; detach it first",
            volume_id
        )));
    }

    ctx.store.set_status(volume_id, ServiceStatus::Deleting);
    if let Some(resource) = volume.resource_uuid {
        let result = async {
            let taskid = ctx.orchestrator.delete_volume(resource).await?;
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
            ctx.store.set_error(volume_id, err.to_string());
            return Err(err.into());
        }
    }
    ctx.store.set_status(volume_id, ServiceStatus::Terminated);
    Ok(())
}

pub async fn attach_volume(
    ctx: &Ctx<'_>,
    volume_id: Uuid,
    instance_id: Uuid,
    device: &str,
) -> Result<(), AppError> {
    let volume = get_owned_volume(ctx, volume_id)?;
    if let Some(parent) = volume.parent_id {
        return Err(AppError::conflict(format!(
            "Volume '{}' is already attached to instance '{}'",
            volume_id, parent
        )));
    }
    let instance = get_owned_instance(ctx, instance_id)?;

    let volume_resource = volume
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Volume '{}' is not ready", volume_id)))?;
    let instance_resource = instance.resource_uuid.ok_or_else(|| {
        AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
    })?;

    let taskid = ctx
        .orchestrator
        .attach_volume(instance_resource, volume_resource, device)
        .await?;
    tasks::wait_if_task(
        ctx.orchestrator,
        taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await?;

    ctx.store.update(volume_id, |r| {
        r.parent_id = Some(instance_id);
        r.config["device"] = json!(device);
    });
    info!(volume = %volume_id, instance = %instance_id, device, "volume attached");
    Ok(())
}

pub async fn detach_volume(ctx: &Ctx<'_>, volume_id: Uuid) -> Result<(), AppError> {
    let volume = get_owned_volume(ctx, volume_id)?;
    let instance_id = volume.parent_id.ok_or_else(|| {
        AppError::conflict(format!("Volume '{}' is not attached", volume_id))
    })?;

    // the root device never detaches while its instance exists
    let boot = volume
        .config
        .get("boot")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if boot {
        return Err(AppError::bad_request(format!(
            "Volume '{}' is the root device and cannot be detached",
            volume_id
        )));
    }

    let instance = get_owned_instance(ctx, instance_id)?;
    let volume_resource = volume
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Volume '{}' is not ready", volume_id)))?;
    let instance_resource = instance.resource_uuid.ok_or_else(|| {
        AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
    })?;

    let taskid = ctx
        .orchestrator
        .detach_volume(instance_resource, volume_resource)
        .await?;
    tasks::wait_if_task(
        ctx.orchestrator,
        taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await?;

    ctx.store.update(volume_id, |r| {
        r.parent_id = None;
        r.config["device"] = json!(null);
    });
    info!(volume = %volume_id, instance = %instance_id, "volume detached");
    Ok(())
}

fn get_owned_volume(ctx: &Ctx<'_>, volume_id: Uuid) -> Result<ServiceInstance, AppError> {
    ctx.store
        .get(volume_id)
        .filter(|r| r.kind == EntityKind::Volume && r.account_id == ctx.account_id)
        .filter(|r| r.status != ServiceStatus::Terminated)
        .ok_or_else(|| AppError::not_found(format!("Volume '{}' not found", volume_id)))
}

#[cfg(test)]
#[path = "volumes_tests.rs"]
mod tests;
