use crate::errors::AppError;
use crate::models::backup::{BackupJob, BackupSchedule, RestorePoint};
use crate::models::{EntityKind, ServiceInstance, ServiceStatus};
use crate::services::instances::get_owned_instance;
use crate::services::Ctx;
use crate::tasks;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateJobParams {
    pub name: String,
    pub site: String,
    pub hypervisor: String,
    pub fullbackup_interval: u32,
    pub restore_points: u32,
    pub schedule: BackupSchedule,
    pub instance_ids: Vec<Uuid>,
}

#[derive(Debug)]
pub struct JobView {
    pub record: ServiceInstance,
    pub job: BackupJob,
}

/// Decodes the typed job out of the record's config blob.
fn job_of(record: &ServiceInstance) -> Result<BackupJob, AppError> {
    serde_json::from_value(record.config.clone())
        .map_err(|e| AppError::internal(anyhow::anyhow!("corrupt backup job config: {}", e)))
}

fn write_job(ctx: &Ctx<'_>, record_id: Uuid, job: &BackupJob) {
    let config = serde_json::to_value(job).expect("backup job serializes");
    ctx.store.update(record_id, |r| r.config = config);
}

/// The active job holding an instance, if any. An instance belongs to at
/// most one active backup job at a time.
pub fn active_job_containing(ctx: &Ctx<'_>, instance_id: Uuid) -> Option<ServiceInstance> {
    ctx.store
        .list(&ctx.account_id, EntityKind::BackupJob)
        .into_iter()
        .filter(|r| r.is_live())
        .find(|r| {
            job_of(r)
                .map(|job| job.instances.contains(&instance_id))
                .unwrap_or(false)
        })
}

pub async fn create_backup_job(
    ctx: &Ctx<'_>,
    params: CreateJobParams,
) -> Result<JobView, AppError> {
    if params.instance_ids.is_empty() {
        return Err(AppError::bad_request(
            "A backup job requires at least one member instance",
        ));
    }
    if params.restore_points == 0 {
        return Err(AppError::bad_request(
            "RestorePoints retention must be at least 1",
        ));
    }

    let mut member_resources = Vec::new();
    for instance_id in &params.instance_ids {
        let instance = get_owned_instance(ctx, *instance_id)?;
        if !instance.is_active() {
            return Err(AppError::conflict(format!(
                "Instance '{}' is {} and cannot join a backup job",
                instance_id,
                instance.status.as_str()
            )));
        }
        if let Some(job) = active_job_containing(ctx, *instance_id) {
            return Err(AppError::conflict(format!(
                "Instance '{}' already belongs to backup job '{}'",
                instance_id, job.id
            )));
        }
        member_resources.push(instance.resource_uuid.ok_or_else(|| {
            AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
        })?);
    }

    let record = ServiceInstance::new(EntityKind::BackupJob, &params.name, &ctx.account_id);
    let record_id = ctx.store.insert(record);
    let job = BackupJob {
        id: record_id,
        name: params.name.clone(),
        site: params.site.clone(),
        hypervisor: params.hypervisor.clone(),
        fullbackup_interval: params.fullbackup_interval,
        restore_points: params.restore_points,
        schedule: params.schedule.clone(),
        instances: params.instance_ids.clone(),
    };
    write_job(ctx, record_id, &job);
    ctx.store.set_status(record_id, ServiceStatus::Pending);

    let payload = json!({
        "name": params.name,
        "site": params.site,
        "hypervisor": params.hypervisor,
        "fullbackup_interval": params.fullbackup_interval,
        "restore_points": params.restore_points,
        "schedule": params.schedule,
        "instances": member_resources,
    });
    let created = match ctx.orchestrator.create_backup_job(&payload).await {
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

    let record = ctx
        .store
        .set_status(record_id, ServiceStatus::Active)
        .expect("record inserted above");
    info!(job = %record_id, members = job.instances.len(), "backup job created");
    Ok(JobView { record, job })
}

pub fn describe_backup_jobs(ctx: &Ctx<'_>, job_ids: &[Uuid]) -> Result<Vec<JobView>, AppError> {
    ctx.store
        .list(&ctx.account_id, EntityKind::BackupJob)
        .into_iter()
        .filter(|r| job_ids.is_empty() || job_ids.contains(&r.id))
        .filter(|r| r.is_live())
        .map(|record| {
            let job = job_of(&record)?;
            Ok(JobView { record, job })
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub start_time: Option<String>,
    pub interval: Option<String>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
    pub restore_points: Option<u32>,
    pub fullbackup_interval: Option<u32>,
}

pub async fn modify_backup_job(
    ctx: &Ctx<'_>,
    job_id: Uuid,
    update: JobUpdate,
) -> Result<JobView, AppError> {
    let record = get_owned_job(ctx, job_id)?;
    let mut job = job_of(&record)?;
    let resource = record
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Backup job '{}' is not ready", job_id)))?;

    if let Some(restore_points) = update.restore_points {
        if restore_points == 0 {
            return Err(AppError::bad_request(
                "RestorePoints retention must be at least 1",
            ));
        }
        job.restore_points = restore_points;
    }
    if let Some(interval) = update.fullbackup_interval {
        job.fullbackup_interval = interval;
    }
    if let Some(start_time) = update.start_time {
        job.schedule.start_time = start_time;
    }
    if let Some(interval) = update.interval {
        job.schedule.interval = interval;
    }
    if let Some(timezone) = update.timezone {
        job.schedule.timezone = timezone;
    }
    if let Some(enabled) = update.enabled {
        job.schedule.enabled = enabled;
    }

    ctx.store.set_status(job_id, ServiceStatus::Updating);
    let payload = json!({
        "fullbackup_interval": job.fullbackup_interval,
        "restore_points": job.restore_points,
        "schedule": &job.schedule,
    });
    let result = async {
        let taskid = ctx.orchestrator.update_backup_job(resource, &payload).await?;
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
        ctx.store.set_error(job_id, err.to_string());
        return Err(err.into());
    }

    write_job(ctx, job_id, &job);
    let record = ctx
        .store
        .set_status(job_id, ServiceStatus::Active)
        .expect("record fetched above");
    Ok(JobView { record, job })
}

pub async fn delete_backup_job(ctx: &Ctx<'_>, job_id: Uuid) -> Result<(), AppError> {
    let record = get_owned_job(ctx, job_id)?;

    ctx.store.set_status(job_id, ServiceStatus::Deleting);
    if let Some(resource) = record.resource_uuid {
        let result = async {
            let taskid = ctx.orchestrator.delete_backup_job(resource).await?;
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
            ctx.store.set_error(job_id, err.to_string());
            return Err(err.into());
        }
    }
    ctx.store.set_status(job_id, ServiceStatus::Terminated);
    info!(job = %job_id, "backup job deleted");
    Ok(())
}

pub async fn add_instance(
    ctx: &Ctx<'_>,
    job_id: Uuid,
    instance_id: Uuid,
) -> Result<JobView, AppError> {
    let record = get_owned_job(ctx, job_id)?;
    let mut job = job_of(&record)?;
    let resource = record
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Backup job '{}' is not ready", job_id)))?;

    let instance = get_owned_instance(ctx, instance_id)?;
    if !instance.is_active() {
        return Err(AppError::conflict(format!(
            "Instance '{}' is {} and cannot join a backup job",
            instance_id,
            instance.status.as_str()
        )));
    }
    if let Some(existing) = active_job_containing(ctx, instance_id) {
        return Err(AppError::conflict(format!(
            "Instance '{}' already belongs to backup job '{}'",
            instance_id, existing.id
        )));
    }
    let instance_resource = instance.resource_uuid.ok_or_else(|| {
        AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
    })?;

    let taskid = ctx
        .orchestrator
        .add_job_instance(resource, instance_resource)
        .await?;
    tasks::wait_if_task(
        ctx.orchestrator,
        taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await?;

    job.instances.push(instance_id);
    write_job(ctx, job_id, &job);
    let record = ctx.store.get(job_id).expect("record fetched above");
    info!(job = %job_id, instance = %instance_id, "instance added to backup job");
    Ok(JobView { record, job })
}

pub async fn remove_instance(
    ctx: &Ctx<'_>,
    job_id: Uuid,
    instance_id: Uuid,
) -> Result<JobView, AppError> {
    let record = get_owned_job(ctx, job_id)?;
    let mut job = job_of(&record)?;
    let resource = record
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Backup job '{}' is not ready", job_id)))?;

    if !job.instances.contains(&instance_id) {
        return Err(AppError::not_found(format!(
            "Instance '{}' is not a member of backup job '{}'",
            instance_id, job_id
        )));
    }
    // a job never drops to zero members; delete the job instead
    if job.instances.len() == 1 {
        return Err(AppError::conflict(format!(
            "Backup job '{}' must retain at least one member instance",
            job_id
        )));
    }

    let instance = get_owned_instance(ctx, instance_id)?;
    let instance_resource = instance.resource_uuid.ok_or_else(|| {
        AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
    })?;

    let taskid = ctx
        .orchestrator
        .remove_job_instance(resource, instance_resource)
        .await?;
    tasks::wait_if_task(
        ctx.orchestrator,
        taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await?;

    job.instances.retain(|id| *id != instance_id);
    write_job(ctx, job_id, &job);
    let record = ctx.store.get(job_id).expect("record fetched above");
    info!(job = %job_id, instance = %instance_id, "instance removed from backup job");
    Ok(JobView { record, job })
}

pub async fn describe_restore_points(
    ctx: &Ctx<'_>,
    job_id: Uuid,
) -> Result<Vec<RestorePoint>, AppError> {
    let record = get_owned_job(ctx, job_id)?;
    let resource = record
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Backup job '{}' is not ready", job_id)))?;

    let values = ctx.orchestrator.list_restore_points(resource).await?;
    let mut points = Vec::new();
    for value in values {
        let mut point: RestorePoint = serde_json::from_value(value)
            .map_err(|e| AppError::Backend(format!("undecodable restore point: {}", e)))?;
        point.job_id = job_id;
        points.push(point);
    }
    Ok(points)
}

pub async fn create_restore_point(
    ctx: &Ctx<'_>,
    job_id: Uuid,
    name: Option<&str>,
) -> Result<(), AppError> {
    let record = get_owned_job(ctx, job_id)?;
    let resource = record
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Backup job '{}' is not ready", job_id)))?;

    // manual restore points are always full backups
    let payload = json!({ "name": name, "type": "full" });
    let taskid = ctx
        .orchestrator
        .create_restore_point(resource, &payload)
        .await?;
    tasks::wait_if_task(
        ctx.orchestrator,
        taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await?;
    Ok(())
}

pub async fn delete_restore_point(
    ctx: &Ctx<'_>,
    job_id: Uuid,
    restore_point_id: &str,
) -> Result<(), AppError> {
    let record = get_owned_job(ctx, job_id)?;
    let resource = record
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Backup job '{}' is not ready", job_id)))?;

    let taskid = ctx
        .orchestrator
        .delete_restore_point(resource, restore_point_id)
        .await?;
    tasks::wait_if_task(
        ctx.orchestrator,
        taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await?;
    Ok(())
}

fn get_owned_job(ctx: &Ctx<'_>, job_id: Uuid) -> Result<ServiceInstance, AppError> {
    ctx.store
        .get(job_id)
        .filter(|r| r.kind == EntityKind::BackupJob && r.account_id == ctx.account_id)
        .filter(|r| r.is_live())
        .ok_or_else(|| AppError::not_found(format!("Backup job '{}' not found", job_id)))
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
