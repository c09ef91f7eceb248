use crate::errors::AppError;
use crate::models::instance::{BlockDeviceMapping, OsFamily};
use crate::models::status::{project_instance_state, InstanceState, RunState};
use crate::models::{EntityKind, ServiceInstance, ServiceStatus};
use crate::orchestrator::OrchestratorError;
use crate::services::quota::{self, AdditionalVolume};
use crate::services::Ctx;
use crate::tasks;
use crate::utils::regex;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

const ROOT_DEVICE: &str = "/dev/sda1";
const WINDOWS_NAME_MAX: usize = 15;
const LINUX_NAME_MAX: usize = 45;

/// Validated create parameters handed over by the RunInstances view.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub name: String,
    pub desc: String,
    pub image_id: Uuid,
    pub instance_type: String,
    pub key_name: Option<String>,
    pub security_group_ids: Vec<Uuid>,
    pub availability_zone: Option<String>,
    pub block_devices: Vec<BlockDeviceMapping>,
    pub tags: Vec<String>,
}

/// A record joined with its projected external state.
#[derive(Debug, Clone)]
pub struct InstanceView {
    pub record: ServiceInstance,
    pub state: InstanceState,
}

/// Hostname rules differ by OS family: Windows names are NetBIOS-bound,
/// Linux-family names carry the account acronym as a suffix.
pub fn validate_hostname(
    family: OsFamily,
    name: &str,
    acronym: &str,
) -> Result<String, AppError> {
    if !regex::HOSTNAME.is_match(name) {
        return Err(AppError::bad_request(format!(
            "Instance name '{}' must start with a letter and contain only letters, digits and hyphens",
            name
        )));
    }

    match family {
        OsFamily::Windows => {
            if name.len() > WINDOWS_NAME_MAX {
                return Err(AppError::bad_request(format!(
                    "Windows instance name '{}' exceeds {} characters",
                    name, WINDOWS_NAME_MAX
                )));
            }
            Ok(name.to_string())
        }
        OsFamily::Linux => {
            let hostname = format!("{}-{}", name, acronym);
            if hostname.len() > LINUX_NAME_MAX {
                return Err(AppError::bad_request(format!(
                    "Instance name '{}' with account suffix '{}' exceeds {} characters",
                    name, acronym, LINUX_NAME_MAX
                )));
            }
            Ok(hostname)
        }
    }
}

/// Splits declared block devices into the root override and the additional
/// set. The root device is addressed by its fixed name; everything else is
/// an extra volume.
pub fn split_block_devices(
    mappings: &[BlockDeviceMapping],
) -> (Option<&BlockDeviceMapping>, Vec<&BlockDeviceMapping>) {
    let mut root = None;
    let mut additional = Vec::new();
    for mapping in mappings {
        if mapping.device_name.as_deref() == Some(ROOT_DEVICE) {
            root = Some(mapping);
        } else {
            additional.push(mapping);
        }
    }
    (root, additional)
}

pub async fn run_instance(ctx: &Ctx<'_>, params: RunParams) -> Result<ServiceInstance, AppError> {
    let image = ctx
        .orchestrator
        .image_detail(params.image_id)
        .await
        .map_err(|err| match err {
            OrchestratorError::Api { status: 404, .. } => {
                AppError::not_found(format!("Image '{}' not found", params.image_id))
            }
            other => other.into(),
        })?;
    let family = OsFamily::from_platform(&image.platform);
    let hostname = validate_hostname(family, &params.name, &ctx.config.account_acronym)?;

    if family == OsFamily::Windows
        && ctx
            .store
            .name_taken(&ctx.account_id, EntityKind::Instance, &params.name)
    {
        return Err(AppError::conflict(format!(
            "Windows instance name '{}' is already in use in this account",
            params.name
        )));
    }

    let flavor = ctx
        .orchestrator
        .flavor_detail(&params.instance_type)
        .await
        .map_err(|err| match err {
            OrchestratorError::Api { status: 404, .. } => {
                AppError::bad_request(format!("Unknown InstanceType '{}'", params.instance_type))
            }
            other => other.into(),
        })?;

    let mut group_resources = Vec::new();
    for group_id in &params.security_group_ids {
        let group = ctx
            .store
            .get(*group_id)
            .filter(|r| r.kind == EntityKind::SecurityGroup && r.account_id == ctx.account_id)
            .filter(|r| r.is_live())
            .ok_or_else(|| {
                AppError::not_found(format!("Security group '{}' not found", group_id))
            })?;
        let resource = group.resource_uuid.ok_or_else(|| {
            AppError::conflict(format!("Security group '{}' is not ready", group_id))
        })?;
        group_resources.push(resource);
    }

    let (root, additional) = split_block_devices(&params.block_devices);
    let boot_override = root.and_then(|m| m.ebs.as_ref()).and_then(|e| e.volume_size);
    let clone_source = match root
        .and_then(|m| m.ebs.as_ref())
        .and_then(|e| e.source_volume_id.as_deref())
    {
        Some(volume_id) => {
            let uuid = Uuid::parse_str(volume_id).map_err(|_| {
                AppError::bad_request(format!("Invalid source VolumeId '{}'", volume_id))
            })?;
            Some(ctx.orchestrator.volume_detail(uuid).await?)
        }
        None => None,
    };

    let mut extra_volumes = Vec::new();
    for mapping in &additional {
        let ebs = mapping.ebs.as_ref().ok_or_else(|| {
            AppError::bad_request("BlockDeviceMapping entries must carry an Ebs block")
        })?;
        let size_gb = ebs.volume_size.ok_or_else(|| {
            AppError::bad_request("Additional block devices must declare VolumeSize")
        })?;
        extra_volumes.push(AdditionalVolume {
            size_gb,
            volume_type: ebs.volume_type.clone(),
        });
    }

    let delta = quota::aggregate_run_quota(
        &flavor,
        image.min_disk_size_gb,
        boot_override,
        clone_source.as_ref().map(|v| v.size_gb),
        &extra_volumes,
    );
    check_quota(ctx, &delta).await?;

    let record = ServiceInstance::new(EntityKind::Instance, &params.name, &ctx.account_id)
        .with_definition(&params.instance_type)
        .with_config(json!({
            "hostname": &hostname,
            "desc": &params.desc,
            "image_id": params.image_id,
            "image_name": &image.name,
            "flavor": &params.instance_type,
            "platform": &image.platform,
            "key_name": &params.key_name,
            "security_group_ids": &params.security_group_ids,
            "availability_zone": &params.availability_zone,
            "monitoring_enabled": false,
            "logging_enabled": false,
        }));
    let record_id = ctx.store.insert(record);
    for tag in &params.tags {
        ctx.store.add_tag(record_id, tag);
    }
    ctx.store.set_status(record_id, ServiceStatus::Pending);

    let boot_size = quota::resolve_boot_size(
        flavor.disk_gb,
        boot_override,
        clone_source.as_ref().map(|v| v.size_gb),
        image.min_disk_size_gb,
    );
    let payload = json!({
        "name": &hostname,
        "desc": &params.desc,
        "image": params.image_id,
        "flavor": &params.instance_type,
        "availability_zone": &params.availability_zone,
        "security_groups": group_resources,
        "key_name": &params.key_name,
        "boot_volume": {
            "size_gb": boot_size,
            "volume_type": &flavor.volume_type,
            "source_volume": clone_source.as_ref().map(|v| v.uuid),
        },
        "volumes": extra_volumes.iter().map(|v| json!({
            "size_gb": v.size_gb,
            "volume_type": &v.volume_type,
        })).collect::<Vec<_>>(),
    });

    ctx.store.set_status(record_id, ServiceStatus::Building);
    let created = match ctx.orchestrator.create_instance(&payload).await {
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
        ctx.config.provision_timeout(),
        ctx.config.poll_interval(),
    )
    .await
    {
        ctx.store.set_error(record_id, err.to_string());
        return Err(err.into());
    }

    register_volume_records(ctx, record_id, created.uuid).await;

    info!(instance = %record_id, resource = %created.uuid, "instance provisioned");
    Ok(ctx
        .store
        .set_status(record_id, ServiceStatus::Active)
        .expect("record inserted above"))
}

/// Mirrors the backend's volume layout into child records so dependent-link
/// checks can run without a backend round trip.
async fn register_volume_records(ctx: &Ctx<'_>, instance_id: Uuid, resource_uuid: Uuid) {
    let detail = match ctx.orchestrator.instance_detail(resource_uuid).await {
        Ok(detail) => detail,
        Err(err) => {
            // listing volumes is best-effort after a successful build
            warn!(instance = %instance_id, error = %err, "could not mirror volume records");
            return;
        }
    };

    for (index, attachment) in detail.volumes.iter().enumerate() {
        let name = format!("{}-vol-{}", detail.name, index);
        let record = ServiceInstance::new(EntityKind::Volume, &name, &ctx.account_id)
            .with_parent(instance_id)
            .with_config(json!({
                "boot": attachment.boot,
                "size_gb": attachment.size_gb,
                "device": &attachment.device,
            }));
        let id = ctx.store.insert(record);
        ctx.store.set_resource_uuid(id, attachment.uuid);
        ctx.store.set_status(id, ServiceStatus::Active);
    }
}

async fn check_quota(ctx: &Ctx<'_>, delta: &quota::QuotaDelta) -> Result<(), AppError> {
    ctx.orchestrator
        .check_quotas(&ctx.account_id, delta)
        .await
        .map_err(|err| match err {
            OrchestratorError::Api { message, .. } => AppError::quota_exceeded(message),
            other => other.into(),
        })
}

pub async fn describe_instances(
    ctx: &Ctx<'_>,
    instance_ids: &[Uuid],
) -> Result<Vec<InstanceView>, AppError> {
    let mut views = Vec::new();
    for record in ctx.store.list(&ctx.account_id, EntityKind::Instance) {
        if !instance_ids.is_empty() && !instance_ids.contains(&record.id) {
            continue;
        }
        views.push(view_of(ctx, record).await?);
    }
    Ok(views)
}

async fn view_of(ctx: &Ctx<'_>, record: ServiceInstance) -> Result<InstanceView, AppError> {
    let runstate = live_runstate(ctx, &record).await;
    let state = project_instance_state(record.status, runstate.as_ref());
    Ok(InstanceView { record, state })
}

/// The run-state signal comes from the live backend resource, never from
/// local state; anything short of an ACTIVE record has nothing to ask for.
async fn live_runstate(ctx: &Ctx<'_>, record: &ServiceInstance) -> Option<RunState> {
    if record.status != ServiceStatus::Active {
        return None;
    }
    let resource = record.resource_uuid?;
    match ctx.orchestrator.instance_detail(resource).await {
        Ok(detail) => Some(RunState::parse(&detail.state)),
        Err(err) => {
            warn!(instance = %record.id, error = %err, "runstate fetch failed");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
    Reboot,
}

impl PowerAction {
    fn backend_name(&self) -> &'static str {
        match self {
            PowerAction::Start => "start",
            PowerAction::Stop => "stop",
            PowerAction::Reboot => "reboot",
        }
    }
}

/// State-change result pair for the AWS-shaped response.
#[derive(Debug)]
pub struct StateChange {
    pub instance_id: Uuid,
    pub previous: InstanceState,
    pub current: InstanceState,
}

pub async fn power_action(
    ctx: &Ctx<'_>,
    instance_id: Uuid,
    action: PowerAction,
) -> Result<StateChange, AppError> {
    let record = get_owned_instance(ctx, instance_id)?;
    let resource = record.resource_uuid.ok_or_else(|| {
        AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
    })?;
    if record.status != ServiceStatus::Active {
        return Err(AppError::conflict(format!(
            "Instance '{}' is {} and cannot change power state",
            instance_id,
            record.status.as_str()
        )));
    }

    let detail = ctx.orchestrator.instance_detail(resource).await?;
    let runstate = RunState::parse(&detail.state);
    let previous = project_instance_state(record.status, Some(&runstate));

    // refuse no-op transitions outright
    match (action, &runstate) {
        (PowerAction::Start, RunState::PoweredOn) => {
            return Err(AppError::conflict(format!(
                "Instance '{}' is already running",
                instance_id
            )))
        }
        (PowerAction::Stop, RunState::PoweredOff) => {
            return Err(AppError::conflict(format!(
                "Instance '{}' is already stopped",
                instance_id
            )))
        }
        (PowerAction::Reboot, RunState::PoweredOff) => {
            return Err(AppError::conflict(format!(
                "Instance '{}' is stopped and cannot be rebooted",
                instance_id
            )))
        }
        _ => {}
    }

    ctx.store.set_status(instance_id, ServiceStatus::Updating);
    let result = async {
        let taskid = ctx
            .orchestrator
            .instance_action(resource, action.backend_name(), None)
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

    let current = match action {
        PowerAction::Start | PowerAction::Reboot => InstanceState::Running,
        PowerAction::Stop => InstanceState::Stopped,
    };
    Ok(StateChange {
        instance_id,
        previous,
        current,
    })
}

pub async fn terminate_instance(
    ctx: &Ctx<'_>,
    instance_id: Uuid,
) -> Result<StateChange, AppError> {
    let record = get_owned_instance(ctx, instance_id)?;

    let data_volumes = ctx
        .store
        .children_of(instance_id, EntityKind::Volume)
        .into_iter()
        .filter(|v| !v.config.get("boot").and_then(|b| b.as_bool()).unwrap_or(false))
        .count();
    if data_volumes > 0 {
        return Err(AppError::conflict(format!(
            "Instance '{}' still has {} data volume(s) attached; detach them first",
            instance_id, data_volumes
        )));
    }
    for hook in ["monitoring_enabled", "logging_enabled"] {
        if record
            .config
            .get(hook)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return Err(AppError::conflict(format!(
                "Instance '{}' has {} set; disable it first",
                instance_id,
                hook.trim_end_matches("_enabled")
            )));
        }
    }

    let previous = view_of(ctx, record.clone()).await?.state;
    ctx.store.set_status(instance_id, ServiceStatus::Deleting);

    if let Some(resource) = record.resource_uuid {
        let result = async {
            let taskid = ctx.orchestrator.delete_instance(resource).await?;
            tasks::wait_if_task(
                ctx.orchestrator,
                taskid.as_deref(),
                ctx.config.provision_timeout(),
                ctx.config.poll_interval(),
            )
            .await
        }
        .await;
        if let Err(err) = result {
            ctx.store.set_error(instance_id, err.to_string());
            return Err(err.into());
        }
    }

    // boot volume records die with the instance
    for volume in ctx.store.children_of(instance_id, EntityKind::Volume) {
        ctx.store.set_status(volume.id, ServiceStatus::Terminated);
    }
    ctx.store.set_status(instance_id, ServiceStatus::Terminated);

    info!(instance = %instance_id, "instance terminated");
    Ok(StateChange {
        instance_id,
        previous,
        current: InstanceState::Terminated,
    })
}

/// Attribute modification: instance-type resize and/or security-group set
/// replacement. The resize quota delta is checked before the backend call.
pub async fn modify_attribute(
    ctx: &Ctx<'_>,
    instance_id: Uuid,
    new_instance_type: Option<&str>,
    new_security_group_ids: Option<&[Uuid]>,
) -> Result<(), AppError> {
    let record = get_owned_instance(ctx, instance_id)?;
    let resource = record.resource_uuid.ok_or_else(|| {
        AppError::conflict(format!("Instance '{}' has no backend resource", instance_id))
    })?;

    if let Some(target_name) = new_instance_type {
        let current_name = record
            .config
            .get("flavor")
            .and_then(|v| v.as_str())
            .unwrap_or(&record.definition)
            .to_string();
        let current = ctx.orchestrator.flavor_detail(&current_name).await?;
        let target = ctx
            .orchestrator
            .flavor_detail(target_name)
            .await
            .map_err(|err| match err {
                OrchestratorError::Api { status: 404, .. } => {
                    AppError::bad_request(format!("Unknown InstanceType '{}'", target_name))
                }
                other => other.into(),
            })?;
        check_quota(ctx, &quota::resize_quota(&current, &target)).await?;

        ctx.store.set_status(instance_id, ServiceStatus::Updating);
        let result = async {
            let taskid = ctx
                .orchestrator
                .instance_action(resource, "set_flavor", Some(&json!({ "flavor": target.name })))
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
        ctx.store.update(instance_id, |r| {
            r.definition = target_name.to_string();
            r.config["flavor"] = json!(target_name);
        });
        ctx.store.set_status(instance_id, ServiceStatus::Active);
    }

    if let Some(group_ids) = new_security_group_ids {
        let mut resources = Vec::new();
        for group_id in group_ids {
            let group = ctx
                .store
                .get(*group_id)
                .filter(|r| r.kind == EntityKind::SecurityGroup && r.account_id == ctx.account_id)
                .filter(|r| r.is_live())
                .ok_or_else(|| {
                    AppError::not_found(format!("Security group '{}' not found", group_id))
                })?;
            resources.push(group.resource_uuid.ok_or_else(|| {
                AppError::conflict(format!("Security group '{}' is not ready", group_id))
            })?);
        }

        let taskid = ctx
            .orchestrator
            .instance_action(
                resource,
                "set_security_groups",
                Some(&json!({ "security_groups": resources })),
            )
            .await?;
        tasks::wait_if_task(
            ctx.orchestrator,
            taskid.as_deref(),
            ctx.config.task_timeout(),
            ctx.config.poll_interval(),
        )
        .await?;
        ctx.store.update(instance_id, |r| {
            r.config["security_group_ids"] = json!(group_ids);
        });
    }

    Ok(())
}

pub fn get_owned_instance(ctx: &Ctx<'_>, instance_id: Uuid) -> Result<ServiceInstance, AppError> {
    ctx.store
        .get(instance_id)
        .filter(|r| r.kind == EntityKind::Instance && r.account_id == ctx.account_id)
        .filter(|r| r.status != ServiceStatus::Terminated)
        .ok_or_else(|| AppError::not_found(format!("Instance '{}' not found", instance_id)))
}

#[cfg(test)]
#[path = "instances_tests.rs"]
mod tests;
