use crate::errors::AppError;
use crate::models::status::project_network_state;
use crate::models::{EntityKind, ServiceInstance, ServiceStatus};
use crate::services::Ctx;
use crate::tasks;
use crate::utils::regex;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

pub struct NetworkView {
    pub record: ServiceInstance,
    pub state: &'static str,
}

pub async fn create_vpc(
    ctx: &Ctx<'_>,
    name: &str,
    cidr: &str,
) -> Result<ServiceInstance, AppError> {
    if !regex::CIDR_V4.is_match(cidr) {
        return Err(AppError::bad_request(format!("Invalid CidrBlock '{}'", cidr)));
    }

    let record = ServiceInstance::new(EntityKind::Vpc, name, &ctx.account_id)
        .with_config(json!({ "cidr": cidr }));
    let record_id = ctx.store.insert(record);
    ctx.store.set_status(record_id, ServiceStatus::Pending);

    let payload = json!({ "name": name, "cidr": cidr });
    let created = match ctx.orchestrator.create_vpc(&payload).await {
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

    info!(vpc = %record_id, resource = %created.uuid, "vpc created");
    Ok(ctx
        .store
        .set_status(record_id, ServiceStatus::Active)
        .expect("record inserted above"))
}

pub fn describe_vpcs(ctx: &Ctx<'_>, vpc_ids: &[Uuid]) -> Vec<NetworkView> {
    ctx.store
        .list(&ctx.account_id, EntityKind::Vpc)
        .into_iter()
        .filter(|r| vpc_ids.is_empty() || vpc_ids.contains(&r.id))
        .map(|record| NetworkView {
            state: project_network_state(record.status),
            record,
        })
        .collect()
}

pub async fn delete_vpc(ctx: &Ctx<'_>, vpc_id: Uuid) -> Result<(), AppError> {
    let vpc = get_owned(ctx, vpc_id, EntityKind::Vpc)?;

    let subnets = ctx.store.children_of(vpc_id, EntityKind::Subnet);
    if !subnets.is_empty() {
        return Err(AppError::conflict(format!(
            "Vpc '{}' still has {} subnet(s); delete them first",
            vpc_id,
            subnets.len()
        )));
    }
    let groups = ctx.store.children_of(vpc_id, EntityKind::SecurityGroup);
    if !groups.is_empty() {
        return Err(AppError::conflict(format!(
            "Vpc '{}' still has {} security group(s); delete them first",
            vpc_id,
            groups.len()
        )));
    }

    ctx.store.set_status(vpc_id, ServiceStatus::Deleting);
    if let Some(resource) = vpc.resource_uuid {
        let result = async {
            let taskid = ctx.orchestrator.delete_vpc(resource).await?;
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
            ctx.store.set_error(vpc_id, err.to_string());
            return Err(err.into());
        }
    }
    ctx.store.set_status(vpc_id, ServiceStatus::Terminated);
    Ok(())
}

pub async fn create_subnet(
    ctx: &Ctx<'_>,
    name: &str,
    vpc_id: Uuid,
    cidr: &str,
    availability_zone: Option<&str>,
) -> Result<ServiceInstance, AppError> {
    if !regex::CIDR_V4.is_match(cidr) {
        return Err(AppError::bad_request(format!("Invalid CidrBlock '{}'", cidr)));
    }
    let vpc = get_owned(ctx, vpc_id, EntityKind::Vpc)?;
    let vpc_resource = vpc
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Vpc '{}' is not ready", vpc_id)))?;

    let record = ServiceInstance::new(EntityKind::Subnet, name, &ctx.account_id)
        .with_parent(vpc_id)
        .with_config(json!({ "cidr": cidr, "availability_zone": availability_zone }));
    let record_id = ctx.store.insert(record);
    ctx.store.set_status(record_id, ServiceStatus::Pending);

    let payload = json!({
        "name": name,
        "cidr": cidr,
        "vpc": vpc_resource,
        "availability_zone": availability_zone,
    });
    let created = match ctx.orchestrator.create_subnet(&payload).await {
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

    info!(subnet = %record_id, vpc = %vpc_id, "subnet created");
    Ok(ctx
        .store
        .set_status(record_id, ServiceStatus::Active)
        .expect("record inserted above"))
}

pub fn describe_subnets(ctx: &Ctx<'_>, subnet_ids: &[Uuid]) -> Vec<NetworkView> {
    ctx.store
        .list(&ctx.account_id, EntityKind::Subnet)
        .into_iter()
        .filter(|r| subnet_ids.is_empty() || subnet_ids.contains(&r.id))
        .map(|record| NetworkView {
            state: project_network_state(record.status),
            record,
        })
        .collect()
}

pub async fn delete_subnet(ctx: &Ctx<'_>, subnet_id: Uuid) -> Result<(), AppError> {
    let subnet = get_owned(ctx, subnet_id, EntityKind::Subnet)?;

    ctx.store.set_status(subnet_id, ServiceStatus::Deleting);
    if let Some(resource) = subnet.resource_uuid {
        let result = async {
            let taskid = ctx.orchestrator.delete_subnet(resource).await?;
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
            ctx.store.set_error(subnet_id, err.to_string());
            return Err(err.into());
        }
    }
    ctx.store.set_status(subnet_id, ServiceStatus::Terminated);
    Ok(())
}

fn get_owned(ctx: &Ctx<'_>, id: Uuid, kind: EntityKind) -> Result<ServiceInstance, AppError> {
    ctx.store
        .get(id)
        .filter(|r| r.kind == kind && r.account_id == ctx.account_id)
        .filter(|r| r.is_live())
        .ok_or_else(|| AppError::not_found(format!("{} '{}' not found", kind.as_str(), id)))
}

#[cfg(test)]
#[path = "networks_tests.rs"]
mod tests;
