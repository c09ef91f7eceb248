use crate::models::instance::{BlockDeviceMapping, Placement, TagSpecification};
use crate::models::status::project_instance_state;
use crate::routes::middleware::AccountId;
use crate::services::instances::{self, InstanceView, PowerAction, RunParams, StateChange};
use crate::utils::pagination::PageParams;
use crate::{errors, AppState};
use axum::{extract, http, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct RunInstancesRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image_id: Uuid,
    pub instance_type: String,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default, rename = "SecurityGroupId")]
    pub security_group_ids: Vec<Uuid>,
    #[serde(default)]
    pub placement: Option<Placement>,
    #[serde(default, rename = "BlockDeviceMapping")]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    #[serde(default, rename = "TagSpecification")]
    pub tag_specifications: Vec<TagSpecification>,
    #[serde(default)]
    pub min_count: Option<u32>,
    #[serde(default)]
    pub max_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeInstancesRequest {
    #[serde(rename = "InstanceId")]
    pub instance_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceIdsRequest {
    #[serde(rename = "InstanceId")]
    pub instance_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyInstanceAttributeRequest {
    pub instance_id: Uuid,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default, rename = "GroupId")]
    pub security_group_ids: Option<Vec<Uuid>>,
}

fn instance_item(account_id: &str, view: &InstanceView) -> Value {
    let record = &view.record;
    let config = &record.config;
    json!({
        "instanceId": record.id,
        "imageId": config.get("image_id"),
        "instanceType": &record.definition,
        "instanceState": {
            "code": view.state.code(),
            "name": view.state.as_str(),
        },
        "launchTime": record.created_at.to_rfc3339(),
        "keyName": config.get("key_name"),
        "placement": {
            "availabilityZone": config.get("availability_zone"),
        },
        "privateIpAddress": config.get("private_ip"),
        "groupSet": config
            .get("security_group_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(|id| json!({ "groupId": id })).collect::<Vec<_>>())
            .unwrap_or_default(),
        "tagSet": record.tags.iter().map(|tag| json!({ "key": tag })).collect::<Vec<_>>(),
        "nvl-name": &record.name,
        "nvl-ownerAlias": account_id,
        "nvl-state": record.status.as_str(),
        "nvl-error": &record.last_error,
    })
}

fn state_change_item(change: &StateChange) -> Value {
    json!({
        "instanceId": change.instance_id,
        "previousState": {
            "code": change.previous.code(),
            "name": change.previous.as_str(),
        },
        "currentState": {
            "code": change.current.code(),
            "name": change.current.as_str(),
        },
    })
}

pub async fn run_instances(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<RunInstancesRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    request.validate()?;
    if request.max_count.unwrap_or(1) > 1 || request.min_count.unwrap_or(1) > 1 {
        return Err(errors::AppError::bad_request(
            "Only single-instance launches are supported",
        ));
    }

    let tags = request
        .tag_specifications
        .iter()
        .flat_map(|spec| spec.tags.iter())
        .map(|pair| match pair.value.as_deref() {
            Some(value) if !value.is_empty() => format!("{}={}", pair.key, value),
            _ => pair.key.clone(),
        })
        .collect();

    let params = RunParams {
        name: request.name,
        desc: request.description.unwrap_or_default(),
        image_id: request.image_id,
        instance_type: request.instance_type,
        key_name: request.key_name,
        security_group_ids: request.security_group_ids,
        availability_zone: request.placement.and_then(|p| p.availability_zone),
        block_devices: request.block_device_mappings,
        tags,
    };

    let ctx = state.ctx(account.0.clone());
    let record = instances::run_instance(&ctx, params).await?;
    let view = match instances::describe_instances(&ctx, &[record.id])
        .await?
        .into_iter()
        .next()
    {
        Some(view) => view,
        None => InstanceView {
            state: project_instance_state(record.status, None),
            record,
        },
    };

    Ok((
        http::StatusCode::CREATED,
        Json(json!({
            "requestId": Uuid::new_v4(),
            "reservationId": Uuid::new_v4(),
            "ownerId": account.0,
            "instancesSet": [instance_item(&account.0, &view)],
        })),
    ))
}

pub async fn describe_instances(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeInstancesRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let page = request.page.resolve()?;
    let ctx = state.ctx(account.0.clone());
    let views = instances::describe_instances(&ctx, &request.instance_ids).await?;
    let (page_views, next_token) = page.apply(&views);

    let reservations: Vec<Value> = page_views
        .iter()
        .map(|view| {
            json!({
                "reservationId": view.record.id,
                "ownerId": account.0,
                "instancesSet": [instance_item(&account.0, view)],
            })
        })
        .collect();

    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "reservationSet": reservations,
        "nextToken": next_token,
    })))
}

async fn power_handler(
    state: AppState,
    account: AccountId,
    request: InstanceIdsRequest,
    action: PowerAction,
) -> Result<Json<Value>, errors::AppError> {
    if request.instance_ids.is_empty() {
        return Err(errors::AppError::bad_request(
            "At least one InstanceId is required",
        ));
    }
    let ctx = state.ctx(account.0);
    let mut changes = Vec::new();
    for instance_id in &request.instance_ids {
        changes.push(instances::power_action(&ctx, *instance_id, action).await?);
    }
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "instancesSet": changes.iter().map(state_change_item).collect::<Vec<_>>(),
    })))
}

pub async fn start_instances(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<InstanceIdsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    power_handler(state, account, request, PowerAction::Start).await
}

pub async fn stop_instances(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<InstanceIdsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    power_handler(state, account, request, PowerAction::Stop).await
}

pub async fn reboot_instances(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<InstanceIdsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    power_handler(state, account, request, PowerAction::Reboot).await
}

pub async fn terminate_instances(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<InstanceIdsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    if request.instance_ids.is_empty() {
        return Err(errors::AppError::bad_request(
            "At least one InstanceId is required",
        ));
    }
    let ctx = state.ctx(account.0);
    let mut changes = Vec::new();
    for instance_id in &request.instance_ids {
        changes.push(instances::terminate_instance(&ctx, *instance_id).await?);
    }
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "instancesSet": changes.iter().map(state_change_item).collect::<Vec<_>>(),
    })))
}

pub async fn modify_instance_attribute(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<ModifyInstanceAttributeRequest>,
) -> Result<Json<Value>, errors::AppError> {
    if request.instance_type.is_none() && request.security_group_ids.is_none() {
        return Err(errors::AppError::bad_request(
            "Nothing to modify: supply InstanceType or GroupId",
        ));
    }
    let ctx = state.ctx(account.0);
    instances::modify_attribute(
        &ctx,
        request.instance_id,
        request.instance_type.as_deref(),
        request.security_group_ids.as_deref(),
    )
    .await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub async fn describe_instance_types(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let flavors = ctx.orchestrator.list_flavors().await.map_err(errors::AppError::from)?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "instanceTypeSet": flavors.iter().map(|flavor| json!({
            "instanceType": &flavor.name,
            "vCpuInfo": { "defaultVCpus": flavor.vcpus },
            "memoryInfo": { "sizeInMiB": flavor.ram_mb },
            "instanceStorageInfo": { "totalSizeInGB": flavor.disk_gb },
        })).collect::<Vec<_>>(),
    })))
}

pub async fn describe_instance_status(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeInstancesRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let views = instances::describe_instances(&ctx, &request.instance_ids).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "instanceStatusSet": views.iter().map(|view| json!({
            "instanceId": view.record.id,
            "instanceState": {
                "code": view.state.code(),
                "name": view.state.as_str(),
            },
            "availabilityZone": view.record.config.get("availability_zone"),
        })).collect::<Vec<_>>(),
    })))
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/RunInstances", routing::post(run_instances))
        .route("/DescribeInstances", routing::post(describe_instances))
        .route("/StartInstances", routing::post(start_instances))
        .route("/StopInstances", routing::post(stop_instances))
        .route("/RebootInstances", routing::post(reboot_instances))
        .route("/TerminateInstances", routing::post(terminate_instances))
        .route(
            "/ModifyInstanceAttribute",
            routing::post(modify_instance_attribute),
        )
        .route(
            "/DescribeInstanceTypes",
            routing::post(describe_instance_types),
        )
        .route(
            "/DescribeInstanceStatus",
            routing::post(describe_instance_status),
        )
}
