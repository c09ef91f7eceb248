use crate::models::status::project_volume_state;
use crate::routes::middleware::AccountId;
use crate::services::volumes::{self, CreateVolumeParams, VolumeView};
use crate::utils::pagination::PageParams;
use crate::{errors, AppState};
use axum::{extract, http, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVolumeRequest {
    #[serde(default)]
    #[validate(length(max = 64))]
    pub name: Option<String>,
    pub size: u64,
    #[serde(default)]
    pub volume_type: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeVolumesRequest {
    #[serde(rename = "VolumeId")]
    pub volume_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeIdRequest {
    pub volume_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachVolumeRequest {
    pub volume_id: Uuid,
    pub instance_id: Uuid,
    pub device: String,
}

fn volume_item(view: &VolumeView) -> Value {
    let record = &view.record;
    json!({
        "volumeId": record.id,
        "size": record.config.get("size_gb"),
        "volumeType": record.config.get("volume_type"),
        "status": view.state,
        "availabilityZone": record.config.get("availability_zone"),
        "createTime": record.created_at.to_rfc3339(),
        "attachmentSet": record.parent_id.map(|instance_id| vec![json!({
            "instanceId": instance_id,
            "device": record.config.get("device"),
            "status": "attached",
        })]).unwrap_or_default(),
        "tagSet": record.tags.iter().map(|tag| json!({ "key": tag })).collect::<Vec<_>>(),
        "nvl-name": &record.name,
        "nvl-state": record.status.as_str(),
    })
}

pub async fn create_volume(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<CreateVolumeRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    request.validate()?;
    let ctx = state.ctx(account.0);
    let record = volumes::create_volume(
        &ctx,
        CreateVolumeParams {
            name: request.name.unwrap_or_else(|| "volume".to_string()),
            size_gb: request.size,
            volume_type: request.volume_type,
            availability_zone: request.availability_zone,
        },
    )
    .await?;

    let view = VolumeView {
        state: project_volume_state(record.status, false),
        record,
    };
    let mut body = volume_item(&view);
    body["requestId"] = json!(Uuid::new_v4());
    Ok((http::StatusCode::CREATED, Json(body)))
}

pub async fn describe_volumes(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeVolumesRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let page = request.page.resolve()?;
    let ctx = state.ctx(account.0);
    let views = volumes::describe_volumes(&ctx, &request.volume_ids);
    let (page_views, next_token) = page.apply(&views.iter().collect::<Vec<_>>());

    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "volumeSet": page_views.iter().map(|view| volume_item(view)).collect::<Vec<_>>(),
        "nextToken": next_token,
    })))
}

pub async fn delete_volume(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<VolumeIdRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    volumes::delete_volume(&ctx, request.volume_id).await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub async fn attach_volume(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<AttachVolumeRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    volumes::attach_volume(&ctx, request.volume_id, request.instance_id, &request.device).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "volumeId": request.volume_id,
        "instanceId": request.instance_id,
        "device": request.device,
        "status": "attached",
    })))
}

pub async fn detach_volume(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<VolumeIdRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    volumes::detach_volume(&ctx, request.volume_id).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "volumeId": request.volume_id,
        "status": "detached",
    })))
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/CreateVolume", routing::post(create_volume))
        .route("/DescribeVolumes", routing::post(describe_volumes))
        .route("/DeleteVolume", routing::post(delete_volume))
        .route("/AttachVolume", routing::post(attach_volume))
        .route("/DetachVolume", routing::post(detach_volume))
}
