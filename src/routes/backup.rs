use crate::models::backup::BackupSchedule;
use crate::models::status::project_backup_job_state;
use crate::routes::middleware::AccountId;
use crate::services::backup::{self, CreateJobParams, JobUpdate, JobView};
use crate::{errors, AppState};
use axum::{extract, http, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBackupJobRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub availability_zone: String,
    #[serde(default = "default_hypervisor")]
    pub hypervisor: String,
    #[serde(default = "default_fullbackup_interval")]
    pub fullbackup_interval: u32,
    #[serde(default = "default_restore_points")]
    pub restore_points: u32,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(rename = "InstanceId")]
    pub instance_ids: Vec<Uuid>,
}

fn default_hypervisor() -> String {
    "vsphere".to_string()
}

fn default_fullbackup_interval() -> u32 {
    7
}

fn default_restore_points() -> u32 {
    14
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeBackupJobsRequest {
    #[serde(rename = "JobId")]
    pub job_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobIdRequest {
    pub job_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyBackupJobRequest {
    pub job_id: Uuid,
    #[serde(default)]
    pub fullbackup_interval: Option<u32>,
    #[serde(default)]
    pub restore_points: Option<u32>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobInstanceRequest {
    pub job_id: Uuid,
    pub instance_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRestorePointRequest {
    pub job_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRestorePointRequest {
    pub job_id: Uuid,
    pub restore_point_id: String,
}

fn job_item(view: &JobView) -> Value {
    json!({
        "jobId": view.record.id,
        "name": &view.job.name,
        "availabilityZone": &view.job.site,
        "hypervisor": &view.job.hypervisor,
        "jobState": project_backup_job_state(view.record.status),
        "fullbackupInterval": view.job.fullbackup_interval,
        "restorePoints": view.job.restore_points,
        "schedule": {
            "startTime": &view.job.schedule.start_time,
            "interval": &view.job.schedule.interval,
            "timezone": &view.job.schedule.timezone,
            "enabled": view.job.schedule.enabled,
        },
        "instanceSet": view.job.instances.iter()
            .map(|id| json!({ "instanceId": id }))
            .collect::<Vec<_>>(),
        "instanceNum": view.job.instances.len(),
        "nvl-state": view.record.status.as_str(),
    })
}

pub async fn create_backup_job(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<CreateBackupJobRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    request.validate()?;

    let defaults = BackupSchedule::default();
    let schedule = BackupSchedule {
        start_time: request.start_time.unwrap_or(defaults.start_time),
        interval: request.interval.unwrap_or(defaults.interval),
        timezone: request.timezone.unwrap_or(defaults.timezone),
        enabled: request.enabled.unwrap_or(defaults.enabled),
    };

    let ctx = state.ctx(account.0);
    let view = backup::create_backup_job(
        &ctx,
        CreateJobParams {
            name: request.name,
            site: request.availability_zone,
            hypervisor: request.hypervisor,
            fullbackup_interval: request.fullbackup_interval,
            restore_points: request.restore_points,
            schedule,
            instance_ids: request.instance_ids,
        },
    )
    .await?;

    Ok((
        http::StatusCode::CREATED,
        Json(json!({
            "requestId": Uuid::new_v4(),
            "jobsSet": [job_item(&view)],
        })),
    ))
}

pub async fn describe_backup_jobs(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeBackupJobsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let views = backup::describe_backup_jobs(&ctx, &request.job_ids)?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "jobsSet": views.iter().map(job_item).collect::<Vec<_>>(),
    })))
}

pub async fn modify_backup_job(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<ModifyBackupJobRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let view = backup::modify_backup_job(
        &ctx,
        request.job_id,
        JobUpdate {
            start_time: request.start_time,
            interval: request.interval,
            timezone: request.timezone,
            enabled: request.enabled,
            restore_points: request.restore_points,
            fullbackup_interval: request.fullbackup_interval,
        },
    )
    .await?;

    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "jobsSet": [job_item(&view)],
    })))
}

pub async fn delete_backup_job(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<JobIdRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    backup::delete_backup_job(&ctx, request.job_id).await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub async fn add_instance_to_backup_job(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<JobInstanceRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let view = backup::add_instance(&ctx, request.job_id, request.instance_id).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "jobsSet": [job_item(&view)],
    })))
}

pub async fn remove_instance_from_backup_job(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<JobInstanceRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let view = backup::remove_instance(&ctx, request.job_id, request.instance_id).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "jobsSet": [job_item(&view)],
    })))
}

pub async fn describe_restore_points(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<JobIdRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let points = backup::describe_restore_points(&ctx, request.job_id).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "restorePointSet": points.iter().map(|point| json!({
            "restorePointId": &point.id,
            "jobId": point.job_id,
            "type": point.kind,
            "status": &point.status,
            "size": {
                "totalMb": point.size.total_mb,
                "fullMb": point.size.full_mb,
                "incrementalMb": point.size.incremental_mb,
            },
            "instanceSet": point.instances.iter()
                .map(|id| json!({ "instanceId": id }))
                .collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })))
}

pub async fn create_restore_point(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<CreateRestorePointRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    let ctx = state.ctx(account.0);
    backup::create_restore_point(&ctx, request.job_id, request.name.as_deref()).await?;
    Ok((
        http::StatusCode::CREATED,
        Json(json!({ "requestId": Uuid::new_v4(), "return": true })),
    ))
}

pub async fn delete_restore_point(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DeleteRestorePointRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    backup::delete_restore_point(&ctx, request.job_id, &request.restore_point_id).await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/CreateBackupJob", routing::post(create_backup_job))
        .route("/DescribeBackupJobs", routing::post(describe_backup_jobs))
        .route("/ModifyBackupJob", routing::post(modify_backup_job))
        .route("/DeleteBackupJob", routing::post(delete_backup_job))
        .route(
            "/AddInstanceToBackupJob",
            routing::post(add_instance_to_backup_job),
        )
        .route(
            "/RemoveInstanceFromBackupJob",
            routing::post(remove_instance_from_backup_job),
        )
        .route(
            "/DescribeBackupJobRestorePoints",
            routing::post(describe_restore_points),
        )
        .route(
            "/CreateBackupJobRestorePoint",
            routing::post(create_restore_point),
        )
        .route(
            "/DeleteBackupJobRestorePoint",
            routing::post(delete_restore_point),
        )
}
