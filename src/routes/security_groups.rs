use crate::models::security_group::{IpPermission, RuleDirection};
use crate::routes::middleware::AccountId;
use crate::services::security_groups::{self, GroupView};
use crate::{errors, AppState};
use axum::{extract, http, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSecurityGroupRequest {
    #[validate(length(min = 1, max = 64))]
    pub group_name: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub group_description: Option<String>,
    pub vpc_id: Uuid,
    /// Template to seed reserved rules from, when the backend defines one.
    #[serde(default, rename = "Nvl_Template")]
    pub template: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeSecurityGroupsRequest {
    #[serde(rename = "GroupId")]
    pub group_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupIdRequest {
    pub group_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleRequest {
    pub group_id: Uuid,
    #[serde(rename = "IpPermissions")]
    pub ip_permissions: Vec<IpPermission>,
}

fn group_item(view: &GroupView) -> Value {
    json!({
        "groupId": view.record.id,
        "groupName": &view.record.name,
        "groupDescription": view.record.config.get("desc"),
        "vpcId": view.record.parent_id,
        "ipPermissions": &view.ingress,
        "ipPermissionsEgress": &view.egress,
        "tagSet": view.record.tags.iter().map(|tag| json!({ "key": tag })).collect::<Vec<_>>(),
        "nvl-state": view.record.status.as_str(),
    })
}

pub async fn create_security_group(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<CreateSecurityGroupRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    request.validate()?;
    let ctx = state.ctx(account.0);
    let record = security_groups::create_security_group(
        &ctx,
        &request.group_name,
        request.group_description.as_deref().unwrap_or_default(),
        request.vpc_id,
        request.template.as_deref(),
    )
    .await?;

    Ok((
        http::StatusCode::CREATED,
        Json(json!({
            "requestId": Uuid::new_v4(),
            "groupId": record.id,
            "return": true,
        })),
    ))
}

pub async fn describe_security_groups(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeSecurityGroupsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let views = security_groups::describe_security_groups(&ctx, &request.group_ids).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "securityGroupInfo": views.iter().map(group_item).collect::<Vec<_>>(),
    })))
}

pub async fn delete_security_group(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<GroupIdRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    security_groups::delete_security_group(&ctx, request.group_id).await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

async fn rule_handler(
    state: AppState,
    account: AccountId,
    request: RuleRequest,
    direction: RuleDirection,
    revoke: bool,
) -> Result<Json<Value>, errors::AppError> {
    if request.ip_permissions.is_empty() {
        return Err(errors::AppError::bad_request(
            "At least one IpPermissions entry is required",
        ));
    }
    let ctx = state.ctx(account.0);
    for perm in &request.ip_permissions {
        if revoke {
            security_groups::revoke_rule(&ctx, direction, request.group_id, perm).await?;
        } else {
            security_groups::authorize_rule(&ctx, direction, request.group_id, perm).await?;
        }
    }
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub async fn authorize_security_group_ingress(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<RuleRequest>,
) -> Result<Json<Value>, errors::AppError> {
    rule_handler(state, account, request, RuleDirection::Ingress, false).await
}

pub async fn authorize_security_group_egress(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<RuleRequest>,
) -> Result<Json<Value>, errors::AppError> {
    rule_handler(state, account, request, RuleDirection::Egress, false).await
}

pub async fn revoke_security_group_ingress(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<RuleRequest>,
) -> Result<Json<Value>, errors::AppError> {
    rule_handler(state, account, request, RuleDirection::Ingress, true).await
}

pub async fn revoke_security_group_egress(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<RuleRequest>,
) -> Result<Json<Value>, errors::AppError> {
    rule_handler(state, account, request, RuleDirection::Egress, true).await
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route(
            "/CreateSecurityGroup",
            routing::post(create_security_group),
        )
        .route(
            "/DescribeSecurityGroups",
            routing::post(describe_security_groups),
        )
        .route(
            "/DeleteSecurityGroup",
            routing::post(delete_security_group),
        )
        .route(
            "/AuthorizeSecurityGroupIngress",
            routing::post(authorize_security_group_ingress),
        )
        .route(
            "/AuthorizeSecurityGroupEgress",
            routing::post(authorize_security_group_egress),
        )
        .route(
            "/RevokeSecurityGroupIngress",
            routing::post(revoke_security_group_ingress),
        )
        .route(
            "/RevokeSecurityGroupEgress",
            routing::post(revoke_security_group_egress),
        )
}
