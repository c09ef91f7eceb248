use crate::models::status::project_network_state;
use crate::routes::middleware::AccountId;
use crate::services::networks::{self, NetworkView};
use crate::{errors, AppState};
use axum::{extract, http, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateVpcRequest {
    #[serde(default)]
    #[validate(length(max = 64))]
    pub name: Option<String>,
    pub cidr_block: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeVpcsRequest {
    #[serde(rename = "VpcId")]
    pub vpc_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcIdRequest {
    pub vpc_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct CreateSubnetRequest {
    #[serde(default)]
    #[validate(length(max = 64))]
    pub name: Option<String>,
    pub vpc_id: Uuid,
    pub cidr_block: String,
    #[serde(default)]
    pub availability_zone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeSubnetsRequest {
    #[serde(rename = "SubnetId")]
    pub subnet_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubnetIdRequest {
    pub subnet_id: Uuid,
}

fn vpc_item(view: &NetworkView) -> Value {
    json!({
        "vpcId": view.record.id,
        "state": view.state,
        "cidrBlock": view.record.config.get("cidr"),
        "tagSet": view.record.tags.iter().map(|tag| json!({ "key": tag })).collect::<Vec<_>>(),
        "nvl-name": &view.record.name,
        "nvl-state": view.record.status.as_str(),
    })
}

fn subnet_item(view: &NetworkView) -> Value {
    json!({
        "subnetId": view.record.id,
        "vpcId": view.record.parent_id,
        "state": view.state,
        "cidrBlock": view.record.config.get("cidr"),
        "availabilityZone": view.record.config.get("availability_zone"),
        "nvl-name": &view.record.name,
        "nvl-state": view.record.status.as_str(),
    })
}

pub async fn create_vpc(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<CreateVpcRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    request.validate()?;
    let ctx = state.ctx(account.0);
    let record = networks::create_vpc(
        &ctx,
        request.name.as_deref().unwrap_or("vpc"),
        &request.cidr_block,
    )
    .await?;

    Ok((
        http::StatusCode::CREATED,
        Json(json!({
            "requestId": Uuid::new_v4(),
            "vpc": vpc_item(&NetworkView {
                state: project_network_state(record.status),
                record,
            }),
        })),
    ))
}

pub async fn describe_vpcs(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeVpcsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let views = networks::describe_vpcs(&ctx, &request.vpc_ids);
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "vpcSet": views.iter().map(vpc_item).collect::<Vec<_>>(),
    })))
}

pub async fn delete_vpc(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<VpcIdRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    networks::delete_vpc(&ctx, request.vpc_id).await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub async fn create_subnet(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<CreateSubnetRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    request.validate()?;
    let ctx = state.ctx(account.0);
    let record = networks::create_subnet(
        &ctx,
        request.name.as_deref().unwrap_or("subnet"),
        request.vpc_id,
        &request.cidr_block,
        request.availability_zone.as_deref(),
    )
    .await?;

    Ok((
        http::StatusCode::CREATED,
        Json(json!({
            "requestId": Uuid::new_v4(),
            "subnet": subnet_item(&NetworkView {
                state: project_network_state(record.status),
                record,
            }),
        })),
    ))
}

pub async fn describe_subnets(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeSubnetsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let views = networks::describe_subnets(&ctx, &request.subnet_ids);
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "subnetSet": views.iter().map(subnet_item).collect::<Vec<_>>(),
    })))
}

pub async fn delete_subnet(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<SubnetIdRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    networks::delete_subnet(&ctx, request.subnet_id).await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/CreateVpc", routing::post(create_vpc))
        .route("/DescribeVpcs", routing::post(describe_vpcs))
        .route("/DeleteVpc", routing::post(delete_vpc))
        .route("/CreateSubnet", routing::post(create_subnet))
        .route("/DescribeSubnets", routing::post(describe_subnets))
        .route("/DeleteSubnet", routing::post(delete_subnet))
}
