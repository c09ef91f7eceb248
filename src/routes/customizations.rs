use crate::routes::middleware::AccountId;
use crate::services::customizations;
use crate::{errors, AppState};
use axum::{extract, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplyCustomizationRequest {
    pub instance_id: Uuid,
    pub customization_name: String,
    #[serde(default, rename = "Arg")]
    pub args: Vec<CustomizationArg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomizationArg {
    pub key: String,
    pub value: String,
}

pub async fn describe_instance_customizations(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let specs = customizations::describe_customizations(&ctx).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "customizationSet": specs.iter().map(|spec| json!({
            "name": &spec.name,
            "description": &spec.desc,
            "paramSet": &spec.params,
        })).collect::<Vec<_>>(),
    })))
}

pub async fn apply_instance_customization(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<ApplyCustomizationRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let args: Vec<(String, String)> = request
        .args
        .into_iter()
        .map(|arg| (arg.key, arg.value))
        .collect();

    let ctx = state.ctx(account.0);
    customizations::apply_customization(
        &ctx,
        request.instance_id,
        &request.customization_name,
        &args,
    )
    .await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route(
            "/DescribeInstanceCustomizations",
            routing::post(describe_instance_customizations),
        )
        .route(
            "/ApplyInstanceCustomization",
            routing::post(apply_instance_customization),
        )
}
