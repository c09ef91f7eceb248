use crate::routes::middleware::AccountId;
use crate::services::key_pairs;
use crate::{errors, AppState};
use axum::{extract, http, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeKeyPairsRequest {
    #[serde(rename = "KeyName")]
    pub key_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyNameRequest {
    pub key_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImportKeyPairRequest {
    pub key_name: String,
    pub public_key_material: String,
}

pub async fn describe_key_pairs(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeKeyPairsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let key_pairs = key_pairs::describe_key_pairs(&ctx, &request.key_names).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "keySet": key_pairs.iter().map(|kp| json!({
            "keyName": &kp.name,
            "keyFingerprint": &kp.fingerprint,
        })).collect::<Vec<_>>(),
    })))
}

pub async fn create_key_pair(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<KeyNameRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    let ctx = state.ctx(account.0);
    let detail = key_pairs::create_key_pair(&ctx, &request.key_name).await?;
    Ok((
        http::StatusCode::CREATED,
        Json(json!({
            "requestId": Uuid::new_v4(),
            "keyName": detail.name,
            "keyFingerprint": detail.fingerprint,
            "keyMaterial": detail.private_key,
        })),
    ))
}

pub async fn import_key_pair(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<ImportKeyPairRequest>,
) -> Result<(http::StatusCode, Json<Value>), errors::AppError> {
    let ctx = state.ctx(account.0);
    let detail =
        key_pairs::import_key_pair(&ctx, &request.key_name, &request.public_key_material).await?;
    Ok((
        http::StatusCode::CREATED,
        Json(json!({
            "requestId": Uuid::new_v4(),
            "keyName": detail.name,
            "keyFingerprint": detail.fingerprint,
        })),
    ))
}

pub async fn delete_key_pair(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<KeyNameRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    key_pairs::delete_key_pair(&ctx, &request.key_name).await?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/DescribeKeyPairs", routing::post(describe_key_pairs))
        .route("/CreateKeyPair", routing::post(create_key_pair))
        .route("/ImportKeyPair", routing::post(import_key_pair))
        .route("/DeleteKeyPair", routing::post(delete_key_pair))
}
