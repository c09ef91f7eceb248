use crate::models::instance::TagPair;
use crate::routes::middleware::AccountId;
use crate::services::tags;
use crate::utils::pagination::PageParams;
use crate::{errors, AppState};
use axum::{extract, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagsRequest {
    #[serde(rename = "ResourceId")]
    pub resource_ids: Vec<Uuid>,
    #[serde(rename = "Tag")]
    pub tags: Vec<TagPair>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeTagsRequest {
    #[serde(flatten)]
    pub page: PageParams,
}

pub async fn create_tags(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<TagsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    if request.resource_ids.is_empty() {
        return Err(errors::AppError::bad_request(
            "At least one ResourceId is required",
        ));
    }
    let ctx = state.ctx(account.0);
    tags::create_tags(&ctx, &request.resource_ids, &request.tags)?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub async fn delete_tags(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<TagsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    tags::delete_tags(&ctx, &request.resource_ids, &request.tags)?;
    Ok(Json(json!({ "requestId": Uuid::new_v4(), "return": true })))
}

pub async fn describe_tags(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeTagsRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let page = request.page.resolve()?;
    let ctx = state.ctx(account.0);
    let views = tags::describe_tags(&ctx);
    let (page_views, next_token) = page.apply(&views.iter().collect::<Vec<_>>());

    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "tagSet": page_views.iter().map(|view| json!({
            "resourceId": view.resource_id,
            "resourceType": view.resource_type,
            "key": &view.key,
        })).collect::<Vec<_>>(),
        "nextToken": next_token,
    })))
}

pub fn create_route() -> Router<AppState> {
    Router::new()
        .route("/CreateTags", routing::post(create_tags))
        .route("/DeleteTags", routing::post(delete_tags))
        .route("/DescribeTags", routing::post(describe_tags))
}
