use crate::routes::middleware::AccountId;
use crate::services::images;
use crate::{errors, AppState};
use axum::{extract, routing, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DescribeImagesRequest {
    #[serde(rename = "ImageId")]
    pub image_ids: Vec<Uuid>,
}

/// Backend image states already use the projected vocabulary; anything
/// unexpected reads as pending.
fn image_state(state: &str) -> &str {
    match state {
        "available" | "pending" | "failed" => state,
        _ => "pending",
    }
}

pub async fn describe_images(
    extract::State(state): extract::State<AppState>,
    account: AccountId,
    Json(request): Json<DescribeImagesRequest>,
) -> Result<Json<Value>, errors::AppError> {
    let ctx = state.ctx(account.0);
    let images = images::describe_images(&ctx, &request.image_ids).await?;
    Ok(Json(json!({
        "requestId": Uuid::new_v4(),
        "imagesSet": images.iter().map(|image| json!({
            "imageId": image.uuid,
            "name": &image.name,
            "imageState": image_state(&image.state),
            "platformDetails": &image.platform,
            "nvl-minDiskSize": image.min_disk_size_gb,
            "nvl-minRamSize": image.min_ram_mb,
        })).collect::<Vec<_>>(),
    })))
}

pub fn create_route() -> Router<AppState> {
    Router::new().route("/DescribeImages", routing::post(describe_images))
}
