use crate::errors::AppError;
use crate::orchestrator::ImageDetail;
use crate::services::Ctx;
use uuid::Uuid;

/// The image catalog lives in the backend; this plugin only projects it.
pub async fn describe_images(
    ctx: &Ctx<'_>,
    image_ids: &[Uuid],
) -> Result<Vec<ImageDetail>, AppError> {
    let images = ctx.orchestrator.list_images().await?;
    Ok(images
        .into_iter()
        .filter(|image| image_ids.is_empty() || image_ids.contains(&image.uuid))
        .collect())
}

pub async fn image_detail(ctx: &Ctx<'_>, image_id: Uuid) -> Result<ImageDetail, AppError> {
    Ok(ctx.orchestrator.image_detail(image_id).await?)
}
