use crate::errors::AppError;
use crate::orchestrator::{KeyPairDetail, OrchestratorError};
use crate::services::Ctx;
use crate::utils::regex;
use base64::Engine;
use tracing::info;

pub async fn describe_key_pairs(
    ctx: &Ctx<'_>,
    names: &[String],
) -> Result<Vec<KeyPairDetail>, AppError> {
    let key_pairs = ctx.orchestrator.list_key_pairs().await?;
    Ok(key_pairs
        .into_iter()
        .filter(|kp| names.is_empty() || names.contains(&kp.name))
        .collect())
}

/// The backend generates the pair; the private key appears in this response
/// exactly once and is never stored.
pub async fn create_key_pair(ctx: &Ctx<'_>, name: &str) -> Result<KeyPairDetail, AppError> {
    validate_name(name)?;
    let detail = ctx
        .orchestrator
        .create_key_pair(name)
        .await
        .map_err(conflict_on_duplicate)?;
    info!(key_pair = name, "key pair created");
    Ok(detail)
}

pub async fn import_key_pair(
    ctx: &Ctx<'_>,
    name: &str,
    public_key_material: &str,
) -> Result<KeyPairDetail, AppError> {
    validate_name(name)?;
    if public_key_material.trim().is_empty() {
        return Err(AppError::bad_request("PublicKeyMaterial must not be empty"));
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(public_key_material)
        .map_err(|_| AppError::bad_request("PublicKeyMaterial is not valid base64"))?;
    let public_key = String::from_utf8(decoded)
        .map_err(|_| AppError::bad_request("PublicKeyMaterial is not valid UTF-8"))?;

    let detail = ctx
        .orchestrator
        .import_key_pair(name, &public_key)
        .await
        .map_err(conflict_on_duplicate)?;
    info!(key_pair = name, "key pair imported");
    Ok(detail)
}

pub async fn delete_key_pair(ctx: &Ctx<'_>, name: &str) -> Result<(), AppError> {
    ctx.orchestrator
        .delete_key_pair(name)
        .await
        .map_err(|err| match err {
            OrchestratorError::Api { status: 404, .. } => {
                AppError::not_found(format!("Key pair '{}' not found", name))
            }
            other => other.into(),
        })?;
    info!(key_pair = name, "key pair deleted");
    Ok(())
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() || name.len() > 255 || !regex::KEY_PAIR_NAME.is_match(name) {
        return Err(AppError::bad_request(format!(
            "Invalid KeyName '{}'",
            name
        )));
    }
    Ok(())
}

fn conflict_on_duplicate(err: OrchestratorError) -> AppError {
    match err {
        OrchestratorError::Api { status: 409, message } => AppError::conflict(message),
        other => other.into(),
    }
}

#[cfg(test)]
#[path = "key_pairs_tests.rs"]
mod tests;
