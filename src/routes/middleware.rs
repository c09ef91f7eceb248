use crate::errors::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};

pub const ACCOUNT_HEADER: &str = "x-account-id";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Calling account, taken from the `x-account-id` header on every request.
pub struct AccountId(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AccountId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let account = parts
            .headers
            .get(ACCOUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::bad_request(format!("Missing or malformed {} header", ACCOUNT_HEADER))
            })?;
        Ok(AccountId(account.to_string()))
    }
}

/// Shared-key gate: when an API key is configured, every request must carry
/// it before any handler runs. Without one configured, requests pass.
pub async fn api_key_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = &state.config.api_key {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(AppError::unauthorized("Invalid or missing API key"));
        }
    }
    Ok(next.run(request).await)
}
