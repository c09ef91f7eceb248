// src/routes/mod.rs
use crate::state::AppState;
use axum::Router;

pub mod backup;
pub mod customizations;
pub mod images;
pub mod instances;
pub mod key_pairs;
pub mod middleware;
pub mod networks;
pub mod security_groups;
pub mod tags;
pub mod volumes;

pub fn all_routes() -> Router<AppState> {
    Router::new()
        .merge(instances::create_route())
        .merge(volumes::create_route())
        .merge(networks::create_route())
        .merge(security_groups::create_route())
        .merge(images::create_route())
        .merge(key_pairs::create_route())
        .merge(tags::create_route())
        .merge(backup::create_route())
        .merge(customizations::create_route())
}
