//! Route table of the emulated charger API

use std::path::Path;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::handlers::{self, AppState};

/// Prefix shared by every API route
pub const API_PREFIX: &str = "/api/v2";

/// Largest accepted request body; firmware images go well past axum's default
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the API router
///
/// Unmatched paths fall through to `static_dir` when one is given.
pub fn create_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        // Charger
        .route("/charger/status", get(handlers::charger_status))
        .route("/charger/insert/:slot", post(handlers::insert_battery))
        .route("/charger/eject/:slot", post(handlers::eject_battery))
        .route("/charger/bulk_insert", post(handlers::bulk_insert))
        // Device
        .route("/device/info", get(handlers::device_info))
        .route("/device/firmware_charger", post(handlers::upload_main_firmware))
        .route("/device/firmware_rear", post(handlers::upload_rear_firmware))
        .route("/device/reboot", post(handlers::reboot))
        // Debug
        .route("/debug/set_charge/:slot", post(handlers::set_charge))
        .route("/debug/firmware_state", get(handlers::firmware_state))
        .route("/debug/set_firmware_version", post(handlers::set_firmware_version))
        .route("/debug/set_target_version", post(handlers::set_target_version))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let mut router = Router::new().nest(API_PREFIX, api);
    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router.layer(CorsLayer::permissive()).with_state(state)
}
