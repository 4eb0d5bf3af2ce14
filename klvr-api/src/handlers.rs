//! Request handlers
//!
//! Each handler parses its input, calls into the device and shapes the JSON
//! reply. Parsing failures map onto the device error taxonomy so every
//! rejection carries the same `{error, detail}` body.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use klvr_core::version::VersionSources;
use klvr_core::{Board, ChargerStatus, Device, DeviceInfo, FirmwareSnapshot};
use serde_json::{json, Value};

use crate::error::{invalid, malformed, ApiError};

/// Header carrying the image version on firmware uploads
pub const FIRMWARE_VERSION_HEADER: &str = "x-firmware-version";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub device: Device,
    /// Refuse info queries while a board reboots
    pub strict_info: bool,
}

impl AppState {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            strict_info: false,
        }
    }

    pub fn with_strict_info(mut self, strict: bool) -> Self {
        self.strict_info = strict;
        self
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

type QueryParams = Result<Query<HashMap<String, String>>, QueryRejection>;

fn query_params(params: QueryParams) -> Result<HashMap<String, String>, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|e| malformed(format!("invalid query string: {}", e)))
}

/// Version header, absent or visible ASCII
fn version_header(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .get(FIRMWARE_VERSION_HEADER)
        .map(|v| {
            v.to_str()
                .map_err(|_| malformed(format!("`{}` header is not valid ASCII", FIRMWARE_VERSION_HEADER)))
        })
        .transpose()
}

fn parse_slot(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| invalid(format!("slot {:?} is not an integer", raw)))
}

fn parse_json(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| malformed(format!("invalid JSON body: {}", e)))
}

/// Numeric field that may arrive as a number or a numeric string
fn numeric_field(body: &Value, field: &str) -> Result<f64, ApiError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(malformed(format!("missing field `{}`", field))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| invalid(format!("`{}` is not a finite number", field))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("`{}` value {:?} is not numeric", field, s))),
        Some(other) => Err(invalid(format!("`{}` must be a number, got {}", field, other))),
    }
}

fn version_field(body: &Bytes) -> Result<String, ApiError> {
    let body = parse_json(body)?;
    body.get("version")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| malformed("missing field `version`"))
}

// Charger

pub async fn charger_status(State(state): State<AppState>) -> Json<ChargerStatus> {
    Json(state.device.status())
}

pub async fn insert_battery(
    State(state): State<AppState>,
    Path(slot): Path<String>,
    params: QueryParams,
) -> ApiResult<Value> {
    let slot = parse_slot(&slot)?;
    let params = query_params(params)?;
    let battery_type = params
        .get("type")
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("missing query parameter `type`"))?;

    state.device.slots().insert(slot, battery_type)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn eject_battery(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> ApiResult<Value> {
    let slot = parse_slot(&slot)?;
    state.device.slots().eject(slot)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn bulk_insert(State(state): State<AppState>) -> Json<Value> {
    let report = state.device.slots().bulk_insert();
    Json(json!({
        "ok": true,
        "inserted": report.inserted,
        "byType": report.by_type,
        "averageCharge": report.average_charge,
        "fullBatteries": report.full_batteries,
    }))
}

// Device

pub async fn device_info(State(state): State<AppState>) -> ApiResult<DeviceInfo> {
    if state.strict_info {
        Ok(Json(state.device.info_strict()?))
    } else {
        Ok(Json(state.device.info()))
    }
}

async fn upload(
    state: &AppState,
    board: Board,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    body: &Bytes,
) -> ApiResult<Value> {
    let header = version_header(headers)?;
    let sources = VersionSources::new(params.get("version").map(String::as_str), header);

    let receipt = state.device.firmware().upload(board, body, sources).await?;
    Ok(Json(json!({
        "status": "ok",
        "message": format!(
            "{} board firmware {} received ({} bytes)",
            board, receipt.version, receipt.size
        ),
        "version": receipt.version,
        "targetVersion": receipt.target_version,
    })))
}

pub async fn upload_main_firmware(
    State(state): State<AppState>,
    params: QueryParams,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let params = query_params(params)?;
    upload(&state, Board::Main, &params, &headers, &body).await
}

pub async fn upload_rear_firmware(
    State(state): State<AppState>,
    params: QueryParams,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let params = query_params(params)?;
    upload(&state, Board::Rear, &params, &headers, &body).await
}

pub async fn reboot(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let text = std::str::from_utf8(&body).map_err(|_| malformed("reboot body is not UTF-8"))?;
    let board: Board = text.parse()?;

    state.device.firmware().reboot(board)?;
    Ok(Json(json!({ "status": "rebooting", "board": board })))
}

// Debug

pub async fn set_charge(
    State(state): State<AppState>,
    Path(slot): Path<String>,
    body: Bytes,
) -> ApiResult<Value> {
    let slot = parse_slot(&slot)?;
    let percentage = numeric_field(&parse_json(&body)?, "percentage")?;

    let bay = state.device.slots().set_charge(slot, percentage)?;
    Ok(Json(json!({
        "status": "ok",
        "slot": bay.slot,
        "percentage": bay.state_of_charge_percent,
        "timeRemaining": bay.time_remaining_seconds,
    })))
}

pub async fn firmware_state(State(state): State<AppState>) -> Json<FirmwareSnapshot> {
    Json(state.device.firmware().snapshot())
}

pub async fn set_firmware_version(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Value> {
    let version = version_field(&body)?;
    state.device.firmware().set_current_version(version.clone());
    Ok(Json(json!({ "status": "ok", "currentVersion": version })))
}

pub async fn set_target_version(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Value> {
    let version = version_field(&body)?;
    state.device.firmware().set_target_version(version.clone());
    Ok(Json(json!({ "status": "ok", "targetVersion": version })))
}
