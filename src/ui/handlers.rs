//! HTTP API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::task::JoinError;

use crate::control::ChannelSnapshot;
use crate::engine::Command;
use crate::error::CommandError;
use crate::ui::server::AppState;

/// API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

type CommandResponse = (StatusCode, Json<ApiResponse<()>>);

#[derive(Deserialize)]
pub struct PositionRequest {
    pub azimuth: f32,
    pub radius: f32,
}

#[derive(Deserialize)]
pub struct ElevationRequest {
    pub elevation: f32,
}

#[derive(Deserialize)]
pub struct WidthRequest {
    pub width: f32,
}

#[derive(Deserialize)]
pub struct BypassRequest {
    pub enabled: bool,
}

/// Get all source channels
pub async fn get_sources(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<ChannelSnapshot>>> {
    let snapshots = state.snapshots.read().clone();
    Json(ApiResponse::ok(snapshots))
}

/// Get one source channel
pub async fn get_source(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<usize>,
) -> (StatusCode, Json<ApiResponse<ChannelSnapshot>>) {
    let snapshot = state.snapshots.read().get(slot).cloned();
    match snapshot {
        Some(snapshot) => (StatusCode::OK, Json(ApiResponse::ok(snapshot))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("No slot {}", slot))),
        ),
    }
}

pub async fn set_position(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<usize>,
    Json(req): Json<PositionRequest>,
) -> CommandResponse {
    run_command(
        &state,
        Command::SetPosition {
            slot,
            azimuth: req.azimuth,
            radius: req.radius,
        },
    )
    .await
}

pub async fn set_elevation(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<usize>,
    Json(req): Json<ElevationRequest>,
) -> CommandResponse {
    run_command(&state, Command::SetElevation { slot, elevation: req.elevation }).await
}

pub async fn set_width(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<usize>,
    Json(req): Json<WidthRequest>,
) -> CommandResponse {
    run_command(&state, Command::SetWidth { slot, width: req.width }).await
}

pub async fn set_bypass(
    State(state): State<Arc<AppState>>,
    Path(slot): Path<usize>,
    Json(req): Json<BypassRequest>,
) -> CommandResponse {
    run_command(&state, Command::SetBypass { slot, enabled: req.enabled }).await
}

/// Drop every link into the spatializer
pub async fn unlink_all(State(state): State<Arc<AppState>>) -> CommandResponse {
    run_command(&state, Command::UnlinkAll).await
}

/// Invoke on the event loop without blocking the runtime
pub(crate) async fn invoke_blocking(
    state: &AppState,
    command: Command,
) -> Result<Result<(), CommandError>, JoinError> {
    let invoker = state.invoker.clone();
    tokio::task::spawn_blocking(move || invoker.invoke(command)).await
}

async fn run_command(state: &AppState, command: Command) -> CommandResponse {
    match invoke_blocking(state, command).await {
        Ok(Ok(())) => (StatusCode::OK, Json(ApiResponse::ok(()))),
        Ok(Err(e @ CommandError::InvalidSlot { .. })) => {
            (StatusCode::NOT_FOUND, Json(ApiResponse::error(e.to_string())))
        }
        Ok(Err(e)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error(e.to_string())),
        ),
        Err(e) => {
            tracing::error!("Command task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}
