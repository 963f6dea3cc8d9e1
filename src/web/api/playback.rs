use axum::{
    extract::{Path, State},
    Json,
};

use crate::playback::{DeviceFrame, PlaybackStatus, TickSnapshot, TrajectoryView};
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::{Caller, View};
use crate::web::server::AppState;

#[utoipa::path(
    get,
    path = "/api/playback/status",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Engine mode, window index and per-node state", body = PlaybackStatus),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn status(
    State(state): State<AppState>,
    _caller: Caller<View>,
) -> ApiResult<Json<PlaybackStatus>> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.status()))
}

#[utoipa::path(
    get,
    path = "/api/playback/tick",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Latest playback tick", body = Option<TickSnapshot>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn tick(
    State(state): State<AppState>,
    _caller: Caller<View>,
) -> ApiResult<Json<Option<TickSnapshot>>> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.last_tick()))
}

#[utoipa::path(
    get,
    path = "/api/playback/frame",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Interpolated device position", body = Option<DeviceFrame>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn frame(
    State(state): State<AppState>,
    _caller: Caller<View>,
) -> ApiResult<Json<Option<DeviceFrame>>> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.frame()))
}

#[utoipa::path(
    get,
    path = "/api/playback/nodes/{id}/trajectory",
    params(
        ("id" = String, Path, description = "Node id")
    ),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Real path, blended prediction and speeds", body = TrajectoryView),
        (status = 404, description = "Node not in the active session", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "playback"
)]
pub async fn trajectory(
    State(state): State<AppState>,
    _caller: Caller<View>,
    Path(id): Path<String>,
) -> ApiResult<Json<TrajectoryView>> {
    let engine = state.engine.lock().await;
    engine
        .trajectory(&id)
        .map(Json)
        .ok_or(ApiError::NotFound("node_not_found"))
}
