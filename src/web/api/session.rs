use axum::{extract::State, Json};

use crate::playback::EngineMode;
use crate::session::SessionConfig;
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{Caller, Manage, View};
use crate::web::server::AppState;

#[utoipa::path(
    get,
    path = "/api/session",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Stored session configuration", body = Option<SessionConfig>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn get_session(
    State(state): State<AppState>,
    _caller: Caller<View>,
) -> ApiResult<Json<Option<SessionConfig>>> {
    let engine = state.engine.lock().await;
    Ok(Json(engine.session_config()))
}

#[utoipa::path(
    put,
    path = "/api/session",
    request_body = SessionConfig,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Session replaced and playback restarted", body = EngineMode),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn put_session(
    State(state): State<AppState>,
    caller: Caller<Manage>,
    Json(config): Json<SessionConfig>,
) -> ApiResult<Json<EngineMode>> {
    let mut engine = state.engine.lock().await;
    engine.reconfigure(config).await?;
    log::info!("Session replaced by {}", caller.name);

    Ok(Json(engine.status().mode))
}

#[utoipa::path(
    post,
    path = "/api/session/stop",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Playback stopped", body = EngineMode),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse)
    ),
    tag = "session"
)]
pub async fn stop(
    State(state): State<AppState>,
    caller: Caller<Manage>,
) -> ApiResult<Json<EngineMode>> {
    let mut engine = state.engine.lock().await;
    if engine.is_running() {
        log::info!("Playback stopped by {}", caller.name);
    }
    engine.stop().await;
    Ok(Json(engine.status().mode))
}
