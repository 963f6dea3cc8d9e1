use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::playback::Engine;

use super::api::playback as playback_handlers;
use super::api::session as session_handlers;
use super::api_doc::ApiDoc;
use super::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<Mutex<Engine>>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Playback outputs
        .route("/api/playback/status", get(playback_handlers::status))
        .route("/api/playback/tick", get(playback_handlers::tick))
        .route("/api/playback/frame", get(playback_handlers::frame))
        .route(
            "/api/playback/nodes/{id}/trajectory",
            get(playback_handlers::trajectory),
        )
        // Session management
        .route(
            "/api/session",
            get(session_handlers::get_session).put(session_handlers::put_session),
        )
        .route("/api/session/stop", post(session_handlers::stop))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config, mut engine: Engine) -> std::io::Result<()> {
    let bind_addr = config.web.bind.clone();

    if let Err(e) = engine.start() {
        log::warn!("Playback not started: {}", e);
    }

    let state = AppState {
        config: Arc::new(config),
        engine: Arc::new(Mutex::new(engine)),
    };

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(state)).await
}
