use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::playback::status,
        super::api::playback::tick,
        super::api::playback::frame,
        super::api::playback::trajectory,
        super::api::session::get_session,
        super::api::session::put_session,
        super::api::session::stop,
    ),
    components(
        schemas(
            ErrorResponse,
            crate::playback::PlaybackStatus,
            crate::playback::NodeSummary,
            crate::playback::EngineMode,
            crate::playback::TickSnapshot,
            crate::playback::NodeView,
            crate::playback::MarkerKind,
            crate::playback::DeviceFrame,
            crate::playback::TrajectoryView,
            crate::playback::Sample,
            crate::relay::GeoPoint,
            crate::relay::RelayCandidate,
            crate::relay::RelaySelection,
            crate::session::SessionConfig,
            crate::session::NodeConfig,
            crate::session::ZoneInfo,
            crate::session::Role,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Relay-O-Mat Playback API",
        description = "Trajectory playback and relay selection for simulated radio nodes",
        version = "0.1.0"
    ),
    tags(
        (name = "playback", description = "Playback outputs"),
        (name = "session", description = "Session configuration")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
