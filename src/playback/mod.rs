pub mod blend;
mod engine;
mod error;
mod manager;
pub mod sample;
mod snapshot;
pub mod synth;
mod types;

pub use engine::{fetch_node, Engine, EngineMode, NodeSummary, PlaybackStatus};
pub use error::{PlaybackError, SettingsError};
pub use manager::CursorManager;
pub use sample::Sample;
pub use snapshot::{
    build_snapshot, DeviceFrame, MarkerKind, NodeView, TickSnapshot, TrajectoryView,
};
pub use types::PlaybackSettings;
