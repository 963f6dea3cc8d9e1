use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::blend::{
    blend_predicted_point, blend_predicted_speed, heading_marker, interpolate, predicted_segment,
    speed_series, trajectory_overlay, Segment, SpeedPoint, HEADING_MARKER_DEG,
};
use super::manager::CursorManager;
use super::sample::Sample;
use super::types::PlaybackSettings;
use crate::relay::{select_relays, Candidate, GeoPoint, RelaySelection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Device,
    Relay,
    Candidate,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NodeView {
    pub node_id: String,
    pub kind: MarkerKind,
    pub playback_index: usize,
    pub coverage_radius_m: f64,
    pub sample: Sample,
}

/// Everything rendered for one playback tick.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TickSnapshot {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window_index: u64,
    pub device_id: String,
    pub device_index: usize,
    pub device: Sample,
    pub in_zone: bool,
    pub relays: RelaySelection,
    pub heading_marker: GeoPoint,
    pub predicted_segment: Option<Segment>,
    pub predicted_marker: Option<GeoPoint>,
    pub blended_speed_kmh: f64,
    pub nodes: Vec<NodeView>,
}

/// Interpolated device position between two playback ticks.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceFrame {
    pub device_index: usize,
    pub sub_step: u32,
    pub sub_step_count: u32,
    pub position: GeoPoint,
}

/// Animation state for the device between two samples.
#[derive(Debug, Clone)]
pub struct FrameState {
    pub device_index: usize,
    pub from: Sample,
    pub to: Option<Sample>,
    pub sub_step: u32,
    pub sub_step_count: u32,
}

impl FrameState {
    /// Moves one sub-step forward. Returns false once the animation is done
    /// or when there is no next sample to move toward.
    pub fn step(&mut self) -> bool {
        if self.to.is_none() || self.sub_step >= self.sub_step_count {
            return false;
        }
        self.sub_step += 1;
        true
    }

    pub fn frame(&self) -> DeviceFrame {
        let position = match &self.to {
            Some(next) => interpolate(&self.from, next, self.sub_step, self.sub_step_count),
            None => self.from.position(),
        };
        DeviceFrame {
            device_index: self.device_index,
            sub_step: self.sub_step,
            sub_step_count: self.sub_step_count,
            position,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrajectoryView {
    pub node_id: String,
    pub window_index: Option<u64>,
    pub playback_index: Option<usize>,
    pub real: Vec<GeoPoint>,
    pub predicted: Vec<GeoPoint>,
    pub speed: Vec<SpeedPoint>,
}

/// Builds the tick output from the current cursors.
///
/// `None` when the device has no current sample.
pub fn build_snapshot(manager: &CursorManager, settings: &PlaybackSettings) -> Option<TickSnapshot> {
    let session = manager.session();
    let device_cfg = session.device();
    let device_state = manager.node(&device_cfg.id)?;
    let device_index = device_state.current_index()?;
    let device = device_state.current()?.clone();

    let candidates: Vec<Candidate<'_>> = session
        .nodes()
        .iter()
        .map(|node| Candidate {
            node_id: &node.id,
            sample: manager.node(&node.id).and_then(|s| s.current()),
        })
        .collect();

    let relays = select_relays(
        &device_cfg.id,
        &device,
        &candidates,
        device_cfg.zone_radius_m(settings.default_zone_radius_km),
        settings.outside_threshold_m,
    );

    let nodes = session
        .nodes()
        .iter()
        .filter_map(|node| {
            let state = manager.node(&node.id)?;
            let index = state.current_index()?;
            let sample = state.current()?.clone();
            let kind = if node.id == device_cfg.id {
                MarkerKind::Device
            } else if relays.is_selected(&node.id) {
                MarkerKind::Relay
            } else {
                MarkerKind::Candidate
            };
            Some(NodeView {
                node_id: node.id.clone(),
                kind,
                playback_index: index,
                coverage_radius_m: node.coverage_radius_m(settings.default_coverage_radius_km),
                sample,
            })
        })
        .collect();

    let segment = predicted_segment(&device_state.history, device_index);
    let predicted_marker = segment
        .as_ref()
        .map(|_| blend_predicted_point(&device, settings.marker_predicted_ratio));

    Some(TickSnapshot {
        session_id: session.id,
        generated_at: Utc::now(),
        window_index: manager.window_index(),
        device_id: device_cfg.id.clone(),
        device_index,
        in_zone: !relays.device_outside,
        heading_marker: heading_marker(&device, HEADING_MARKER_DEG),
        predicted_segment: segment,
        predicted_marker,
        blended_speed_kmh: blend_predicted_speed(&device, settings.speed_predicted_weight),
        relays,
        device,
        nodes,
    })
}

/// Starting animation state for the device at its current cursor.
pub fn device_frame_state(manager: &CursorManager, settings: &PlaybackSettings) -> Option<FrameState> {
    let state = manager.node(manager.session().device_id())?;
    Some(FrameState {
        device_index: state.current_index()?,
        from: state.current()?.clone(),
        to: state.next().cloned(),
        sub_step: 0,
        sub_step_count: settings.sub_steps.max(1),
    })
}

pub fn build_trajectory(
    manager: &CursorManager,
    node_id: &str,
    settings: &PlaybackSettings,
) -> Option<TrajectoryView> {
    let state = manager.node(node_id)?;
    Some(TrajectoryView {
        node_id: node_id.to_string(),
        window_index: state.history_window,
        playback_index: state.current_index(),
        real: state.history.iter().map(Sample::position).collect(),
        predicted: trajectory_overlay(&state.history, settings.overlay_predicted_ratio),
        speed: speed_series(&state.history, settings.speed_predicted_weight),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::manager::FetchOutcome;
    use crate::playback::sample::sample_at;
    use crate::session::{Session, SessionConfig};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn manager() -> CursorManager {
        let config = SessionConfig::from_json(
            r#"{"nodes": [
                {"id": "dev", "role": "device", "zoneRadius": 1},
                {"id": "near", "coverageRadius": 0.5},
                {"id": "far"}
            ]}"#,
        )
        .unwrap();
        CursorManager::new(
            Session::new(config).unwrap(),
            Arc::new(MemoryStore::new()),
            10,
        )
    }

    fn feed(manager: &mut CursorManager, node: &str, samples: Vec<Sample>) {
        let outcome = FetchOutcome {
            session_id: manager.session().id,
            node_id: node.to_string(),
            window: 1,
            result: Ok(samples),
        };
        manager.apply_fetch(outcome);
    }

    #[test]
    fn snapshot_marks_selected_relays() {
        let mut m = manager();
        let mut dev = sample_at(0, 36.750, 3.060);
        dev.predicted_latitude = 36.760;
        feed(&mut m, "dev", vec![dev, sample_at(1, 36.7505, 3.060)]);
        feed(&mut m, "near", vec![sample_at(0, 36.751, 3.060)]);
        feed(&mut m, "far", vec![sample_at(0, 36.800, 3.060)]);

        let snap = build_snapshot(&m, &PlaybackSettings::default()).unwrap();

        assert_eq!(snap.device_id, "dev");
        assert!(snap.in_zone);
        assert_eq!(
            snap.relays.primary.as_ref().map(|c| c.node_id.as_str()),
            Some("near")
        );
        let kinds: Vec<_> = snap.nodes.iter().map(|n| (n.node_id.as_str(), n.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("dev", MarkerKind::Device),
                ("near", MarkerKind::Relay),
                ("far", MarkerKind::Candidate)
            ]
        );
        assert_eq!(snap.nodes[1].coverage_radius_m, 500.0);
        assert!(snap.predicted_segment.is_some());
        let marker = snap.predicted_marker.unwrap();
        assert!((marker.latitude - (36.750 + 0.010 * 0.2)).abs() < 1e-9);
    }

    #[test]
    fn window_end_skips_predicted_path() {
        let mut m = manager();
        feed(&mut m, "dev", vec![sample_at(0, 36.750, 3.060)]);

        let snap = build_snapshot(&m, &PlaybackSettings::default()).unwrap();
        assert!(snap.predicted_segment.is_none());
        assert!(snap.predicted_marker.is_none());

        let mut frame = device_frame_state(&m, &PlaybackSettings::default()).unwrap();
        assert!(!frame.step());
        assert_eq!(frame.frame().position, GeoPoint::new(36.750, 3.060));
    }

    #[test]
    fn no_device_data_means_no_snapshot() {
        let mut m = manager();
        feed(&mut m, "near", vec![sample_at(0, 36.751, 3.060)]);
        assert!(build_snapshot(&m, &PlaybackSettings::default()).is_none());
        assert!(device_frame_state(&m, &PlaybackSettings::default()).is_none());
    }

    #[test]
    fn frame_walks_to_next_sample() {
        let mut m = manager();
        feed(
            &mut m,
            "dev",
            vec![sample_at(0, 36.750, 3.060), sample_at(1, 36.752, 3.060)],
        );
        let settings = PlaybackSettings {
            sub_steps: 4,
            ..Default::default()
        };
        let mut frame = device_frame_state(&m, &settings).unwrap();

        let mut steps = 0;
        while frame.step() {
            steps += 1;
        }
        assert_eq!(steps, 4);
        let end = frame.frame();
        assert_eq!(end.sub_step, 4);
        assert!((end.position.latitude - 36.752).abs() < 1e-12);
    }

    #[test]
    fn trajectory_blends_prediction() {
        let mut m = manager();
        let mut s = sample_at(0, 36.750, 3.060);
        s.predicted_latitude = 36.760;
        s.speed_kmh = 40.0;
        s.predicted_speed_kmh = 60.0;
        feed(&mut m, "near", vec![s]);

        let view = build_trajectory(&m, "near", &PlaybackSettings::default()).unwrap();
        assert_eq!(view.real.len(), 1);
        assert!((view.predicted[0].latitude - 36.753).abs() < 1e-9);
        assert!((view.speed[0].blended_kmh - 46.0).abs() < 1e-9);
        assert!(build_trajectory(&m, "missing", &PlaybackSettings::default()).is_none());
    }
}
