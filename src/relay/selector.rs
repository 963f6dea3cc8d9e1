use serde::Serialize;
use utoipa::ToSchema;

use crate::playback::Sample;

pub const DEFAULT_OUTSIDE_THRESHOLD_M: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RelayCandidate {
    pub node_id: String,
    pub distance_m: f64,
}

/// A node evaluated as a possible relay, with its sample at the current tick.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub node_id: &'a str,
    pub sample: Option<&'a Sample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RelaySelection {
    pub primary: Option<RelayCandidate>,
    pub secondary: Option<RelayCandidate>,
    pub primary_distance_m: Option<f64>,
    pub device_outside: bool,
}

impl RelaySelection {
    pub fn is_selected(&self, node_id: &str) -> bool {
        [&self.primary, &self.secondary]
            .into_iter()
            .flatten()
            .any(|c| c.node_id == node_id)
    }
}

/// Ranks relay candidates for the device at the current tick.
///
/// While the device is inside its zone only in-zone candidates within
/// `zone_radius_m` qualify. Once it has exited, only candidates that have
/// also exited and lie within `outside_threshold_m` qualify.
pub fn select_relays(
    device_id: &str,
    device: &Sample,
    candidates: &[Candidate<'_>],
    zone_radius_m: f64,
    outside_threshold_m: f64,
) -> RelaySelection {
    let device_point = device.position();
    let device_outside = device.is_outside_zone();

    let mut ranked: Vec<RelayCandidate> = candidates
        .iter()
        .filter(|c| c.node_id != device_id)
        .filter_map(|c| c.sample.map(|s| (c.node_id, s)))
        .filter(|(_, s)| s.is_connectable())
        .map(|(id, s)| (id, s, s.position().distance_m(&device_point)))
        .filter(|(_, s, distance)| {
            if device_outside {
                s.is_outside_zone() && *distance <= outside_threshold_m
            } else {
                !s.is_outside_zone() && *distance <= zone_radius_m
            }
        })
        .map(|(id, _, distance)| RelayCandidate {
            node_id: id.to_string(),
            distance_m: distance,
        })
        .collect();

    // sort_by is stable, ties keep iteration order
    ranked.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

    let mut ranked = ranked.into_iter();
    let primary = ranked.next();
    let secondary = ranked.next();

    RelaySelection {
        primary_distance_m: primary.as_ref().map(|c| c.distance_m),
        primary,
        secondary,
        device_outside,
    }
}
