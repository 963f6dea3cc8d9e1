use serde::Serialize;
use utoipa::ToSchema;

use super::sample::Sample;
use crate::relay::GeoPoint;

/// Length of the heading indicator drawn from the device, in degrees.
pub const HEADING_MARKER_DEG: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Segment {
    pub from: GeoPoint,
    pub to: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SpeedPoint {
    pub timestamp: i64,
    pub real_kmh: f64,
    pub blended_kmh: f64,
}

/// Linear position between two consecutive samples.
///
/// `sub_step` runs from 0 (at `current`) to `sub_step_count` (at `next`).
pub fn interpolate(current: &Sample, next: &Sample, sub_step: u32, sub_step_count: u32) -> GeoPoint {
    let count = sub_step_count.max(1);
    let t = f64::from(sub_step.min(count)) / f64::from(count);
    GeoPoint::new(
        current.latitude + (next.latitude - current.latitude) * t,
        current.longitude + (next.longitude - current.longitude) * t,
    )
}

/// Moves the sample position toward its predicted position by `ratio`.
pub fn blend_predicted_point(sample: &Sample, ratio: f64) -> GeoPoint {
    GeoPoint::new(
        sample.latitude + (sample.predicted_latitude - sample.latitude) * ratio,
        sample.longitude + (sample.predicted_longitude - sample.longitude) * ratio,
    )
}

pub fn blend_predicted_speed(sample: &Sample, predicted_weight: f64) -> f64 {
    predicted_weight * sample.predicted_speed_kmh + (1.0 - predicted_weight) * sample.speed_kmh
}

/// End point of a short indicator along the sample's bearing.
pub fn heading_marker(sample: &Sample, length_deg: f64) -> GeoPoint {
    let bearing = sample.direction_deg.to_radians();
    GeoPoint::new(
        sample.latitude + length_deg * bearing.cos(),
        sample.longitude + length_deg * bearing.sin(),
    )
}

/// Segment from the sample at `index` to the one after it.
pub fn predicted_segment(history: &[Sample], index: usize) -> Option<Segment> {
    let current = history.get(index)?;
    let next = history.get(index + 1)?;
    Some(Segment {
        from: current.position(),
        to: next.position(),
    })
}

pub fn trajectory_overlay(history: &[Sample], ratio: f64) -> Vec<GeoPoint> {
    history
        .iter()
        .map(|s| blend_predicted_point(s, ratio))
        .collect()
}

pub fn speed_series(history: &[Sample], predicted_weight: f64) -> Vec<SpeedPoint> {
    history
        .iter()
        .map(|s| SpeedPoint {
            timestamp: s.timestamp,
            real_kmh: s.speed_kmh,
            blended_kmh: blend_predicted_speed(s, predicted_weight),
        })
        .collect()
}
