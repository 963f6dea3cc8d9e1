use serde::Serialize;
use std::ops::Deref;
use std::sync::Arc;

use crate::relay::GeoPoint;

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Sample {
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub direction_deg: f64,
    pub speed_kmh: f64,
    pub predicted_latitude: f64,
    pub predicted_longitude: f64,
    pub predicted_speed_kmh: f64,
    pub exit_probability: f64,
    pub potential_connection_loss: f64,
    pub obstacle_type: Option<String>,
}

impl Sample {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn predicted_position(&self) -> GeoPoint {
        GeoPoint::new(self.predicted_latitude, self.predicted_longitude)
    }

    /// Exit probability is effectively binary upstream; 1.0 means the node left its zone.
    pub fn is_outside_zone(&self) -> bool {
        self.exit_probability >= 1.0
    }

    pub fn is_connectable(&self) -> bool {
        self.potential_connection_loss == 0.0
    }
}

/// One fetched window of samples for a node.
///
/// Cloning is cheap; a replaced history never mutates the copies readers hold.
#[derive(Debug, Clone, Default)]
pub struct History {
    samples: Arc<[Sample]>,
}

impl History {
    /// Builds a history, stable-sorting by timestamp.
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self {
            samples: samples.into(),
        }
    }

    /// Index of the last valid sample, `None` when empty.
    pub fn last_index(&self) -> Option<usize> {
        self.samples.len().checked_sub(1)
    }

    /// Clamps `index` into the valid range. `None` when empty.
    pub fn clamp_index(&self, index: usize) -> Option<usize> {
        self.last_index().map(|last| index.min(last))
    }
}

impl Deref for History {
    type Target = [Sample];

    fn deref(&self) -> &Self::Target {
        &self.samples
    }
}

#[cfg(test)]
pub(crate) fn sample_at(timestamp: i64, latitude: f64, longitude: f64) -> Sample {
    Sample {
        timestamp,
        latitude,
        longitude,
        direction_deg: 0.0,
        speed_kmh: 30.0,
        predicted_latitude: latitude,
        predicted_longitude: longitude,
        predicted_speed_kmh: 30.0,
        exit_probability: 0.0,
        potential_connection_loss: 0.0,
        obstacle_type: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_sorted_by_timestamp() {
        let history = History::new(vec![
            sample_at(3, 0.0, 0.0),
            sample_at(1, 1.0, 1.0),
            sample_at(2, 2.0, 2.0),
        ]);
        let ts: Vec<i64> = history.iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![1, 2, 3]);
    }

    #[test]
    fn clamp_index_truncates_to_last_sample() {
        let history = History::new(vec![sample_at(1, 0.0, 0.0), sample_at(2, 0.0, 0.0)]);
        assert_eq!(history.clamp_index(0), Some(0));
        assert_eq!(history.clamp_index(7), Some(1));
        assert_eq!(History::default().clamp_index(3), None);
    }

    #[test]
    fn outside_zone_only_at_full_probability() {
        let mut s = sample_at(0, 0.0, 0.0);
        s.exit_probability = 0.99;
        assert!(!s.is_outside_zone());
        s.exit_probability = 1.0;
        assert!(s.is_outside_zone());
    }
}
