use serde::Deserialize;

use super::error::RecordError;
use crate::playback::Sample;

/// A history record as the predictor emits it. Every field is optional so
/// that incomplete records can be reported instead of failing the window.
/// The record's own `NodeId` is ignored; the window is keyed by the node
/// it was fetched for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSample {
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<i64>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "Direction")]
    pub direction: Option<f64>,
    #[serde(rename = "Speed_km_h")]
    pub speed_kmh: Option<f64>,
    pub predicted_lat: Option<f64>,
    pub predicted_lon: Option<f64>,
    pub predicted_speed: Option<f64>,
    pub exit_probability: Option<f64>,
    #[serde(rename = "Potential_Connection_Loss")]
    pub potential_connection_loss: Option<f64>,
    #[serde(rename = "Obstacle_Type")]
    pub obstacle_type: Option<String>,
}

fn required(value: Option<f64>, name: &'static str) -> Result<f64, RecordError> {
    let v = value.ok_or(RecordError::MissingField(name))?;
    finite(v, name)
}

fn finite(v: f64, name: &'static str) -> Result<f64, RecordError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(RecordError::NonFinite(name))
    }
}

fn optional(value: Option<f64>, default: f64, name: &'static str) -> Result<f64, RecordError> {
    value.map_or(Ok(default), |v| finite(v, name))
}

impl TryFrom<RawSample> for Sample {
    type Error = RecordError;

    fn try_from(raw: RawSample) -> Result<Self, Self::Error> {
        let timestamp = raw.timestamp.ok_or(RecordError::MissingField("Timestamp"))?;
        let latitude = required(raw.latitude, "Latitude")?;
        let longitude = required(raw.longitude, "Longitude")?;
        let predicted_latitude = required(raw.predicted_lat, "predicted_lat")?;
        let predicted_longitude = required(raw.predicted_lon, "predicted_lon")?;
        let speed_kmh = optional(raw.speed_kmh, 0.0, "Speed_km_h")?.max(0.0);

        Ok(Sample {
            timestamp,
            latitude,
            longitude,
            direction_deg: optional(raw.direction, 0.0, "Direction")?.rem_euclid(360.0),
            speed_kmh,
            predicted_latitude,
            predicted_longitude,
            predicted_speed_kmh: optional(raw.predicted_speed, speed_kmh, "predicted_speed")?
                .max(0.0),
            exit_probability: optional(raw.exit_probability, 0.0, "exit_probability")?
                .clamp(0.0, 1.0),
            potential_connection_loss: optional(
                raw.potential_connection_loss,
                0.0,
                "Potential_Connection_Loss",
            )?,
            obstacle_type: raw.obstacle_type.filter(|s| !s.is_empty()),
        })
    }
}

/// Parses a window payload, dropping records that cannot be used.
pub fn parse_history(node_id: &str, payload: &str) -> Result<Vec<Sample>, serde_json::Error> {
    let records: Vec<serde_json::Value> = serde_json::from_str(payload)?;
    let total = records.len();

    let samples: Vec<Sample> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let parsed = serde_json::from_value::<RawSample>(value)
                .map_err(|e| e.to_string())
                .and_then(|raw| Sample::try_from(raw).map_err(|e| e.to_string()));
            match parsed {
                Ok(sample) => Some(sample),
                Err(e) => {
                    log::warn!("Dropping record {} for {}: {}", i, node_id, e);
                    None
                }
            }
        })
        .collect();

    if samples.len() < total {
        log::debug!("{}: kept {} of {} records", node_id, samples.len(), total);
    }

    Ok(samples)
}
