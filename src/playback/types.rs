use serde::{Deserialize, Deserializer};
use std::time::Duration;

use super::error::SettingsError;
use super::synth::DEFAULT_SHADOW_OFFSET_M;
use crate::relay::DEFAULT_OUTSIDE_THRESHOLD_M;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    #[serde(deserialize_with = "deserialize_duration")]
    pub window_period: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub playback_period: Duration,
    /// Time the device marker takes to glide to the next sample.
    #[serde(deserialize_with = "deserialize_duration")]
    pub animation: Duration,
    pub loop_length: usize,
    pub sub_steps: u32,
    pub outside_threshold_m: f64,
    pub default_zone_radius_km: f64,
    pub default_coverage_radius_km: f64,
    pub marker_predicted_ratio: f64,
    pub overlay_predicted_ratio: f64,
    pub speed_predicted_weight: f64,
    pub shadow_max_offset_m: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            window_period: Duration::from_secs(2 * 60),
            playback_period: Duration::from_secs(10),
            animation: Duration::from_millis(1000),
            loop_length: 10,
            sub_steps: 20,
            outside_threshold_m: DEFAULT_OUTSIDE_THRESHOLD_M,
            default_zone_radius_km: 0.1,
            default_coverage_radius_km: 0.1,
            marker_predicted_ratio: 0.2,
            overlay_predicted_ratio: 0.3,
            speed_predicted_weight: 0.3,
            shadow_max_offset_m: DEFAULT_SHADOW_OFFSET_M,
        }
    }
}

impl PlaybackSettings {
    pub fn sub_step_period(&self) -> Duration {
        self.animation / self.sub_steps.max(1)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.loop_length == 0 {
            return Err(SettingsError::EmptyLoop);
        }

        let distances = [
            ("outside_threshold_m", self.outside_threshold_m),
            ("default_zone_radius_km", self.default_zone_radius_km),
            ("default_coverage_radius_km", self.default_coverage_radius_km),
            ("shadow_max_offset_m", self.shadow_max_offset_m),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(SettingsError::InvalidNumber(name));
            }
        }

        let ratios = [
            ("marker_predicted_ratio", self.marker_predicted_ratio),
            ("overlay_predicted_ratio", self.overlay_predicted_ratio),
            ("speed_predicted_weight", self.speed_predicted_weight),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::RatioOutOfRange(name));
            }
        }

        Ok(())
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_from_humantime() {
        let settings: PlaybackSettings = serde_yaml::from_str(
            "window_period: 90s\nplayback_period: 15s\nanimation: 500ms\nsub_steps: 10\n",
        )
        .unwrap();
        assert_eq!(settings.window_period, Duration::from_secs(90));
        assert_eq!(settings.playback_period, Duration::from_secs(15));
        assert_eq!(settings.sub_step_period(), Duration::from_millis(50));
        assert_eq!(settings.loop_length, 10);
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(PlaybackSettings::default().validate(), Ok(()));
    }

    #[test]
    fn non_finite_or_out_of_range_values_are_rejected() {
        let settings: PlaybackSettings =
            serde_yaml::from_str("shadow_max_offset_m: .nan\n").unwrap();
        assert_eq!(
            settings.validate(),
            Err(SettingsError::InvalidNumber("shadow_max_offset_m"))
        );

        let settings: PlaybackSettings =
            serde_yaml::from_str("outside_threshold_m: .inf\n").unwrap();
        assert_eq!(
            settings.validate(),
            Err(SettingsError::InvalidNumber("outside_threshold_m"))
        );

        let settings = PlaybackSettings {
            speed_predicted_weight: 1.5,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SettingsError::RatioOutOfRange("speed_predicted_weight"))
        );

        let settings = PlaybackSettings {
            loop_length: 0,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(SettingsError::EmptyLoop));
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(serde_yaml::from_str::<PlaybackSettings>("window_period: soon\n").is_err());
    }
}
