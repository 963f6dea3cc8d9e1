use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Device,
    #[serde(other)]
    Edge,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ZoneInfo {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One configured node. Radii are in kilometres.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "zoneRadius", alias = "zoneRadiusKm")]
    pub zone_radius_km: Option<f64>,
    #[serde(default, rename = "coverageRadius", alias = "coverageRadiusKm")]
    pub coverage_radius_km: Option<f64>,
    #[serde(default)]
    pub zone_center_lat: Option<f64>,
    #[serde(default)]
    pub zone_center_lon: Option<f64>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Node whose history this node mirrors with jitter, for nodes without a feed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_of: Option<String>,
}

impl NodeConfig {
    pub fn is_device(&self) -> bool {
        self.role == Some(Role::Device)
    }

    /// Zone radius in metres. Unset, zero or negative radii use `default_km`.
    pub fn zone_radius_m(&self, default_km: f64) -> f64 {
        radius_m(self.zone_radius_km, default_km)
    }

    pub fn coverage_radius_m(&self, default_km: f64) -> f64 {
        radius_m(self.coverage_radius_km, default_km)
    }

    /// Node whose feed is fetched for this node.
    pub fn feed_id(&self) -> &str {
        self.shadow_of.as_deref().unwrap_or(&self.id)
    }
}

fn radius_m(configured_km: Option<f64>, default_km: f64) -> f64 {
    configured_km.filter(|km| *km > 0.0).unwrap_or(default_km) * 1000.0
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<ZoneInfo>,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}
