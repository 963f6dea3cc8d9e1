mod error;
mod types;

use std::collections::HashSet;

use uuid::Uuid;

use crate::store::{CursorStore, SESSION_CONFIG_KEY};

pub use error::{SaveError, SessionError};
pub use types::{NodeConfig, Role, SessionConfig, ZoneInfo};

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A validated configuration with its device resolved.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    config: SessionConfig,
    device_index: usize,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        if config.nodes.is_empty() {
            return Err(SessionError::NoNodes);
        }

        let mut seen = HashSet::new();
        for node in &config.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(SessionError::DuplicateNode(node.id.clone()));
            }
        }

        for node in &config.nodes {
            let Some(reference) = node.shadow_of.as_deref() else {
                continue;
            };
            let target = config
                .nodes
                .iter()
                .find(|n| n.id == reference)
                .ok_or_else(|| SessionError::UnknownShadowReference {
                    node: node.id.clone(),
                    reference: reference.to_string(),
                })?;
            if target.shadow_of.is_some() {
                return Err(SessionError::ChainedShadow(node.id.clone()));
            }
        }

        // first node marked as device, else the first node
        let device_index = config.nodes.iter().position(|n| n.is_device()).unwrap_or(0);

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            device_index,
        })
    }

    /// Reads the stored configuration.
    pub fn load(store: &dyn CursorStore) -> Result<Self, SessionError> {
        let json = store
            .get(SESSION_CONFIG_KEY)
            .ok_or(SessionError::NotConfigured)?;
        Self::new(SessionConfig::from_json(&json)?)
    }

    pub fn save(config: &SessionConfig, store: &dyn CursorStore) -> Result<(), SaveError> {
        let json = config.to_json()?;
        store.set(SESSION_CONFIG_KEY, &json)?;
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_config(self) -> SessionConfig {
        self.config
    }

    pub fn device(&self) -> &NodeConfig {
        &self.config.nodes[self.device_index]
    }

    pub fn device_id(&self) -> &str {
        &self.device().id
    }

    pub fn nodes(&self) -> &[NodeConfig] {
        &self.config.nodes
    }
}
