use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::sample::{History, Sample};
use crate::session::Session;
use crate::source::SourceError;
use crate::store::{get_u64, playback_index_key, CursorStore, StoreError, WINDOW_INDEX_KEY};

#[derive(Debug, Clone, Default)]
pub struct NodeRuntimeState {
    pub history: History,
    /// Window the current history came from.
    pub history_window: Option<u64>,
    pub playback_index: usize,
    /// Raw tick counter, never wrapped.
    pub ticks: u64,
    pub fetch_failures: u32,
    pub last_error: Option<String>,
    pub last_fetched: Option<DateTime<Utc>>,
}

impl NodeRuntimeState {
    /// Playback index clamped to the current history.
    pub fn current_index(&self) -> Option<usize> {
        self.history.clamp_index(self.playback_index)
    }

    pub fn current(&self) -> Option<&Sample> {
        self.current_index().and_then(|i| self.history.get(i))
    }

    /// Sample after the current one, absent at the end of the window.
    pub fn next(&self) -> Option<&Sample> {
        self.current_index().and_then(|i| self.history.get(i + 1))
    }
}

/// One history fetch to issue for a node.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub session_id: Uuid,
    pub node_id: String,
    /// Node whose feed is read; differs from `node_id` for shadow nodes.
    pub feed_id: String,
    pub window: u64,
}

impl FetchRequest {
    pub fn is_shadow(&self) -> bool {
        self.node_id != self.feed_id
    }
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub session_id: Uuid,
    pub node_id: String,
    pub window: u64,
    pub result: Result<Vec<Sample>, SourceError>,
}

/// Owns the window cursor and every node's playback cursor and history
/// for one configuration session.
pub struct CursorManager {
    session: Session,
    store: Arc<dyn CursorStore>,
    loop_length: usize,
    window_index: u64,
    nodes: HashMap<String, NodeRuntimeState>,
}

impl CursorManager {
    pub fn new(session: Session, store: Arc<dyn CursorStore>, loop_length: usize) -> Self {
        let loop_length = loop_length.max(1);
        let window_index = get_u64(store.as_ref(), WINDOW_INDEX_KEY).unwrap_or(0);

        let nodes = session
            .nodes()
            .iter()
            .map(|node| {
                let ticks =
                    get_u64(store.as_ref(), &playback_index_key(&node.id)).unwrap_or(0);
                let state = NodeRuntimeState {
                    playback_index: (ticks % loop_length as u64) as usize,
                    ticks,
                    ..Default::default()
                };
                (node.id.clone(), state)
            })
            .collect();

        Self {
            session,
            store,
            loop_length,
            window_index,
            nodes,
        }
    }

    /// Rewinds the persisted playback counters of every node in `session`.
    pub fn reset_playback(store: &dyn CursorStore, session: &Session) -> Result<(), StoreError> {
        let entries: Vec<(String, String)> = session
            .nodes()
            .iter()
            .map(|node| (playback_index_key(&node.id), "0".to_string()))
            .collect();
        store.set_many(&entries)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn window_index(&self) -> u64 {
        self.window_index
    }

    pub fn node(&self, node_id: &str) -> Option<&NodeRuntimeState> {
        self.nodes.get(node_id)
    }

    /// Advances the window cursor, persists it and returns one fetch per node.
    pub fn advance_window(&mut self) -> Vec<FetchRequest> {
        self.window_index = match self.window_index.checked_add(1) {
            Some(next) => next,
            None => {
                log::warn!("Window index overflowed, restarting at 1");
                1
            }
        };
        if let Err(e) = self
            .store
            .set(WINDOW_INDEX_KEY, &self.window_index.to_string())
        {
            log::warn!("Failed to persist window index {}: {}", self.window_index, e);
        }
        log::info!("Window advanced to {}", self.window_index);

        self.fetch_requests(self.window_index)
    }

    pub fn fetch_requests(&self, window: u64) -> Vec<FetchRequest> {
        self.session
            .nodes()
            .iter()
            .map(|node| FetchRequest {
                session_id: self.session.id,
                node_id: node.id.clone(),
                feed_id: node.feed_id().to_string(),
                window,
            })
            .collect()
    }

    /// Applies a finished fetch. Returns whether the node's history changed.
    ///
    /// Failures keep the previous history. Results from another session or
    /// for a window older than the one already shown are dropped.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.session_id != self.session.id {
            log::debug!("Dropping fetch for {} from a previous session", outcome.node_id);
            return false;
        }
        let Some(state) = self.nodes.get_mut(&outcome.node_id) else {
            return false;
        };

        let samples = match outcome.result {
            Ok(samples) => samples,
            Err(e) => {
                log::warn!(
                    "Fetch for {} (window {}) failed: {}",
                    outcome.node_id,
                    outcome.window,
                    e
                );
                state.fetch_failures += 1;
                state.last_error = Some(e.to_string());
                return false;
            }
        };

        if state.history_window.is_some_and(|w| w > outcome.window) {
            log::debug!(
                "Dropping stale window {} for {}",
                outcome.window,
                outcome.node_id
            );
            return false;
        }

        state.history = History::new(samples);
        state.history_window = Some(outcome.window);
        state.last_error = None;
        state.last_fetched = Some(Utc::now());
        // shorter window: pull the cursor back onto the last sample
        state.playback_index = state.history.clamp_index(state.playback_index).unwrap_or(0);

        log::debug!(
            "{}: window {} with {} samples",
            outcome.node_id,
            outcome.window,
            state.history.len()
        );
        true
    }

    /// Advances one node's playback cursor modulo the loop length. Returns
    /// the store entry for its raw counter, left to the caller to persist.
    fn advance_playback(&mut self, node_id: &str) -> Option<(String, String)> {
        let state = self.nodes.get_mut(node_id)?;
        // only `ticks % loop_length` is ever read back
        state.ticks = state.ticks.wrapping_add(1);
        state.playback_index = (state.playback_index + 1) % self.loop_length;
        Some((playback_index_key(node_id), state.ticks.to_string()))
    }

    /// Advances every node and persists all counters in one store write.
    pub fn advance_all(&mut self) {
        let ids: Vec<String> = self.session.nodes().iter().map(|n| n.id.clone()).collect();
        let entries: Vec<(String, String)> = ids
            .iter()
            .filter_map(|id| self.advance_playback(id))
            .collect();

        if let Err(e) = self.store.set_many(&entries) {
            log::warn!("Failed to persist playback indexes: {}", e);
        }
    }
}
