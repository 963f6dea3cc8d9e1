use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

use super::error::PlaybackError;
use super::manager::{CursorManager, FetchOutcome, FetchRequest};
use super::snapshot::{
    build_snapshot, build_trajectory, device_frame_state, DeviceFrame, FrameState, TickSnapshot,
    TrajectoryView,
};
use super::synth::synthesize;
use super::types::PlaybackSettings;
use crate::session::{Role, SaveError, Session, SessionConfig};
use crate::source::HistorySource;
use crate::store::CursorStore;

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub enum EngineMode {
    Idle,
    Running {
        session_id: Uuid,
        start: DateTime<Utc>,
        device_id: String,
    },
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct NodeSummary {
    pub node_id: String,
    pub role: String,
    pub shadow_of: Option<String>,
    pub samples: usize,
    pub history_window: Option<u64>,
    pub playback_index: Option<usize>,
    pub ticks: u64,
    pub fetch_failures: u32,
    pub last_error: Option<String>,
    pub last_fetched: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PlaybackStatus {
    pub mode: EngineMode,
    pub window_index: Option<u64>,
    pub nodes: Vec<NodeSummary>,
}

struct Shared {
    mode: EngineMode,
    manager: Option<CursorManager>,
    last_tick: Option<TickSnapshot>,
    frame: Option<FrameState>,
}

fn lock(shared: &StdMutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

struct WorkerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Runs the window refresh, playback tick and device animation for the
/// session stored in the cursor store.
pub struct Engine {
    source: Arc<dyn HistorySource>,
    store: Arc<dyn CursorStore>,
    settings: Arc<PlaybackSettings>,
    shared: Arc<StdMutex<Shared>>,
    worker: Option<WorkerHandle>,
}

impl Engine {
    pub fn new(
        source: Arc<dyn HistorySource>,
        store: Arc<dyn CursorStore>,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            source,
            store,
            settings: Arc::new(settings),
            shared: Arc::new(StdMutex::new(Shared {
                mode: EngineMode::Idle,
                manager: None,
                last_tick: None,
                frame: None,
            })),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn status(&self) -> PlaybackStatus {
        let locked = lock(&self.shared);
        let Some(manager) = locked.manager.as_ref() else {
            return PlaybackStatus {
                mode: locked.mode.clone(),
                window_index: None,
                nodes: Vec::new(),
            };
        };

        let nodes = manager
            .session()
            .nodes()
            .iter()
            .filter_map(|node| {
                let state = manager.node(&node.id)?;
                Some(NodeSummary {
                    node_id: node.id.clone(),
                    role: node.role.unwrap_or(Role::Edge).to_string(),
                    shadow_of: node.shadow_of.clone(),
                    samples: state.history.len(),
                    history_window: state.history_window,
                    playback_index: state.current_index(),
                    ticks: state.ticks,
                    fetch_failures: state.fetch_failures,
                    last_error: state.last_error.clone(),
                    last_fetched: state.last_fetched,
                })
            })
            .collect();

        PlaybackStatus {
            mode: locked.mode.clone(),
            window_index: Some(manager.window_index()),
            nodes,
        }
    }

    pub fn last_tick(&self) -> Option<TickSnapshot> {
        lock(&self.shared).last_tick.clone()
    }

    pub fn frame(&self) -> Option<DeviceFrame> {
        lock(&self.shared).frame.as_ref().map(FrameState::frame)
    }

    pub fn trajectory(&self, node_id: &str) -> Option<TrajectoryView> {
        let locked = lock(&self.shared);
        build_trajectory(locked.manager.as_ref()?, node_id, &self.settings)
    }

    pub fn session_config(&self) -> Option<SessionConfig> {
        Session::load(self.store.as_ref())
            .ok()
            .map(Session::into_config)
    }

    /// Starts playback for the stored session.
    ///
    /// The persisted window index is advanced once before the first fetch.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.worker.is_some() {
            return Err(PlaybackError::AlreadyRunning);
        }

        let session = Session::load(self.store.as_ref())?;
        let session_id = session.id;
        let device_id = session.device_id().to_string();

        let mut manager =
            CursorManager::new(session, self.store.clone(), self.settings.loop_length);
        let requests = manager.advance_window();

        {
            let mut locked = lock(&self.shared);
            locked.mode = EngineMode::Running {
                session_id,
                start: Utc::now(),
                device_id: device_id.clone(),
            };
            locked.manager = Some(manager);
            locked.last_tick = None;
            locked.frame = None;
        }

        log::info!(
            "Playback started for session {} (device {}, {} nodes)",
            session_id,
            device_id,
            requests.len()
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_playback_loop(
            self.shared.clone(),
            self.source.clone(),
            self.settings.clone(),
            requests,
            stop_rx,
        ));
        self.worker = Some(WorkerHandle { stop_tx, join });

        Ok(())
    }

    /// Stops the worker and discards the session state. Fetches still in
    /// flight are ignored when they complete.
    pub async fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            let _ = worker.join.await;
            log::info!("Playback stopped");
        }
        let mut locked = lock(&self.shared);
        locked.mode = EngineMode::Idle;
        locked.manager = None;
        locked.last_tick = None;
        locked.frame = None;
    }

    /// Replaces the stored configuration and restarts with fresh cursors.
    ///
    /// Playback counters start again from zero; the window index keeps
    /// counting.
    pub async fn reconfigure(&mut self, config: SessionConfig) -> Result<(), PlaybackError> {
        let session = Session::new(config.clone())?;
        Session::save(&config, self.store.as_ref())?;
        self.stop().await;
        CursorManager::reset_playback(self.store.as_ref(), &session).map_err(SaveError::Store)?;
        self.start()
    }
}

pub async fn fetch_node(
    source: Arc<dyn HistorySource>,
    request: FetchRequest,
    max_offset_m: f64,
) -> FetchOutcome {
    let result = source
        .fetch(&request.feed_id, request.window)
        .await
        .map(|samples| {
            if request.is_shadow() {
                let mut rng = StdRng::from_entropy();
                synthesize(&samples, max_offset_m, &mut rng)
            } else {
                samples
            }
        });

    FetchOutcome {
        session_id: request.session_id,
        node_id: request.node_id,
        window: request.window,
        result,
    }
}

fn dispatch(
    requests: Vec<FetchRequest>,
    source: &Arc<dyn HistorySource>,
    settings: &PlaybackSettings,
    tx: &mpsc::UnboundedSender<FetchOutcome>,
) {
    for request in requests {
        let source = source.clone();
        let tx = tx.clone();
        let max_offset_m = settings.shadow_max_offset_m;
        tokio::spawn(async move {
            let outcome = fetch_node(source, request, max_offset_m).await;
            // receiver is gone once playback stopped
            let _ = tx.send(outcome);
        });
    }
}

fn playback_tick(shared: &StdMutex<Shared>, settings: &PlaybackSettings) {
    let mut locked = lock(shared);
    let Some(manager) = locked.manager.as_mut() else {
        return;
    };

    let snapshot = build_snapshot(manager, settings);
    let frame = device_frame_state(manager, settings);
    manager.advance_all();

    match &snapshot {
        Some(snap) => log::debug!(
            "Tick {} for {}: primary={:?} secondary={:?} in_zone={}",
            snap.device_index,
            snap.device_id,
            snap.relays.primary.as_ref().map(|c| c.node_id.as_str()),
            snap.relays.secondary.as_ref().map(|c| c.node_id.as_str()),
            snap.in_zone
        ),
        None => log::debug!("Tick skipped, no device sample"),
    }

    locked.last_tick = snapshot;
    locked.frame = frame;
}

fn animation_step(shared: &StdMutex<Shared>) {
    if let Some(frame) = lock(shared).frame.as_mut() {
        frame.step();
    }
}

async fn run_playback_loop(
    shared: Arc<StdMutex<Shared>>,
    source: Arc<dyn HistorySource>,
    settings: Arc<PlaybackSettings>,
    initial: Vec<FetchRequest>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel();

    // the first tick runs as soon as every node answered the first window
    let mut awaiting: HashSet<String> = initial.iter().map(|r| r.node_id.clone()).collect();
    dispatch(initial, &source, &settings, &fetch_tx);

    let now = Instant::now();
    let window_period = settings.window_period.max(MIN_PERIOD);
    let playback_period = settings.playback_period.max(MIN_PERIOD);
    let animation_period = settings.sub_step_period().max(MIN_PERIOD);
    let mut window_timer = interval_at(now + window_period, window_period);
    let mut playback_timer = interval_at(now + playback_period, playback_period);
    let mut animation_timer = interval_at(now + animation_period, animation_period);
    for timer in [&mut window_timer, &mut playback_timer, &mut animation_timer] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = window_timer.tick() => {
                let requests = {
                    let mut locked = lock(&shared);
                    match locked.manager.as_mut() {
                        Some(manager) => manager.advance_window(),
                        None => break,
                    }
                };
                dispatch(requests, &source, &settings, &fetch_tx);
            }
            _ = playback_timer.tick() => playback_tick(&shared, &settings),
            _ = animation_timer.tick() => animation_step(&shared),
            Some(outcome) = fetch_rx.recv() => {
                let node_id = outcome.node_id.clone();
                if let Some(manager) = lock(&shared).manager.as_mut() {
                    manager.apply_fetch(outcome);
                }
                if awaiting.remove(&node_id) && awaiting.is_empty() {
                    playback_tick(&shared, &settings);
                    playback_timer.reset();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::sample::sample_at;
    use crate::playback::Sample;
    use crate::source::SourceError;
    use crate::store::{MemoryStore, SESSION_CONFIG_KEY, WINDOW_INDEX_KEY};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedSource {
        windows: HashMap<String, Vec<Sample>>,
    }

    #[async_trait]
    impl HistorySource for FixedSource {
        async fn fetch(&self, node_id: &str, window: u64) -> Result<Vec<Sample>, SourceError> {
            self.windows
                .get(node_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound {
                    node: node_id.to_string(),
                    window,
                })
        }
    }

    const CONFIG: &str = r#"{"nodes": [
        {"id": "dev", "role": "device", "zoneRadius": 1},
        {"id": "relay"},
        {"id": "broken"},
        {"id": "shadow", "shadowOf": "relay"}
    ]}"#;

    fn source() -> Arc<dyn HistorySource> {
        let mut windows = HashMap::new();
        windows.insert(
            "dev".to_string(),
            vec![sample_at(0, 36.750, 3.060), sample_at(1, 36.751, 3.060)],
        );
        windows.insert(
            "relay".to_string(),
            vec![sample_at(0, 36.751, 3.060), sample_at(1, 36.752, 3.060)],
        );
        Arc::new(FixedSource { windows })
    }

    fn settings() -> PlaybackSettings {
        PlaybackSettings {
            window_period: Duration::from_secs(3600),
            playback_period: Duration::from_secs(3600),
            animation: Duration::from_millis(20),
            sub_steps: 2,
            ..Default::default()
        }
    }

    async fn wait_for_tick(engine: &Engine) -> TickSnapshot {
        for _ in 0..200 {
            if let Some(tick) = engine.last_tick() {
                return tick;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no tick produced");
    }

    #[tokio::test]
    async fn idle_without_configuration() {
        let mut engine = Engine::new(source(), Arc::new(MemoryStore::new()), settings());
        assert!(matches!(engine.start(), Err(PlaybackError::Inactive(_))));
        assert!(!engine.is_running());
        assert!(matches!(engine.status().mode, EngineMode::Idle));
    }

    #[tokio::test]
    async fn first_tick_follows_initial_fetch() {
        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_CONFIG_KEY, CONFIG).unwrap();
        store.set(WINDOW_INDEX_KEY, "41").unwrap();
        let mut engine = Engine::new(source(), store.clone(), settings());

        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(PlaybackError::AlreadyRunning)));
        let tick = wait_for_tick(&engine).await;

        assert_eq!(store.get(WINDOW_INDEX_KEY).as_deref(), Some("42"));
        assert_eq!(tick.window_index, 42);
        assert_eq!(tick.device_id, "dev");
        assert_eq!(tick.device_index, 0);
        assert!(tick.relays.is_selected("relay"));

        let status = engine.status();
        assert_eq!(status.window_index, Some(42));
        let broken = status.nodes.iter().find(|n| n.node_id == "broken").unwrap();
        assert_eq!(broken.samples, 0);
        assert_eq!(broken.fetch_failures, 1);
        let shadow = status.nodes.iter().find(|n| n.node_id == "shadow").unwrap();
        assert_eq!(shadow.samples, 2);
        let dev = status.nodes.iter().find(|n| n.node_id == "dev").unwrap();
        assert_eq!(dev.ticks, 1);
        assert_eq!(store.get("simulation_index.dev").as_deref(), Some("1"));

        let trajectory = engine.trajectory("dev").unwrap();
        assert_eq!(trajectory.real.len(), 2);

        engine.stop().await;
        assert!(engine.last_tick().is_none());
        assert!(engine.status().nodes.is_empty());
    }

    #[tokio::test]
    async fn animation_reaches_next_sample() {
        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_CONFIG_KEY, CONFIG).unwrap();
        let mut engine = Engine::new(source(), store, settings());
        engine.start().unwrap();
        wait_for_tick(&engine).await;

        for _ in 0..200 {
            if engine.frame().is_some_and(|f| f.sub_step == f.sub_step_count) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let frame = engine.frame().unwrap();
        assert_eq!(frame.sub_step, 2);
        assert!((frame.position.latitude - 36.751).abs() < 1e-12);
        engine.stop().await;
    }

    #[tokio::test]
    async fn reconfigure_rewinds_playback_cursors() {
        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_CONFIG_KEY, CONFIG).unwrap();
        store.set("simulation_index.dev", "6").unwrap();
        store.set("simulation_index.relay", "6").unwrap();
        let mut engine = Engine::new(source(), store.clone(), settings());

        engine.start().unwrap();
        let first = wait_for_tick(&engine).await;
        assert_eq!(first.device_index, 1);
        let window = store.get(WINDOW_INDEX_KEY);

        let same_nodes = SessionConfig::from_json(CONFIG).unwrap();
        engine.reconfigure(same_nodes).await.unwrap();
        let second = wait_for_tick(&engine).await;

        assert_ne!(first.session_id, second.session_id);
        assert_eq!(second.device_index, 0);
        assert_eq!(store.get("simulation_index.dev").as_deref(), Some("1"));
        assert_eq!(second.window_index, first.window_index + 1);
        assert_ne!(store.get(WINDOW_INDEX_KEY), window);
        engine.stop().await;
    }

    #[tokio::test]
    async fn reconfigure_resets_session() {
        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_CONFIG_KEY, CONFIG).unwrap();
        let mut engine = Engine::new(source(), store, settings());
        engine.start().unwrap();
        let first = wait_for_tick(&engine).await;

        let config = SessionConfig::from_json(r#"{"nodes": [{"id": "relay"}, {"id": "dev"}]}"#)
            .unwrap();
        engine.reconfigure(config.clone()).await.unwrap();
        let second = wait_for_tick(&engine).await;

        assert_ne!(first.session_id, second.session_id);
        assert_eq!(second.device_id, "relay");
        assert_eq!(engine.session_config(), Some(config));

        let invalid = SessionConfig::default();
        assert!(matches!(
            engine.reconfigure(invalid).await,
            Err(PlaybackError::Inactive(_))
        ));
        assert!(engine.is_running());
        engine.stop().await;
    }
}
