mod playback;
mod relay;
mod session;
mod source;
mod store;
mod web;

use clap::{Parser, Subcommand};
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use crate::playback::{build_snapshot, fetch_node, CursorManager, Engine, TickSnapshot};
use crate::session::{Session, SessionConfig};
use crate::source::{DirectorySource, HistorySource};
use crate::store::{CursorStore, FileStore, MemoryStore, WINDOW_INDEX_KEY};
use crate::web::Config;

#[derive(Parser)]
#[command(name = "relay-o-mat")]
#[command(about = "Trajectory playback and relay selection for simulated radio nodes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the playback engine and its HTTP API
    Serve {
        #[arg(short, long, default_value = "relay-o-mat.yaml")]
        config: String,
    },
    /// Validate a session configuration file
    Validate { session: String },
    /// Play back one window offline and print the relay selections
    Replay {
        #[arg(short, long, default_value = "relay-o-mat.yaml")]
        config: String,
        /// Session configuration (JSON)
        #[arg(short, long)]
        session: String,
        #[arg(short, long, default_value_t = 1)]
        window: u64,
        #[arg(short, long, default_value_t = 10)]
        ticks: usize,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(&config),
        Commands::Validate { session } => validate(&session),
        Commands::Replay {
            config,
            session,
            window,
            ticks,
        } => replay(&config, &session, window, ticks),
    }
}

fn runtime() -> Option<tokio::runtime::Runtime> {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => Some(rt),
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            None
        }
    }
}

fn serve(path: &str) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config {}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let store = match FileStore::open(config.store.path.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening cursor store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let source = DirectorySource::new(config.source.directory.clone());

    let Some(rt) = runtime() else {
        return ExitCode::FAILURE;
    };

    let result = rt.block_on(async {
        let engine = Engine::new(Arc::new(source), Arc::new(store), config.playback.clone());
        web::run_server(config, engine).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_session(path: &str) -> Result<Session, String> {
    let json = fs::read_to_string(path).map_err(|e| format!("Error reading file: {}", e))?;
    let config = SessionConfig::from_json(&json).map_err(|e| format!("Parse error: {}", e))?;
    Session::new(config).map_err(|e| format!("Invalid session: {}", e))
}

fn validate(path: &str) -> ExitCode {
    let session = match read_session(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Session is valid ({} nodes, device {})",
        session.nodes().len(),
        session.device_id()
    );
    for (i, node) in session.nodes().iter().enumerate() {
        let role = node
            .role
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unset".to_string());
        let shadow = node
            .shadow_of
            .as_deref()
            .map(|s| format!(", shadows {}", s))
            .unwrap_or_default();
        println!("  {}: {} ({}{})", i + 1, node.id, role, shadow);
    }
    ExitCode::SUCCESS
}

fn replay(config_path: &str, session_path: &str, window: u64, ticks: usize) -> ExitCode {
    let config = match Config::from_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };
    let session = match read_session(session_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // replay never touches the persisted cursors
    let store = Arc::new(MemoryStore::new());
    if let Err(e) = store.set(WINDOW_INDEX_KEY, &window.saturating_sub(1).to_string()) {
        eprintln!("Error seeding store: {}", e);
        return ExitCode::FAILURE;
    }
    let source: Arc<dyn HistorySource> =
        Arc::new(DirectorySource::new(config.source.directory.clone()));
    let settings = config.playback;

    let Some(rt) = runtime() else {
        return ExitCode::FAILURE;
    };

    let mut manager = CursorManager::new(session, store, settings.loop_length);
    let requests = manager.advance_window();
    println!("Replaying window {}", manager.window_index());

    for request in requests {
        let outcome = rt.block_on(fetch_node(
            source.clone(),
            request,
            settings.shadow_max_offset_m,
        ));
        if let Err(e) = &outcome.result {
            eprintln!("  {}: {}", outcome.node_id, e);
        }
        manager.apply_fetch(outcome);
    }

    for tick in 0..ticks {
        match build_snapshot(&manager, &settings) {
            Some(snap) => print_tick(tick, &snap),
            None => println!("  tick {}: no device sample", tick),
        }
        manager.advance_all();
    }

    ExitCode::SUCCESS
}

fn print_tick(tick: usize, snap: &TickSnapshot) {
    let relay = |c: &Option<crate::relay::RelayCandidate>| {
        c.as_ref()
            .map(|c| format!("{} ({:.0} m)", c.node_id, c.distance_m))
            .unwrap_or_else(|| "-".to_string())
    };
    println!(
        "  tick {} [sample {}] {} at ({:.5}, {:.5}) {}: primary {}, secondary {}",
        tick,
        snap.device_index,
        snap.device_id,
        snap.device.latitude,
        snap.device.longitude,
        if snap.in_zone { "in zone" } else { "outside" },
        relay(&snap.relays.primary),
        relay(&snap.relays.secondary),
    );
}
