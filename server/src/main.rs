use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use spintrack_engine::{LedgerStore, RoundEngine, Snapshotter, TrackPlan};
use spintrack_server::{config, Api, App};

/// Round server for the wheel game: HTTP API, websocket fanout, and the
/// tick loop that drives round transitions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Listen port. Falls back to the PORT env var, then 3000.
    #[arg(short, long)]
    port: Option<u16>,

    /// Snapshot file path. Falls back to STORE_FILE_PATH, then data/store.json.
    #[arg(long)]
    store_path: Option<PathBuf>,

    /// Keep all state in memory and never write a snapshot.
    #[arg(long, default_value_t = false)]
    memory_store: bool,

    /// Seed for deterministic track layout and spins (demos and tests).
    #[arg(long)]
    seed: Option<u64>,

    /// Force the simulator endpoints on or off, overriding APP_MODE.
    #[arg(long)]
    allow_simulator: Option<bool>,
}

fn env_trimmed(var: &str) -> Option<String> {
    std::env::var(var).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

fn is_production() -> bool {
    matches!(
        env_trimmed("APP_MODE").as_deref(),
        Some("production") | Some("prod")
    )
}

fn resolve_port(args: &Args) -> u16 {
    args.port
        .or_else(|| env_trimmed("PORT").and_then(|value| value.parse().ok()))
        .unwrap_or(3000)
}

/// `None` means run without persistence. The flag wins over STORE_MODE,
/// which wins over the default file store.
fn resolve_store_path(args: &Args) -> Option<PathBuf> {
    if args.memory_store {
        return None;
    }
    if matches!(env_trimmed("STORE_MODE").as_deref(), Some("memory")) {
        return None;
    }
    Some(
        args.store_path
            .clone()
            .or_else(|| env_trimmed("STORE_FILE_PATH").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("data/store.json")),
    )
}

/// Simulator endpoints default to on everywhere except production.
fn resolve_sim_enabled(args: &Args) -> bool {
    if let Some(flag) = args.allow_simulator {
        return flag;
    }
    match env_trimmed("ALLOW_LOCAL_SIMULATOR").as_deref() {
        Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        _ => !is_production(),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let game_config = config::from_env();
    game_config.validate().map_err(anyhow::Error::msg)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let plan = TrackPlan::from_config(&game_config, &mut rng)
        .map_err(anyhow::Error::msg)
        .context("invalid track configuration")?;

    let store = match resolve_store_path(&args) {
        Some(path) => {
            let snapshotter = Snapshotter::new(&path);
            let snapshot = snapshotter
                .load()
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            info!(path = %path.display(), "Snapshot store enabled");
            LedgerStore::with_snapshot(game_config.clone(), snapshotter, snapshot)
        }
        None => {
            info!("In-memory store enabled, state is lost on restart");
            LedgerStore::in_memory(game_config.clone())
        }
    };

    let (events, _) = broadcast::channel(1024);
    let engine = RoundEngine::new(game_config, plan, store, events.clone(), rng);
    let app = Arc::new(App::new(engine, events, resolve_sim_enabled(&args)));
    app.start();

    tokio::spawn(spintrack_server::run_ticker(app.clone()));
    tokio::spawn(spintrack_server::count_settlements(app.clone()));

    let api = Api::new(app);
    let router = api.router();

    let addr = SocketAddr::new(args.host, resolve_port(&args));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("axum server error")?;

    Ok(())
}
