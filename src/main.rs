//! Player Simulation Server - Authoritative arena shooter backend
//!
//! Entry point for the server. It handles:
//! - WebSocket connections carrying player intent and shots
//! - A single simulation task owning every player's movement, health and respawn
//! - An HTTP health endpoint

mod app;
mod config;
mod game;
mod http;
mod session;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::{ArenaWorld, Simulation, SimulationRunner, SpawnRegistry};
use crate::http::build_router;
use crate::util::time::init_server_time;

/// Spawn points used when no spawn file is configured
const DEFAULT_SPAWN_COUNT: usize = 7;
const DEFAULT_SPAWN_RADIUS: f32 = 20.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Player Simulation Server");
    info!("Server address: {}", config.server_addr);

    let spawns = match &config.spawn_points_path {
        Some(path) => SpawnRegistry::load_json(path)?,
        None => SpawnRegistry::ring(DEFAULT_SPAWN_COUNT, DEFAULT_SPAWN_RADIUS)?,
    };
    let seed = config.sim_seed.unwrap_or_else(rand::random);
    info!(
        spawn_points = spawns.len(),
        seed,
        max_players = config.max_players,
        tick_rate = config.tick_rate,
        "Simulation configured"
    );

    // Spawn the simulation task
    let simulation = Simulation::new(ArenaWorld::standard(), spawns, seed);
    let (runner, handle) = SimulationRunner::new(simulation, config.tick_rate);
    tokio::spawn(async move {
        let simulation = runner.run().await;
        info!(
            ticks = simulation.tick(),
            players = simulation.player_count(),
            "Simulation stopped"
        );
    });

    // Create application state
    let state = AppState::new(config.clone(), handle);

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
