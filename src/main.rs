use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use blastgrid_server::config::{MatchSettings, ServerConfig};
use blastgrid_server::game::state::Millis;
use blastgrid_server::lobby::manager::LobbyManager;
use blastgrid_server::metrics::{self, Metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Blastgrid Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate()?;
    let settings = config.load_match_settings()?;
    info!(
        "Configuration loaded: tick_rate={}Hz, max_rooms={}, demo_rooms={}, {}x{} {:?}",
        config.tick_rate, config.max_rooms, config.demo_rooms, settings.width, settings.height, settings.mode
    );

    let metrics = Arc::new(Metrics::new());
    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let lobby_manager = Arc::new(RwLock::new(LobbyManager::new(config.max_rooms, settings.clone())));
    {
        let mut manager = lobby_manager.write().await;
        for i in 0..config.demo_rooms {
            let demo = MatchSettings {
                humans: 0,
                bots: settings.bots.max(2),
                ..settings.clone()
            };
            if let Err(e) = manager.create_room_with(format!("Demo {}", i + 1), demo) {
                warn!("Could not create demo room: {}", e);
            }
        }
    }

    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };

    tokio::select! {
        _ = run_rooms(lobby_manager.clone(), metrics.clone(), config.tick_interval_ms()) => {}
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    lobby_manager.write().await.shutdown_all_rooms().await;
    info!("Server stopped");

    Ok(())
}

/// Drive every room at the configured rate
async fn run_rooms(manager: Arc<RwLock<LobbyManager>>, metrics: Arc<Metrics>, tick_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let epoch = Instant::now();

    loop {
        interval.tick().await;
        let now = epoch.elapsed().as_millis() as Millis;
        let started = Instant::now();

        let mut manager = manager.write().await;
        for (room_id, result) in manager.update_all(now) {
            metrics.record_match(&result);
            info!(
                "Room {} finished: {:?}, winner {}, {} kills in {:.1}s",
                room_id,
                result.outcome,
                result.winner_name.as_deref().unwrap_or("-"),
                result.total_kills,
                result.duration_ms as f64 / 1000.0
            );
        }
        // No transport attached; outbound messages are dropped here
        for room in manager.rooms_mut() {
            room.drain_outbox();
        }
        metrics.observe_rooms(&manager);

        metrics.record_tick_time(started.elapsed());
    }
}
