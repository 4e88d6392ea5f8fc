//! Prometheus-compatible metrics endpoint
//!
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

#[cfg(feature = "lobby")]
use crate::game::state::{MatchOutcome, RoomStatus};
#[cfg(feature = "lobby")]
use crate::lobby::manager::LobbyManager;

/// Samples kept for tick-time percentiles
const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // Rooms
    pub rooms_total: AtomicU64,
    pub rooms_playing: AtomicU64,

    // Combatants across playing rooms
    pub human_players: AtomicU64,
    pub bot_players: AtomicU64,
    pub alive_combatants: AtomicU64,
    pub active_bombs: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Match outcomes
    pub matches_finished: AtomicU64,
    pub matches_drawn: AtomicU64,
    pub matches_disconnected: AtomicU64,
    pub kills_total: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            rooms_total: AtomicU64::new(0),
            rooms_playing: AtomicU64::new(0),
            human_players: AtomicU64::new(0),
            bot_players: AtomicU64::new(0),
            alive_combatants: AtomicU64::new(0),
            active_bombs: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            matches_finished: AtomicU64::new(0),
            matches_drawn: AtomicU64::new(0),
            matches_disconnected: AtomicU64::new(0),
            kills_total: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Refresh the room and combatant gauges
    #[cfg(feature = "lobby")]
    pub fn observe_rooms(&self, manager: &LobbyManager) {
        let (mut playing, mut humans, mut bots, mut alive, mut bombs) = (0, 0, 0, 0, 0);
        for room in manager.rooms() {
            if room.status() != RoomStatus::Playing {
                continue;
            }
            playing += 1;
            if let Some(game) = room.game() {
                let state = game.state();
                let bot_count = state.combatants.values().filter(|c| c.is_bot()).count() as u64;
                bots += bot_count;
                humans += state.combatants.len() as u64 - bot_count;
                alive += state.alive_count() as u64;
                bombs += state.bombs.len() as u64;
            }
        }

        self.rooms_total.store(manager.room_count() as u64, Ordering::Relaxed);
        self.rooms_playing.store(playing, Ordering::Relaxed);
        self.human_players.store(humans, Ordering::Relaxed);
        self.bot_players.store(bots, Ordering::Relaxed);
        self.alive_combatants.store(alive, Ordering::Relaxed);
        self.active_bombs.store(bombs, Ordering::Relaxed);
    }

    #[cfg(feature = "lobby")]
    pub fn record_match(&self, result: &crate::game::match_result::MatchResult) {
        self.matches_finished.fetch_add(1, Ordering::Relaxed);
        self.kills_total.fetch_add(u64::from(result.total_kills), Ordering::Relaxed);
        match result.outcome {
            MatchOutcome::Draw => {
                self.matches_drawn.fetch_add(1, Ordering::Relaxed);
            }
            MatchOutcome::Disconnect { .. } => {
                self.matches_disconnected.fetch_add(1, Ordering::Relaxed);
            }
            MatchOutcome::Winner(_) => {}
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("blastgrid_rooms_total", "Number of rooms", "gauge",
            self.rooms_total.load(Ordering::Relaxed));
        metric!("blastgrid_rooms_playing", "Rooms with a running match", "gauge",
            self.rooms_playing.load(Ordering::Relaxed));

        metric!("blastgrid_players_human", "Human combatants in running matches", "gauge",
            self.human_players.load(Ordering::Relaxed));
        metric!("blastgrid_players_bot", "Bot combatants in running matches", "gauge",
            self.bot_players.load(Ordering::Relaxed));
        metric!("blastgrid_combatants_alive", "Alive combatants", "gauge",
            self.alive_combatants.load(Ordering::Relaxed));
        metric!("blastgrid_bombs_active", "Live bombs", "gauge",
            self.active_bombs.load(Ordering::Relaxed));

        metric!("blastgrid_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("blastgrid_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("blastgrid_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("blastgrid_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("blastgrid_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("blastgrid_matches_finished_total", "Matches that reached a result", "counter",
            self.matches_finished.load(Ordering::Relaxed));
        metric!("blastgrid_matches_drawn_total", "Matches ending in a draw", "counter",
            self.matches_drawn.load(Ordering::Relaxed));
        metric!("blastgrid_matches_disconnected_total", "Matches aborted by a disconnect", "counter",
            self.matches_disconnected.load(Ordering::Relaxed));
        metric!("blastgrid_kills_total", "Credited kills over all finished matches", "counter",
            self.kills_total.load(Ordering::Relaxed));

        metric!("blastgrid_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        let value = serde_json::json!({
            "rooms": {
                "total": self.rooms_total.load(Ordering::Relaxed),
                "playing": self.rooms_playing.load(Ordering::Relaxed),
            },
            "combatants": {
                "human": self.human_players.load(Ordering::Relaxed),
                "bot": self.bot_players.load(Ordering::Relaxed),
                "alive": self.alive_combatants.load(Ordering::Relaxed),
                "bombs": self.active_bombs.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
                "tick_count": self.tick_count.load(Ordering::Relaxed),
            },
            "matches": {
                "finished": self.matches_finished.load(Ordering::Relaxed),
                "drawn": self.matches_drawn.load(Ordering::Relaxed),
                "disconnected": self.matches_disconnected.load(Ordering::Relaxed),
                "kills": self.kills_total.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        });
        serde_json::to_string_pretty(&value).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the HTTP response for one request line
fn respond(metrics: &Metrics, request: &str) -> String {
    let (content_type, body) = if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        ("application/json", metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ("text/plain; version=0.0.4", metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        ("text/plain", "OK".to_string())
    } else {
        return "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
    };
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
