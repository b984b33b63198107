// paddockd entry point.
//
// Startup sequence:
// 1. Initialize tracing
// 2. Load config (defaults when no file exists)
// 3. Open the SQLite store, build the engine with an in-process cache
// 4. Run the scoring and draft-timer ticks on their configured intervals
//    until ctrl-c

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use paddock::cache::MemoryCache;
use paddock::config;
use paddock::engine::Engine;
use paddock::jobs;
use paddock::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("paddockd starting up");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/paddock.toml".to_string());
    let config = config::load_or_default(Path::new(&config_path))
        .context("failed to load configuration")?;
    info!(
        "Config loaded: db={}, leaderboard TTL {}s, scoring every {}s, draft timer every {}s",
        config.database.path,
        config.cache.leaderboard_ttl_secs,
        config.jobs.scoring_interval_secs,
        config.jobs.draft_interval_secs
    );

    let store = Arc::new(
        SqliteStore::open(&config.database.path).context("failed to open database")?,
    );
    let cache = Arc::new(MemoryCache::new());
    let engine = Arc::new(Engine::new(store, cache, config.leaderboard_ttl()));

    let mut scoring_interval =
        tokio::time::interval(Duration::from_secs(config.jobs.scoring_interval_secs));
    let mut draft_interval =
        tokio::time::interval(Duration::from_secs(config.jobs.draft_interval_secs));

    loop {
        tokio::select! {
            _ = scoring_interval.tick() => {
                let engine = engine.clone();
                if let Err(err) = tokio::task::spawn_blocking(move || {
                    jobs::run_scoring_tick(&engine)
                })
                .await
                {
                    error!("scoring tick task panicked: {err}");
                }
            }
            _ = draft_interval.tick() => {
                let engine = engine.clone();
                if let Err(err) = tokio::task::spawn_blocking(move || {
                    jobs::run_draft_tick(&engine, chrono::Utc::now())
                })
                .await
                {
                    error!("draft tick task panicked: {err}");
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("paddockd stopped");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("paddock=info,warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;
    Ok(())
}
