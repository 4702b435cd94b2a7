//! Coreguard Game Server
//!
//! Loads configuration, then serves the arena until Ctrl-C.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coreguard::{Config, GameServer, VERSION};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = Config::load(path.as_deref()).context("Failed to load configuration")?;

    info!("Coreguard Server v{}", VERSION);
    info!(
        "Tick Rate: {} Hz, broadcast every {} ms, goal {}",
        config.arena.tick_rate, config.arena.broadcast_interval_ms, config.arena.goal
    );

    let server = GameServer::new(config);
    let run = server.run();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result.context("Server stopped")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
            run.await.context("Server stopped")?;
        }
    }

    Ok(())
}
