use anyhow::Context;
use tracing_subscriber::EnvFilter;

use redis_emu::{config::Settings, RedisEmulator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let emulator = RedisEmulator::new(settings.emulator);
    let addr = emulator.start().await.context("failed to start emulator")?;
    tracing::info!(addr = %addr, "ready to accept connections");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutting down");
    emulator.close().await;

    Ok(())
}
