use anyhow::{Context, Result};
use lib_onebot::connections::{AdminManager, JsonLevelStore, RedisCache};
use lib_onebot::{Dispatcher, OneBotClient, PermissionResolver};
use std::sync::Arc;
use tokio::signal;

mod neobot_logic;
use neobot_logic::{config, logger, plugins};

async fn connect_cache(redis_url: Option<&str>) -> Option<RedisCache> {
    let url = redis_url?;
    match RedisCache::connect(url).await {
        Ok(cache) => {
            log::info!("Connected to Redis");
            Some(cache)
        }
        Err(e) => {
            log::warn!("Redis unavailable ({}), continuing without a cache", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level())?;

    let bot_config = config.bot_config();
    bot_config.validate().context("Invalid configuration")?;

    let cache = connect_cache(bot_config.redis_url.as_deref()).await;

    std::fs::create_dir_all(&bot_config.data_dir)
        .with_context(|| format!("Cannot create data dir {}", bot_config.data_dir.display()))?;
    let mut admins = AdminManager::load(bot_config.data_dir.join("admin.json"))?;
    if let Some(cache) = &cache {
        admins = admins.with_redis(cache.clone());
    }
    if let Err(e) = admins.sync_to_redis().await {
        log::error!("Failed to sync admins to Redis: {}", e);
    }
    let levels = JsonLevelStore::load(bot_config.data_dir.join("permissions.json"))?;
    let resolver = PermissionResolver::new(Arc::new(admins), Arc::new(levels));

    let dispatcher = Arc::new(Dispatcher::new(&bot_config, resolver));
    plugins::load_all(&dispatcher)?;
    log::info!("Loaded {} plugins", dispatcher.plugins().len());

    let client = Arc::new(
        OneBotClient::new(bot_config.transport_settings(), Arc::clone(&dispatcher)).with_cache(cache),
    );

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let client_handle = tokio::spawn(Arc::clone(&client).run(shutdown_tx.subscribe()));

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());
    dispatcher.worker_pool().close();

    let _ = client_handle.await;

    log::info!("Shutdown complete.");
    Ok(())
}
