use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Notify;

use nftmeta::{
    arguments,
    cache::StalenessCache,
    config,
    dispatcher::{RateLimitedDispatcher, ReqwestTransport},
    logger::{self, LogTag},
    providers,
    rarity::TraitFrequencyScorer,
    scheduler::CollectionRefreshScheduler,
    services::{
        implementations::{DispatcherService, RefreshService},
        ServiceManager,
    },
    store::SqliteMetadataStore,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        logger::error(LogTag::System, &format!("Fatal: {:#}", e));
        logger::flush();
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = arguments::init_arguments();

    config::load_config_from_path(&args.config)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    let mut cfg = config::get_config_clone();
    if let Some(port) = args.port {
        cfg.webserver.port = port;
    }
    if args.no_webserver {
        cfg.webserver.enabled = false;
    }

    logger::init(&cfg.logging, &args.debug, args.verbose);
    logger::debug(
        LogTag::Config,
        &format!("Configuration loaded from {}", args.config),
    );
    logger::info(
        LogTag::System,
        &format!(
            "nftmeta {} starting (provider={}, rate_limit={}/s, ttl={}s)",
            env!("CARGO_PKG_VERSION"),
            cfg.upstream.provider.as_str(),
            cfg.upstream.rate_limit_per_second,
            cfg.refresh.ttl_secs
        ),
    );

    let store = Arc::new(
        SqliteMetadataStore::open(&cfg.storage.database_path)
            .context("Failed to open metadata store")?,
    );
    let transport = Arc::new(ReqwestTransport::new(cfg.upstream.timeout_secs)?);
    let dispatcher = Arc::new(RateLimitedDispatcher::new(
        cfg.upstream.rate_limit_per_second,
        transport,
    )?);
    let provider = providers::build_provider(&cfg.upstream, Arc::clone(&dispatcher));
    let scheduler = Arc::new(CollectionRefreshScheduler::new(
        provider,
        store.clone(),
        Arc::new(TraitFrequencyScorer),
        cfg.refresh.clone(),
    ));
    let cache = Arc::new(StalenessCache::new(
        store,
        Arc::clone(&scheduler),
        cfg.refresh.ttl_secs,
    ));

    let mut manager = ServiceManager::new(cfg.clone());
    manager.register(Box::new(DispatcherService::new(Arc::clone(&dispatcher))));
    manager.register(Box::new(RefreshService::new(Arc::clone(&scheduler))));
    #[cfg(feature = "web")]
    manager.register(Box::new(
        nftmeta::services::implementations::WebserverService::new(
            cfg.webserver.host.clone(),
            cfg.webserver.port,
            nftmeta::webserver::AppState::new(cache, Arc::clone(&scheduler), Arc::clone(&dispatcher)),
        ),
    ));
    #[cfg(not(feature = "web"))]
    drop(cache);

    manager.start_all().await.map_err(anyhow::Error::msg)?;
    logger::info(LogTag::System, "Ready; press Ctrl+C to stop");

    let interrupted = Arc::new(Notify::new());
    let signal = Arc::clone(&interrupted);
    ctrlc::set_handler(move || signal.notify_one()).context("Failed to install Ctrl+C handler")?;
    interrupted.notified().await;

    logger::info(LogTag::System, "Shutting down");
    for (name, health) in manager.get_health().await {
        if !health.is_healthy() {
            logger::warning(
                LogTag::System,
                &format!("Service {} was {:?} at shutdown", name, health),
            );
        }
    }
    manager.stop_all().await.map_err(anyhow::Error::msg)?;
    logger::flush();
    Ok(())
}
