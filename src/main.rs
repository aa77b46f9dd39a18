use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use safeshield::api;
use safeshield::config::Config;
use safeshield::dispatch::{self, Dispatcher, MessageBus};
use safeshield::engine::{InMemoryRuleEngine, RuleReconciler};
use safeshield::feed::ThreatFeedFetcher;
use safeshield::init::{self, setup_logging};
use safeshield::notify::TracingNotifier;
use safeshield::stats;
use safeshield::storage::{JsonFileStore, LocalState, MemoryStore, StorageArea, SyncSettings};
use safeshield::unblock::{OverrideSlot, TemporaryUnblock};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse args & load config
    let mut config_path = "config.toml".to_string();
    let mut install = false;
    for arg in std::env::args().skip(1) {
        if arg == "--install" {
            install = true;
        } else {
            config_path = arg;
        }
    }
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup logging
    setup_logging(&config);
    info!("Starting safeshield...");

    // 3. Open storage scopes
    let sync_area = open_area(config.storage.sync_path.as_deref()).await?;
    let local_area = open_area(config.storage.local_path.as_deref()).await?;
    let sync = SyncSettings::new(sync_area);
    let local = LocalState::new(local_area);

    // 4. Rule engine & reconciler
    let (engine, match_events) = InMemoryRuleEngine::new();
    let reconciler = Arc::new(RuleReconciler::new(
        engine.clone(),
        config.warning_page.clone(),
    ));

    // 5. Lifecycle: startup wipes the sync scope, install keeps it
    if install {
        info!("Install mode: keeping existing state");
    } else {
        init::on_startup(&sync, &reconciler).await?;
    }
    init::apply_initial_rules(&sync, &reconciler).await?;

    // 6. Threat feed bootstrap (cache-first)
    let fetcher = Arc::new(ThreatFeedFetcher::new(config.feed.url.clone(), local.clone()));
    init::bootstrap_threat_feed(&sync, &fetcher, &reconciler).await?;

    // 7. Match-event recorder & periodic stats dump
    tokio::spawn(stats::run_match_recorder(local.clone(), match_events));
    if config.stats.enable {
        stats::spawn_stats_logger(local.clone(), config.stats.log_interval_seconds);
    }

    // 8. Dispatcher & event bus
    let overrides = OverrideSlot::new();
    let unblock = TemporaryUnblock::new(
        sync.clone(),
        local.clone(),
        reconciler.clone(),
        overrides.clone(),
        config.unblock.default_duration_ms,
    );
    let dispatcher = Arc::new(Dispatcher::new(
        sync.clone(),
        local.clone(),
        reconciler.clone(),
        fetcher.clone(),
        unblock,
        Arc::new(TracingNotifier),
    ));
    let (bus, bus_rx) = MessageBus::channel(64);
    tokio::spawn(dispatch::run_dispatcher(dispatcher, bus_rx));

    // 9. API server
    let server = tokio::spawn(api::start_api_server(
        bus,
        sync.clone(),
        local.clone(),
        engine.clone(),
        overrides.clone(),
        config.api_port,
    ));

    // 10. Graceful shutdown
    tokio::select! {
        _ = server => {},
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}

async fn open_area(path: Option<&str>) -> Result<Arc<dyn StorageArea>> {
    Ok(match path {
        Some(path) => Arc::new(JsonFileStore::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    })
}
