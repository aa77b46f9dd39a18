use safeshield::engine::{InMemoryRuleEngine, RuleEngine, RuleReconciler};
use safeshield::feed::{now_ms, ThreatFeedFetcher};
use safeshield::init;
use safeshield::storage::{LocalState, MemoryStore, SyncSettings};
use std::sync::Arc;

const WARNING_PAGE: &str = "chrome-extension://safeshield/blocked.html";

fn scopes() -> (SyncSettings, LocalState, Arc<InMemoryRuleEngine>, Arc<RuleReconciler>) {
    let sync = SyncSettings::new(Arc::new(MemoryStore::new()));
    let local = LocalState::new(Arc::new(MemoryStore::new()));
    let (engine, _events) = InMemoryRuleEngine::new();
    let reconciler = Arc::new(RuleReconciler::new(engine.clone(), WARNING_PAGE.to_string()));
    (sync, local, engine, reconciler)
}

#[tokio::test]
async fn test_startup_wipes_sync_scope_and_rules() {
    let (sync, _local, engine, reconciler) = scopes();
    sync.set_blacklist(&["evil.com".to_string()]).await.unwrap();
    sync.set_block_enabled(false).await.unwrap();
    reconciler
        .apply_rules(&["evil.com".to_string()])
        .await
        .unwrap();

    init::on_startup(&sync, &reconciler).await.unwrap();

    assert!(engine.active_rules().await.unwrap().is_empty());
    assert!(sync.blacklist().await.unwrap().is_empty());
    // The wipe also drops the flag; absence reads as enabled.
    assert!(sync.block_enabled().await.unwrap());
}

#[tokio::test]
async fn test_install_rematerializes_rules() {
    let (sync, _local, engine, reconciler) = scopes();
    sync.set_blacklist(&["evil.com".to_string()]).await.unwrap();

    init::apply_initial_rules(&sync, &reconciler).await.unwrap();

    let rules = engine.active_rules().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].domain(), "evil.com");
    // The blacklist survives untouched.
    assert_eq!(sync.blacklist().await.unwrap(), vec!["evil.com"]);
}

#[tokio::test]
async fn test_install_respects_disabled_flag() {
    let (sync, _local, engine, reconciler) = scopes();
    sync.set_blacklist(&["evil.com".to_string()]).await.unwrap();
    sync.set_block_enabled(false).await.unwrap();

    init::apply_initial_rules(&sync, &reconciler).await.unwrap();

    assert!(engine.active_rules().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bootstrap_merges_fresh_cache() {
    let (sync, local, engine, reconciler) = scopes();
    sync.set_blacklist(&["user.com".to_string()]).await.unwrap();
    local
        .set_threat_feed_cache(
            &["bad.com".to_string(), "user.com".to_string()],
            now_ms() - 5 * 60 * 1000,
        )
        .await
        .unwrap();
    // Feed URL is unreachable; a fresh cache must make that irrelevant.
    let fetcher = ThreatFeedFetcher::new("http://127.0.0.1:1/feed.txt".to_string(), local.clone());

    init::bootstrap_threat_feed(&sync, &fetcher, &reconciler)
        .await
        .unwrap();

    assert_eq!(sync.blacklist().await.unwrap(), vec!["user.com", "bad.com"]);
    let mut domains: Vec<String> = engine
        .active_rules()
        .await
        .unwrap()
        .iter()
        .map(|r| r.domain().to_string())
        .collect();
    domains.sort();
    assert_eq!(domains, vec!["bad.com", "user.com"]);
}

#[tokio::test]
async fn test_bootstrap_stale_cache_with_dead_feed_changes_nothing() {
    let (sync, local, engine, reconciler) = scopes();
    sync.set_blacklist(&["user.com".to_string()]).await.unwrap();
    local
        .set_threat_feed_cache(&["bad.com".to_string()], now_ms() - 2 * 60 * 60 * 1000)
        .await
        .unwrap();
    let fetcher = ThreatFeedFetcher::new("http://127.0.0.1:1/feed.txt".to_string(), local.clone());

    init::bootstrap_threat_feed(&sync, &fetcher, &reconciler)
        .await
        .unwrap();

    // The stale cache forced a fetch, the fetch failed, nothing merged.
    assert_eq!(sync.blacklist().await.unwrap(), vec!["user.com"]);
    assert!(engine.active_rules().await.unwrap().is_empty());
    // The stale cache itself is preserved.
    let (cached, _) = local.threat_feed_cache().await.unwrap().unwrap();
    assert_eq!(cached, vec!["bad.com"]);
}
