use crate::engine::RuleReconciler;
use crate::feed::ThreatFeedFetcher;
use crate::notify::Notifier;
use crate::storage::{merge_unique, LocalState, SyncSettings};
use crate::unblock::TemporaryUnblock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// Requests accepted on the event bus, tagged on `action` to match the
/// extension pages' message shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    AddUrl {
        url: String,
    },
    RemoveUrl {
        url: String,
    },
    ToggleBlocking {
        enabled: bool,
    },
    /// `url` accompanies the request for display only; the authoritative
    /// unblock target is the last-blocked slot.
    TemporaryUnblock {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        duration: Option<u64>,
    },
    RefreshThreatFeed,
    BlockedUrl {
        url: String,
    },
    BlockedScript {
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        rename = "unblockedUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub unblocked_url: Option<String>,
}

impl MessageResponse {
    pub fn success() -> Self {
        Self {
            status: Status::Success,
            message: None,
            unblocked_url: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            unblocked_url: None,
        }
    }

    pub fn unblocked(url: String) -> Self {
        Self {
            status: Status::Success,
            message: None,
            unblocked_url: Some(url),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// The single message-handling entry point. Every external request mutates
/// the store, re-materializes rules where needed, and answers with a
/// structured response; no failure propagates as a fault.
pub struct Dispatcher {
    sync: SyncSettings,
    local: LocalState,
    reconciler: Arc<RuleReconciler>,
    fetcher: Arc<ThreatFeedFetcher>,
    unblock: TemporaryUnblock,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(
        sync: SyncSettings,
        local: LocalState,
        reconciler: Arc<RuleReconciler>,
        fetcher: Arc<ThreatFeedFetcher>,
        unblock: TemporaryUnblock,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sync,
            local,
            reconciler,
            fetcher,
            unblock,
            notifier,
        }
    }

    pub async fn handle(&self, message: Message) -> MessageResponse {
        match message {
            Message::AddUrl { url } => self.add_url(&url).await,
            Message::RemoveUrl { url } => self.remove_url(&url).await,
            Message::ToggleBlocking { enabled } => self.toggle_blocking(enabled).await,
            Message::TemporaryUnblock { duration, .. } => self.temporary_unblock(duration).await,
            Message::RefreshThreatFeed => self.refresh_threat_feed().await,
            Message::BlockedUrl { url } => self.blocked_url(&url).await,
            Message::BlockedScript { url } => {
                info!("Blocked script detected on {}", url);
                MessageResponse::success()
            }
        }
    }

    async fn add_url(&self, url: &str) -> MessageResponse {
        match self.sync.add_domain(url).await {
            Ok(domain) => {
                info!("Added {} to blacklist", domain);
                self.reconcile_if_enabled().await
            }
            Err(e) => MessageResponse::error(e.to_string()),
        }
    }

    async fn remove_url(&self, url: &str) -> MessageResponse {
        match self.sync.remove_domain(url).await {
            Ok(domain) => {
                info!("Removed {} from blacklist", domain);
                self.reconcile_if_enabled().await
            }
            Err(e) => MessageResponse::error(e.to_string()),
        }
    }

    async fn toggle_blocking(&self, enabled: bool) -> MessageResponse {
        info!("Toggle blocking: {}", enabled);
        if let Err(e) = self.sync.set_block_enabled(enabled).await {
            error!("Failed to persist blocking flag: {}", e);
            return MessageResponse::error(format!("storage failure: {}", e));
        }

        let result = if enabled {
            let blacklist = match self.sync.blacklist().await {
                Ok(list) => list,
                Err(e) => {
                    error!("Failed to read blacklist: {}", e);
                    return MessageResponse::error(format!("storage failure: {}", e));
                }
            };
            self.reconciler.apply_rules(&blacklist).await
        } else {
            self.reconciler.clear_rules().await
        };

        match result {
            Ok(()) => MessageResponse::success(),
            Err(e) => MessageResponse::error(e.to_string()),
        }
    }

    async fn temporary_unblock(&self, duration: Option<u64>) -> MessageResponse {
        match self.unblock.unblock(duration).await {
            Ok(url) => MessageResponse::unblocked(url),
            Err(e) => {
                error!("Temporary unblock failed: {}", e);
                MessageResponse::error(e.to_string())
            }
        }
    }

    async fn refresh_threat_feed(&self) -> MessageResponse {
        let threat_domains = self.fetcher.refresh().await;
        if threat_domains.is_empty() {
            return MessageResponse::error("No threat URLs fetched");
        }

        let blacklist = match self.sync.blacklist().await {
            Ok(list) => list,
            Err(e) => {
                error!("Failed to read blacklist: {}", e);
                return MessageResponse::error(format!("storage failure: {}", e));
            }
        };
        let merged = merge_unique(&blacklist, &threat_domains);
        if let Err(e) = self.sync.set_blacklist(&merged).await {
            error!("Failed to persist merged blacklist: {}", e);
            return MessageResponse::error(format!("storage failure: {}", e));
        }
        self.reconcile_if_enabled().await
    }

    async fn blocked_url(&self, url: &str) -> MessageResponse {
        info!("Blocked URL reported: {}", url);
        if let Err(e) = self.local.set_last_blocked_url(url).await {
            error!("Failed to store last blocked URL: {}", e);
        }
        self.notifier.notify(
            "Website Blocked",
            &format!("The site {} was blocked by SafeShield.", url),
        );
        MessageResponse::success()
    }

    /// Re-materializes rules from the stored blacklist when blocking is
    /// enabled; a disabled flag leaves the active rules alone.
    async fn reconcile_if_enabled(&self) -> MessageResponse {
        let enabled = match self.sync.block_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                error!("Failed to read blocking flag: {}", e);
                return MessageResponse::error(format!("storage failure: {}", e));
            }
        };
        if !enabled {
            return MessageResponse::success();
        }

        let blacklist = match self.sync.blacklist().await {
            Ok(list) => list,
            Err(e) => {
                error!("Failed to read blacklist: {}", e);
                return MessageResponse::error(format!("storage failure: {}", e));
            }
        };
        match self.reconciler.apply_rules(&blacklist).await {
            Ok(()) => MessageResponse::success(),
            Err(e) => MessageResponse::error(e.to_string()),
        }
    }
}

type Envelope = (Message, oneshot::Sender<MessageResponse>);

/// Clonable handle that funnels requests through the dispatcher loop, one
/// at a time in arrival order.
#[derive(Clone)]
pub struct MessageBus {
    tx: mpsc::Sender<Envelope>,
}

impl MessageBus {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, message: Message) -> MessageResponse {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send((message, reply_tx)).await.is_err() {
            return MessageResponse::error("event bus closed");
        }
        reply_rx
            .await
            .unwrap_or_else(|_| MessageResponse::error("event bus closed"))
    }
}

/// Consumes the bus: each message is handled to completion before the next
/// one starts.
pub async fn run_dispatcher(dispatcher: Arc<Dispatcher>, mut rx: mpsc::Receiver<Envelope>) {
    while let Some((message, reply)) = rx.recv().await {
        let response = dispatcher.handle(message).await;
        let _ = reply.send(response);
    }
}
