// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Relay façade over the injected transport.
//!
//! `listen` is idempotent per pubkey and delivers each inbound event at
//! most once per subscription; `publish` is best-effort and never blocks
//! the caller beyond handing the event to the transport.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::config::ConnectConfig;
use crate::error::{BridgeError, Result};
use keybridge_core::event::{Event, NOSTR_CONNECT_KIND};

/// Normalize a relay URL: trim whitespace, lowercase scheme+host, ensure a
/// trailing slash.
pub fn normalize_relay_url(url: &str) -> String {
    let url = url.trim();
    let result = if let Some(idx) = url.find("://") {
        let scheme = url[..idx].to_lowercase();
        let rest = &url[idx + 3..];
        let host_end = rest.find('/').unwrap_or(rest.len());
        let host = rest[..host_end].to_lowercase();
        let path = &rest[host_end..];
        format!("{scheme}://{host}{path}")
    } else {
        url.to_string()
    };
    if result.ends_with('/') {
        result
    } else {
        format!("{result}/")
    }
}

/// Normalize a relay list, dropping duplicates while preserving order.
pub fn normalize_relay_urls(relays: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    relays
        .iter()
        .map(|relay| normalize_relay_url(relay))
        .filter(|relay| seen.insert(relay.clone()))
        .collect()
}

/// Subscription filter handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub kinds: Vec<u16>,
    /// Recipient pubkeys matched against `p` tags.
    pub p_tags: Vec<String>,
    /// Only events created at or after this Unix timestamp.
    pub since: Option<u64>,
}

impl Filter {
    /// Whether an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        if !self.p_tags.is_empty() {
            let tagged = event.tags.iter().any(|tag| {
                tag.first().map(String::as_str) == Some("p")
                    && tag.get(1).is_some_and(|p| self.p_tags.contains(p))
            });
            if !tagged {
                return false;
            }
        }
        true
    }
}

/// The injected pub/sub transport capability.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Deliver a signed event to the given relays.
    async fn publish(&self, relays: &[String], event: &Event) -> Result<()>;

    /// Open a subscription; matching events flow into `events` until the
    /// subscription is dropped or `unsubscribe` is called.
    async fn subscribe(
        &self,
        subscription_id: &str,
        relays: &[String],
        filter: Filter,
        events: mpsc::Sender<Event>,
        timeout: Duration,
    ) -> Result<()>;

    async fn unsubscribe(&self, subscription_id: &str) -> Result<()>;
}

/// Maximum event ids remembered per subscription for deduplication.
const DEDUP_WINDOW: usize = 1024;

pub struct RelayFacade {
    transport: Arc<dyn RelayTransport>,
    config: ConnectConfig,
    /// pubkey -> subscription id.
    subscriptions: Mutex<HashMap<String, String>>,
}

impl RelayFacade {
    pub fn new(transport: Arc<dyn RelayTransport>, config: ConnectConfig) -> Self {
        Self {
            transport,
            config,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to RPC envelope events addressed to `pubkey`.
    ///
    /// Returns `None` when a subscription for this pubkey already exists;
    /// otherwise the receiver of deduplicated inbound events.
    pub async fn listen(
        &self,
        pubkey: &str,
        relays: &[String],
    ) -> Result<Option<mpsc::Receiver<Event>>> {
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.contains_key(pubkey) {
            debug!(pubkey_id = prefix(pubkey), "already listening");
            return Ok(None);
        }

        let subscription_id = format!("kb-{}", prefix(pubkey));
        let since = (chrono::Utc::now().timestamp() as u64).saturating_sub(self.config.lookback_secs);
        let filter = Filter {
            kinds: vec![NOSTR_CONNECT_KIND],
            p_tags: vec![pubkey.to_string()],
            since: Some(since),
        };

        let (raw_tx, raw_rx) = mpsc::channel(64);
        self.transport
            .subscribe(
                &subscription_id,
                relays,
                filter,
                raw_tx,
                self.config.subscribe_timeout,
            )
            .await?;
        subscriptions.insert(pubkey.to_string(), subscription_id.clone());
        drop(subscriptions);

        debug!(pubkey_id = prefix(pubkey), subscription_id, "listening for envelope events");
        Ok(Some(spawn_dedup(subscription_id, raw_rx)))
    }

    /// Tear down the subscription for `pubkey`, if any. Idempotent.
    pub async fn stop_listening(&self, pubkey: &str) -> Result<()> {
        let removed = self.subscriptions.lock().await.remove(pubkey);
        if let Some(subscription_id) = removed {
            self.transport.unsubscribe(&subscription_id).await?;
        }
        Ok(())
    }

    /// Best-effort publish to all writable relays for the session.
    pub async fn publish(&self, relays: &[String], event: &Event) -> Result<()> {
        if let Err(e) = self.transport.publish(relays, event).await {
            warn!(error = %e, event_id = prefix(&event.id), "relay publish failed");
            return Err(BridgeError::RelayUnavailable(e.to_string()));
        }
        Ok(())
    }
}

fn prefix(s: &str) -> &str {
    let mut end = s.len().min(8);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Forward events, dropping ids already seen on this subscription.
fn spawn_dedup(subscription_id: String, mut raw_rx: mpsc::Receiver<Event>) -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut seen: HashSet<String> = HashSet::new();
        let mut order: VecDeque<String> = VecDeque::new();
        while let Some(event) = raw_rx.recv().await {
            if !seen.insert(event.id.clone()) {
                debug!(subscription_id, event_id = prefix(&event.id), "duplicate event");
                continue;
            }
            order.push_back(event.id.clone());
            if order.len() > DEDUP_WINDOW {
                if let Some(oldest) = order.pop_front() {
                    seen.remove(&oldest);
                }
            }
            if tx.send(event).await.is_err() {
                break;
            }
        }
        debug!(subscription_id, "subscription channel closed");
    });
    rx
}
