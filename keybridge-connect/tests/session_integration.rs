// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end handshake over an in-process relay hub: the web identity
//! opens a session and emits a URI, the mobile identity scans it, and
//! both sides converge on `Connected` before tearing down again.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use keybridge_connect::{
    Command, ConnectConfig, ConnectUri, Filter, IdentityManager, MemoryKeyStore,
    MemoryProfileStore, RelayTransport, Response, Session, SessionCallbacks, SessionEngine,
    SessionMeta, SessionStatus,
};
use keybridge_core::event::Event;
use keybridge_core::Result;

const RELAY: &str = "wss://relay.test/";

/// A pub/sub hub standing in for the relay network.
#[derive(Default)]
struct RelayHub {
    subscribers: StdMutex<Vec<HubSubscription>>,
}

struct HubSubscription {
    id: String,
    filter: Filter,
    sender: mpsc::Sender<Event>,
}

impl RelayHub {
    fn deliver(&self, event: &Event) {
        let subscribers = self.subscribers.lock().unwrap();
        for subscription in subscribers.iter() {
            if subscription.filter.matches(event) {
                // Dispatch tasks drain these channels continuously.
                let _ = subscription.sender.try_send(event.clone());
            }
        }
    }
}

struct HubTransport {
    hub: Arc<RelayHub>,
}

#[async_trait]
impl RelayTransport for HubTransport {
    async fn publish(&self, _relays: &[String], event: &Event) -> Result<()> {
        self.hub.deliver(event);
        Ok(())
    }

    async fn subscribe(
        &self,
        subscription_id: &str,
        _relays: &[String],
        filter: Filter,
        events: mpsc::Sender<Event>,
        _timeout: Duration,
    ) -> Result<()> {
        self.hub.subscribers.lock().unwrap().push(HubSubscription {
            id: subscription_id.to_string(),
            filter,
            sender: events,
        });
        Ok(())
    }

    async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        self.hub
            .subscribers
            .lock()
            .unwrap()
            .retain(|s| s.id != subscription_id);
        Ok(())
    }
}

/// Records state transitions, pongs and correlated responses.
#[derive(Default)]
struct RecordingCallbacks {
    transitions: StdMutex<Vec<(String, SessionStatus)>>,
    pongs: StdMutex<Vec<Response>>,
    responses: StdMutex<Vec<(Command, Response)>>,
}

impl SessionCallbacks for RecordingCallbacks {
    fn session_state_changed(&self, session: &Session) {
        self.transitions
            .lock()
            .unwrap()
            .push((session.session_id.clone(), session.status));
    }

    fn ping_received(&self, response: &Response) {
        self.pongs.lock().unwrap().push(response.clone());
    }

    fn response_received(&self, command: Command, response: &Response) {
        self.responses
            .lock()
            .unwrap()
            .push((command, response.clone()));
    }
}

impl RecordingCallbacks {
    fn statuses(&self) -> Vec<SessionStatus> {
        self.transitions.lock().unwrap().iter().map(|t| t.1).collect()
    }

    fn pong_count(&self) -> usize {
        self.pongs.lock().unwrap().len()
    }

    fn responses_for(&self, command: Command) -> Vec<Response> {
        self.responses
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == command)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

fn identity(hub: &Arc<RelayHub>, callbacks: Arc<RecordingCallbacks>) -> IdentityManager {
    IdentityManager::new(
        Arc::new(MemoryProfileStore::new()),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(HubTransport { hub: hub.clone() }),
        ConnectConfig::default(),
        Some(callbacks),
    )
}

const POLL_ROUNDS: usize = 250;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

async fn wait_for_status(engine: &Arc<SessionEngine>, session_id: &str, status: SessionStatus) {
    for _ in 0..POLL_ROUNDS {
        if engine
            .session(session_id)
            .await
            .is_some_and(|s| s.status == status)
        {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("session {session_id} never reached {status:?}");
}

async fn wait_for_removal(engine: &Arc<SessionEngine>, session_id: &str) {
    for _ in 0..POLL_ROUNDS {
        if engine.session(session_id).await.is_none() {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("session {session_id} was never removed");
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..POLL_ROUNDS {
        if condition() {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("condition not reached within timeout");
}

async fn paired_identities(
    hub: &Arc<RelayHub>,
    web_callbacks: Arc<RecordingCallbacks>,
    mobile_callbacks: Arc<RecordingCallbacks>,
    permissions: Vec<String>,
) -> (IdentityManager, IdentityManager, Session, Session) {
    let web = identity(hub, web_callbacks);
    let mobile = identity(hub, mobile_callbacks);
    web.create_profile(None).await.unwrap();
    mobile.create_profile(None).await.unwrap();

    let (web_session, uri) = web
        .open_session(
            vec![RELAY.to_string()],
            SessionMeta {
                name: Some("Web Client".into()),
                ..SessionMeta::default()
            },
            permissions,
        )
        .await
        .unwrap();
    assert_eq!(web_session.status, SessionStatus::AwaitingScan);
    assert!(!web_session.has_peer());

    let scanned = ConnectUri::parse(&uri).unwrap();
    assert_eq!(scanned.relays, vec![RELAY.to_string()]);
    let mobile_session = mobile
        .on_scan(
            &scanned.client_pubkey,
            scanned.relays.clone(),
            &scanned.secret,
            scanned.permissions.clone(),
        )
        .await
        .unwrap();
    assert_eq!(mobile_session.status, SessionStatus::Connected);
    assert_eq!(mobile_session.theirs, scanned.client_pubkey);

    (web, mobile, web_session, mobile_session)
}

#[tokio::test]
async fn handshake_ping_and_disconnect() {
    let hub = Arc::new(RelayHub::default());
    let web_callbacks = Arc::new(RecordingCallbacks::default());
    let mobile_callbacks = Arc::new(RecordingCallbacks::default());

    let (web, mobile, web_session, mobile_session) = paired_identities(
        &hub,
        web_callbacks.clone(),
        mobile_callbacks.clone(),
        vec!["sign_event:1".into(), "nip44_encrypt".into()],
    )
    .await;

    // The connect response resolves the pending secret on the web side,
    // which fires a keepalive ping; the pong completes the handshake.
    let web_engine = web.engine();
    wait_for_status(&web_engine, &web_session.session_id, SessionStatus::Connected).await;
    wait_for(|| web_callbacks.pong_count() > 0).await;

    let connected = web_engine.session(&web_session.session_id).await.unwrap();
    assert_eq!(connected.theirs, mobile_session.ours);

    // Both sides observed the expected status walks.
    assert_eq!(
        mobile_callbacks.statuses(),
        vec![
            SessionStatus::QrScanned,
            SessionStatus::ResponseSent,
            SessionStatus::Connected,
        ]
    );
    let web_statuses = web_callbacks.statuses();
    assert_eq!(web_statuses.first(), Some(&SessionStatus::AwaitingScan));
    assert!(web_statuses.contains(&SessionStatus::Connected));

    // An explicit ping round-trip still works once connected.
    let before = web_callbacks.pong_count();
    web.send_ping(&web_session.session_id).await.unwrap();
    wait_for(|| web_callbacks.pong_count() > before).await;

    // Mobile disconnects; both session tables end up empty.
    let mobile_engine = mobile.engine();
    mobile.send_disconnect(&mobile_session.session_id).await.unwrap();
    wait_for_removal(&web_engine, &web_session.session_id).await;
    wait_for_removal(&mobile_engine, &mobile_session.session_id).await;

    assert!(web_callbacks.statuses().contains(&SessionStatus::Disconnected));
    assert!(mobile_callbacks
        .statuses()
        .contains(&SessionStatus::Disconnected));
}

#[tokio::test]
async fn sign_event_request_round_trip() {
    let hub = Arc::new(RelayHub::default());
    let web_callbacks = Arc::new(RecordingCallbacks::default());
    let mobile_callbacks = Arc::new(RecordingCallbacks::default());

    let (web, _mobile, web_session, mobile_session) = paired_identities(
        &hub,
        web_callbacks.clone(),
        mobile_callbacks.clone(),
        vec!["sign_event".into()],
    )
    .await;

    let web_engine = web.engine();
    wait_for_status(&web_engine, &web_session.session_id, SessionStatus::Connected).await;

    // Ask the mobile signer for a signed note.
    let unsigned = r#"{"kind":1,"content":"cross-device note","tags":[],"created_at":1700000000}"#;
    web_engine
        .send_request(
            &web_session.session_id,
            Command::SignEvent,
            vec![unsigned.to_string()],
        )
        .await
        .unwrap();

    wait_for(|| !web_callbacks.responses_for(Command::SignEvent).is_empty()).await;
    let responses = web_callbacks.responses_for(Command::SignEvent);
    let reply = &responses[0];
    assert!(reply.is_ok(), "sign_event failed: {}", reply.error);

    let signed: Event = serde_json::from_str(&reply.result).unwrap();
    assert_eq!(signed.content, "cross-device note");
    assert_eq!(signed.pubkey, mobile_session.ours);
    signed.verify().unwrap();
}

#[tokio::test]
async fn persisted_sessions_cascade_with_profile() {
    let hub = Arc::new(RelayHub::default());
    let callbacks = Arc::new(RecordingCallbacks::default());
    let profile_store = Arc::new(MemoryProfileStore::new());
    let manager = IdentityManager::new(
        profile_store.clone(),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(HubTransport { hub: hub.clone() }),
        ConnectConfig::default(),
        Some(callbacks),
    );

    let profile = manager.create_profile(None).await.unwrap();
    let (session, _uri) = manager
        .open_session(vec![RELAY.to_string()], SessionMeta::default(), vec![])
        .await
        .unwrap();

    // The session document is owned by the profile.
    use keybridge_connect::ProfileStore;
    let stored = profile_store
        .get_profile_by_pubkey(&profile.pubkey)
        .unwrap()
        .unwrap();
    assert!(stored.session(&session.session_id).is_some());

    manager.delete_active_profile().await.unwrap();
    assert!(profile_store
        .get_profile_by_pubkey(&profile.pubkey)
        .unwrap()
        .is_none());
    assert!(manager.engine().session(&session.session_id).await.is_none());
}
