// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session engine: pending-request correlation, inbound dispatch and the
//! outbound sealing pipeline.
//!
//! Both sides of a pairing run the same engine; either may be initiator.
//! Inbound events that fail verification, decryption or parsing are
//! dropped with a diagnostic; local failures inside request handlers are
//! converted to error responses on the wire.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use keybridge_core::cipher::{nip04, nip44};
use keybridge_core::event::{self, Event, EventTemplate, NOSTR_CONNECT_KIND};
use keybridge_core::keys::{pubkey_from_hex, Keypair};
use keybridge_core::entropy;

use crate::config::ConnectConfig;
use crate::envelope::{self, Command, Frame, RawRequest, Request, Response};
use crate::error::{error_for_peer, BridgeError, Result};
use crate::relay::RelayFacade;
use crate::session::{PendingRequest, Session, SessionStatus};
use crate::store::{keypair_entry, KeyStore, ProfileStore};

/// Notifications the embedding layer can subscribe to.
pub trait SessionCallbacks: Send + Sync + 'static {
    /// Fired on every session status transition, and with
    /// `SessionStatus::Disconnected` just before a session is removed.
    fn session_state_changed(&self, session: &Session);

    /// Fired when a pong (or any ping response) arrives.
    fn ping_received(&self, response: &Response) {
        let _ = response;
    }

    /// Fired for correlated responses the engine itself does not act on.
    fn response_received(&self, command: Command, response: &Response) {
        let _ = (command, response);
    }
}

/// Log-safe prefix of an untrusted identifier.
fn short(s: &str) -> &str {
    let mut end = s.len().min(8);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub struct SessionEngine {
    profile_store: Arc<dyn ProfileStore>,
    key_store: Arc<dyn KeyStore>,
    relay: Arc<RelayFacade>,
    config: ConnectConfig,
    sessions: Mutex<HashMap<String, Session>>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    callbacks: Option<Arc<dyn SessionCallbacks>>,
}

impl SessionEngine {
    pub fn new(
        profile_store: Arc<dyn ProfileStore>,
        key_store: Arc<dyn KeyStore>,
        relay: Arc<RelayFacade>,
        config: ConnectConfig,
        callbacks: Option<Arc<dyn SessionCallbacks>>,
    ) -> Self {
        Self {
            profile_store,
            key_store,
            relay,
            config,
            sessions: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            callbacks,
        }
    }

    // --- session table -----------------------------------------------------

    /// Install (or replace) a session in the runtime table and persist it.
    pub async fn install_session(&self, session: Session) -> Result<()> {
        self.persist(&session)?;
        self.sessions
            .lock()
            .await
            .insert(session.session_id.clone(), session);
        Ok(())
    }

    /// Adopt previously persisted sessions, e.g. after a profile switch.
    pub async fn adopt_sessions(&self, sessions: Vec<Session>) {
        let mut table = self.sessions.lock().await;
        for session in sessions {
            table.insert(session.session_id.clone(), session);
        }
    }

    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    pub async fn session_by_peer(&self, theirs: &str) -> Option<Session> {
        self.sessions
            .lock()
            .await
            .values()
            .find(|s| s.theirs == theirs)
            .cloned()
    }

    pub async fn sessions_for(&self, ours: &str) -> Vec<Session> {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|s| s.ours == ours)
            .cloned()
            .collect()
    }

    /// Move a session to a new status, persist, and notify.
    pub async fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<Session> {
        let session = {
            let mut table = self.sessions.lock().await;
            let session = table
                .get_mut(session_id)
                .ok_or_else(|| BridgeError::SessionNotFound(session_id.to_string()))?;
            if session.status == status {
                return Ok(session.clone());
            }
            session.status = status;
            session.clone()
        };
        self.persist(&session)?;
        self.notify_state(&session);
        Ok(session)
    }

    /// Remove a session everywhere; notifies with `Disconnected` when
    /// `notify` is set. Pending entries pointing at it are dropped too.
    pub async fn remove_session(&self, session_id: &str, notify: bool) -> Result<()> {
        let removed = self.sessions.lock().await.remove(session_id);
        let Some(mut session) = removed else {
            return Ok(());
        };
        self.pending
            .lock()
            .await
            .retain(|_, p| p.session_id != session_id);

        if let Some(mut profile) = self.profile_store.get_profile_by_pubkey(&session.ours)? {
            profile.remove_session(session_id);
            self.profile_store.upsert_profile(&profile)?;
        }

        session.status = SessionStatus::Disconnected;
        if notify {
            self.notify_state(&session);
        }
        info!(session_id = short(session_id), "session removed");
        Ok(())
    }

    /// Drop every runtime session (and pending entry) owned by `ours`.
    pub async fn remove_sessions_for(&self, ours: &str) {
        let ids: Vec<String> = self
            .sessions
            .lock()
            .await
            .values()
            .filter(|s| s.ours == ours)
            .map(|s| s.session_id.clone())
            .collect();
        let mut sessions = self.sessions.lock().await;
        let mut pending = self.pending.lock().await;
        for id in ids {
            sessions.remove(&id);
            pending.retain(|_, p| p.session_id != id);
        }
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let mut profile = self
            .profile_store
            .get_profile_by_pubkey(&session.ours)?
            .ok_or_else(|| BridgeError::SessionNotFound(format!("profile {}", session.ours)))?;
        profile.upsert_session(session.clone());
        self.profile_store.upsert_profile(&profile)
    }

    fn notify_state(&self, session: &Session) {
        if let Some(callbacks) = &self.callbacks {
            callbacks.session_state_changed(session);
        }
    }

    // --- pending-request table ---------------------------------------------

    /// Atomically record a pending request under `id`.
    pub async fn register_pending(&self, id: impl Into<String>, pending: PendingRequest) {
        self.pending.lock().await.insert(id.into(), pending);
    }

    /// Atomically remove and return the pending request for `id`.
    pub async fn take_pending(&self, id: &str) -> Option<PendingRequest> {
        self.pending.lock().await.remove(id)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Drop pending entries older than `max_age_secs`; returns how many.
    pub async fn expire_pending(&self, max_age_secs: i64) -> usize {
        let cutoff = chrono::Utc::now().timestamp() - max_age_secs;
        let mut pending = self.pending.lock().await;
        let before = pending.len();
        pending.retain(|_, p| p.created_at >= cutoff);
        before - pending.len()
    }

    // --- outbound ----------------------------------------------------------

    /// Send a request to the session peer; returns the request id.
    pub async fn send_request(
        &self,
        session_id: &str,
        command: Command,
        params: Vec<String>,
    ) -> Result<String> {
        let session = self
            .session(session_id)
            .await
            .ok_or_else(|| BridgeError::SessionNotFound(session_id.to_string()))?;
        if !session.has_peer() {
            return Err(BridgeError::InvalidInput(
                "session peer not yet established".into(),
            ));
        }

        let id = entropy::random_id();
        self.register_pending(
            id.clone(),
            PendingRequest::new(session_id, command, &session.theirs, params.clone()),
        )
        .await;

        let request = Request::new(id.clone(), command, params);
        if let Err(e) = self.seal_and_publish(&session, &request.to_json()).await {
            // Failed sends must not leave a dangling correlation entry.
            self.take_pending(&id).await;
            return Err(e);
        }
        debug!(request_id = %id, method = %command, "request sent");
        Ok(id)
    }

    /// Send a response frame to the session peer.
    pub async fn send_response(&self, session: &Session, response: Response) -> Result<()> {
        self.seal_and_publish(session, &response.to_json()).await
    }

    /// NIP-44-seal a frame for the peer, wrap and sign the envelope event,
    /// and hand it to the relay facade.
    async fn seal_and_publish(&self, session: &Session, frame_json: &str) -> Result<()> {
        // The keypair stays inside this block: the key must not live
        // across the publish suspension point.
        let envelope = {
            let keypair = self.load_keypair(&session.ours)?;
            let peer = pubkey_from_hex(&session.theirs)?;
            let shared = keypair.ecdh(&peer)?;
            let content = nip44::encrypt(frame_json, &nip44::conversation_key(&shared))?;

            event::finalize(
                EventTemplate {
                    kind: NOSTR_CONNECT_KIND,
                    tags: vec![vec!["p".to_string(), session.theirs.clone()]],
                    content,
                    created_at: chrono::Utc::now().timestamp() as u64,
                },
                &keypair,
            )?
        };
        self.relay.publish(&session.relays, &envelope).await
    }

    /// Read the long-term key for one operation; never cached.
    fn load_keypair(&self, ours: &str) -> Result<Keypair> {
        let entry = keypair_entry(ours);
        let secret_hex = self
            .key_store
            .load(&entry)?
            .ok_or(BridgeError::KeyNotFound(entry))?;
        Keypair::from_hex(&secret_hex)
    }

    // --- inbound -----------------------------------------------------------

    /// Process one inbound envelope event addressed to `ours`.
    ///
    /// All failures are swallowed here: adversarial or stale input must
    /// not surface beyond a diagnostic.
    pub async fn handle_event(&self, ours: &str, event: &Event) {
        if let Err(e) = self.process_event(ours, event).await {
            debug!(error = %e, event_id = short(&event.id), "dropping inbound event");
        }
    }

    async fn process_event(&self, ours: &str, event: &Event) -> Result<()> {
        event.verify()?;

        let frame_json = {
            let keypair = self.load_keypair(ours)?;
            let peer = pubkey_from_hex(&event.pubkey)?;
            let shared = keypair.ecdh(&peer)?;
            nip44::decrypt(&event.content, &nip44::conversation_key(&shared))?
        };
        if frame_json.len() > self.config.max_request_json_size {
            return Err(BridgeError::InvalidInput("frame too large".into()));
        }

        match envelope::parse_frame(&frame_json)? {
            Frame::Request(raw) => self.handle_request(&event.pubkey, raw).await,
            Frame::Response(response) => self.handle_response(&event.pubkey, response).await,
        }
    }

    async fn handle_request(&self, peer: &str, raw: RawRequest) -> Result<()> {
        if raw.id.len() > 64
            || !raw
                .id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(BridgeError::InvalidInput("invalid request id".into()));
        }
        if raw.params.len() > self.config.max_params {
            return Err(BridgeError::InvalidInput("too many parameters".into()));
        }

        let Some(session) = self.session_by_peer(peer).await else {
            debug!(peer_id = short(peer), "request from unknown peer");
            return Ok(());
        };

        let response = match raw.command() {
            Err(_) => {
                warn!(method = %raw.method, "unknown request method");
                Response::error(raw.id.clone(), format!("Unknown method: {}", raw.method))
            }
            Ok(Command::Disconnect) => {
                let response = Response::ok(raw.id.clone(), "ack");
                if let Err(e) = self.send_response(&session, response).await {
                    warn!(error = %e, "failed to acknowledge disconnect");
                }
                self.remove_session(&session.session_id, true).await?;
                return Ok(());
            }
            Ok(command) => {
                debug!(method = %command, peer_id = short(peer), "inbound request");
                self.dispatch_request(&session, command, &raw).await
            }
        };
        self.send_response(&session, response).await
    }

    async fn dispatch_request(
        &self,
        session: &Session,
        command: Command,
        raw: &RawRequest,
    ) -> Response {
        let id = raw.id.clone();
        match command {
            Command::Connect => {
                // Re-entry on a connected session is idempotent.
                if let Err(e) = self.set_status(&session.session_id, SessionStatus::Connected).await
                {
                    return Response::error(id, error_for_peer(&e));
                }
                Response::ok(id, "ack")
            }
            Command::Ping => Response::ok(id, "pong"),
            Command::GetPublicKey => Response::ok(id, session.ours.clone()),
            Command::SignEvent => match self.handle_sign_event(session, raw.params.first()) {
                Ok(signed_json) => Response::ok(id, signed_json),
                Err(e) => Response::error(id, error_for_peer(&e)),
            },
            Command::Nip04Encrypt
            | Command::Nip04Decrypt
            | Command::Nip44Encrypt
            | Command::Nip44Decrypt => match self.handle_cipher(session, command, &raw.params) {
                Ok(result) => Response::ok(id, result),
                Err(e) => Response::error(id, error_for_peer(&e)),
            },
            Command::Disconnect => unreachable!("disconnect handled before dispatch"),
        }
    }

    fn handle_sign_event(&self, session: &Session, param: Option<&String>) -> Result<String> {
        let event_json =
            param.ok_or_else(|| BridgeError::InvalidInput("missing event parameter".into()))?;
        if event_json.len() > self.config.max_request_json_size {
            return Err(BridgeError::InvalidInput("event JSON too large".into()));
        }
        let template: EventTemplate = serde_json::from_str(event_json)
            .map_err(|_| BridgeError::InvalidInput("invalid event format".into()))?;

        let max_future = chrono::Utc::now().timestamp() as u64 + 86_400;
        if template.created_at > max_future {
            return Err(BridgeError::InvalidInput(
                "created_at too far in the future".into(),
            ));
        }

        let keypair = self.load_keypair(&session.ours)?;
        let signed = event::finalize(template, &keypair)?;
        debug!(
            event_kind = signed.kind,
            event_id = &signed.id[..8],
            "signed event for peer"
        );
        Ok(serde_json::to_string(&signed)?)
    }

    fn handle_cipher(
        &self,
        session: &Session,
        command: Command,
        params: &[String],
    ) -> Result<String> {
        if params.len() < 2 {
            return Err(BridgeError::InvalidInput("missing parameters".into()));
        }
        let third_party = pubkey_from_hex(&params[0])?;
        let keypair = self.load_keypair(&session.ours)?;
        let shared = keypair.ecdh(&third_party)?;

        match command {
            Command::Nip44Encrypt => nip44::encrypt(&params[1], &nip44::conversation_key(&shared)),
            Command::Nip44Decrypt => nip44::decrypt(&params[1], &nip44::conversation_key(&shared)),
            Command::Nip04Encrypt => Ok(nip04::encrypt(&params[1], &shared)),
            Command::Nip04Decrypt => nip04::decrypt(&params[1], &shared),
            _ => unreachable!("only cipher commands reach handle_cipher"),
        }
    }

    async fn handle_response(&self, peer: &str, response: Response) -> Result<()> {
        let Some(pending) = self.take_pending(&response.id).await else {
            debug!(response_id = %response.id, "response without pending entry");
            return Ok(());
        };
        if !pending.target_pubkey.is_empty() && pending.target_pubkey != peer {
            debug!(response_id = %response.id, "response from unexpected peer");
            return Ok(());
        }

        match pending.command {
            Command::Connect => self.complete_connect(&pending, peer).await,
            Command::Ping => {
                if let Ok(session) = self
                    .set_status(&pending.session_id, SessionStatus::Connected)
                    .await
                {
                    debug!(session_id = &session.session_id[..8], "pong received");
                }
                if let Some(callbacks) = &self.callbacks {
                    callbacks.ping_received(&response);
                }
                Ok(())
            }
            Command::Disconnect => {
                if response.result == "ack" {
                    self.remove_session(&pending.session_id, true).await?;
                }
                Ok(())
            }
            command => {
                if let Some(callbacks) = &self.callbacks {
                    callbacks.response_received(command, &response);
                }
                Ok(())
            }
        }
    }

    /// A connect response resolves the peer key (first time), marks the
    /// session connected and fires an immediate keepalive ping.
    async fn complete_connect(&self, pending: &PendingRequest, peer: &str) -> Result<()> {
        let session = {
            let mut table = self.sessions.lock().await;
            let Some(session) = table.get_mut(&pending.session_id) else {
                return Ok(());
            };
            if session.theirs.is_empty() {
                session.theirs = peer.to_string();
            }
            session.status = SessionStatus::Connected;
            session.clone()
        };
        self.persist(&session)?;
        self.notify_state(&session);
        info!(session_id = &session.session_id[..8], "session connected");

        if let Err(e) = self
            .send_request(&session.session_id, Command::Ping, vec![])
            .await
        {
            warn!(error = %e, "post-connect ping failed");
        }
        Ok(())
    }
}
