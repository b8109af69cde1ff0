// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Identity façade: the active profile, its sessions, and the dispatch
//! task that feeds inbound relay events to the engine.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use keybridge_core::entropy;
use keybridge_core::keys::Keypair;

use crate::config::ConnectConfig;
use crate::engine::{SessionCallbacks, SessionEngine};
use crate::envelope::{Command, Response};
use crate::error::{BridgeError, Result};
use crate::profile::Profile;
use crate::relay::{normalize_relay_urls, RelayFacade, RelayTransport};
use crate::session::{PendingRequest, Session, SessionStatus};
use crate::store::{keypair_entry, KeyStore, ProfileStore};
use crate::uri::ConnectUri;

/// Display metadata carried in the bootstrap URI.
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

pub struct IdentityManager {
    profile_store: Arc<dyn ProfileStore>,
    key_store: Arc<dyn KeyStore>,
    relay: Arc<RelayFacade>,
    engine: Arc<SessionEngine>,
    active: Mutex<Option<String>>,
}

impl IdentityManager {
    pub fn new(
        profile_store: Arc<dyn ProfileStore>,
        key_store: Arc<dyn KeyStore>,
        transport: Arc<dyn RelayTransport>,
        config: ConnectConfig,
        callbacks: Option<Arc<dyn SessionCallbacks>>,
    ) -> Self {
        let relay = Arc::new(RelayFacade::new(transport, config.clone()));
        let engine = Arc::new(SessionEngine::new(
            profile_store.clone(),
            key_store.clone(),
            relay.clone(),
            config,
            callbacks,
        ));
        Self {
            profile_store,
            key_store,
            relay,
            engine,
            active: Mutex::new(None),
        }
    }

    /// The session engine, for embedders that need direct access.
    pub fn engine(&self) -> Arc<SessionEngine> {
        self.engine.clone()
    }

    // --- profiles ----------------------------------------------------------

    /// Generate or import a keypair, persist it, and make its profile the
    /// active one. Previously persisted sessions are adopted.
    pub async fn create_profile(&self, private_key_hex: Option<&str>) -> Result<Profile> {
        let keypair = match private_key_hex {
            Some(hex_key) => Keypair::from_hex(hex_key)?,
            None => Keypair::generate()?,
        };
        let pubkey = keypair.public_hex();
        self.key_store
            .store(&keypair_entry(&pubkey), &keypair.secret_hex())?;

        let profile = match self.profile_store.get_profile_by_pubkey(&pubkey)? {
            Some(existing) => existing,
            None => {
                let profile = Profile::new(&pubkey);
                self.profile_store.upsert_profile(&profile)?;
                profile
            }
        };
        self.engine.adopt_sessions(profile.sessions.clone()).await;
        *self.active.lock().await = Some(pubkey.clone());

        info!(pubkey_id = &pubkey[..8], "active profile installed");
        Ok(profile)
    }

    /// The active profile, freshly loaded from the store.
    pub async fn active_profile(&self) -> Result<Profile> {
        let pubkey = self.active_pubkey().await?;
        self.profile_store
            .get_profile_by_pubkey(&pubkey)?
            .ok_or_else(|| BridgeError::SessionNotFound(format!("profile {pubkey}")))
    }

    /// Delete the active profile: its key-store entry, its sessions (and
    /// their pending entries), and the stored document.
    pub async fn delete_active_profile(&self) -> Result<()> {
        let pubkey = self.active_pubkey().await?;
        self.engine.remove_sessions_for(&pubkey).await;
        self.relay.stop_listening(&pubkey).await?;
        self.key_store.remove(&keypair_entry(&pubkey))?;
        self.profile_store.delete_profile(&pubkey)?;
        *self.active.lock().await = None;
        Ok(())
    }

    async fn active_pubkey(&self) -> Result<String> {
        self.active
            .lock()
            .await
            .clone()
            .ok_or_else(|| BridgeError::InvalidInput("no active profile".into()))
    }

    // --- sessions ----------------------------------------------------------

    /// Begin listening for envelope events addressed to the active
    /// profile. Idempotent; one dispatch task per subscription.
    pub async fn listen(&self, relays: &[String]) -> Result<()> {
        let ours = self.active_pubkey().await?;
        let Some(mut rx) = self.relay.listen(&ours, relays).await? else {
            return Ok(());
        };
        let engine = self.engine.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                engine.handle_event(&ours, &event).await;
            }
            debug!("dispatch task finished");
        });
        Ok(())
    }

    /// Initiator side: allocate a session awaiting its peer and produce
    /// the bootstrap URI for the other device to scan.
    pub async fn open_session(
        &self,
        relays: Vec<String>,
        meta: SessionMeta,
        permissions: Vec<String>,
    ) -> Result<(Session, String)> {
        let ours = self.active_pubkey().await?;
        let relays = normalize_relay_urls(&relays);
        if relays.is_empty() {
            return Err(BridgeError::InvalidInput("at least one relay required".into()));
        }

        let secret = entropy::random_id();
        let session = Session::new(&ours, relays.clone(), &secret, permissions.clone());
        let session_id = session.session_id.clone();
        self.engine.install_session(session).await?;
        let session = self
            .engine
            .set_status(&session_id, SessionStatus::AwaitingScan)
            .await?;

        // The connect pending entry is keyed by the secret itself: only a
        // peer that scanned the URI can correlate against it.
        self.engine
            .register_pending(
                secret.clone(),
                PendingRequest::new(&session_id, Command::Connect, "", permissions.clone()),
            )
            .await;

        self.listen(&relays).await?;

        let uri = ConnectUri {
            client_pubkey: ours,
            relays,
            secret,
            permissions,
            name: meta.name,
            url: meta.url,
            image: meta.image,
        }
        .build()?;
        Ok((session, uri))
    }

    /// Acceptor side: a scanned URI pairs this device with the initiator.
    /// Publishes the connect response echoing the secret and walks the
    /// session to `Connected`.
    pub async fn on_scan(
        &self,
        peer_pubkey: &str,
        relays: Vec<String>,
        secret: &str,
        permissions: Vec<String>,
    ) -> Result<Session> {
        let ours = self.active_pubkey().await?;
        keybridge_core::keys::pubkey_from_hex(peer_pubkey)?;
        let relays = normalize_relay_urls(&relays);
        if relays.is_empty() {
            return Err(BridgeError::InvalidInput("at least one relay required".into()));
        }
        if secret.is_empty() {
            return Err(BridgeError::InvalidInput("secret must not be empty".into()));
        }

        self.listen(&relays).await?;

        // Upsert by peer key: re-scanning replaces the previous pairing.
        let session = match self.engine.session_by_peer(peer_pubkey).await {
            Some(mut existing) => {
                existing.secret = secret.to_string();
                existing.relays = relays;
                existing.permissions = permissions;
                existing
            }
            None => {
                let mut session = Session::new(&ours, relays, secret, permissions);
                session.theirs = peer_pubkey.to_string();
                session
            }
        };
        let session_id = session.session_id.clone();
        self.engine.install_session(session).await?;
        let session = self
            .engine
            .set_status(&session_id, SessionStatus::QrScanned)
            .await?;

        self.engine
            .send_response(&session, Response::ok(secret, secret))
            .await?;
        self.engine
            .set_status(&session_id, SessionStatus::ResponseSent)
            .await?;
        let session = self
            .engine
            .set_status(&session_id, SessionStatus::Connected)
            .await?;
        info!(session_id = &session_id[..8], "scan accepted, session connected");
        Ok(session)
    }

    /// Keepalive: send a ping request on the session.
    pub async fn send_ping(&self, session_id: &str) -> Result<String> {
        self.engine
            .send_request(session_id, Command::Ping, vec![])
            .await
    }

    /// Ask the peer to tear the session down; removal happens when the
    /// acknowledgement arrives.
    pub async fn send_disconnect(&self, session_id: &str) -> Result<String> {
        self.engine
            .send_request(session_id, Command::Disconnect, vec![])
            .await
    }
}
