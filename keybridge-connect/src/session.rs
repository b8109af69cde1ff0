// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session and pending-request data model.

use serde::{Deserialize, Serialize};

use crate::envelope::Command;
use keybridge_core::entropy;

/// Lifecycle of a pairing between two public keys.
///
/// `theirs` is empty exactly while the status is `Idle` or
/// `AwaitingScan`; `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Idle,
    AwaitingScan,
    QrScanned,
    ResponseSent,
    Connected,
    Disconnected,
    Error,
}

/// A long-lived pairing exchanging encrypted RPC frames over relays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Random unique identifier.
    pub session_id: String,
    /// Our x-only pubkey (hex); equals the owning profile's pubkey.
    pub ours: String,
    /// Peer x-only pubkey (hex); empty until the handshake resolves it.
    #[serde(default)]
    pub theirs: String,
    /// Short shared token used to detect spoofing during bootstrap.
    pub secret: String,
    /// Ordered, non-empty relay list.
    pub relays: Vec<String>,
    /// Permission strings; opaque to the protocol core.
    #[serde(default)]
    pub permissions: Vec<String>,
    pub status: SessionStatus,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

impl Session {
    pub fn new(
        ours: impl Into<String>,
        relays: Vec<String>,
        secret: impl Into<String>,
        permissions: Vec<String>,
    ) -> Self {
        Self {
            session_id: entropy::random_id(),
            ours: ours.into(),
            theirs: String::new(),
            secret: secret.into(),
            relays,
            permissions,
            status: SessionStatus::Idle,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether the handshake has resolved the peer key.
    pub fn has_peer(&self) -> bool {
        !self.theirs.is_empty()
    }
}

/// A record awaiting a peer response, correlated by request id.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub session_id: String,
    pub command: Command,
    /// Expected responder pubkey; empty while the peer is still unknown
    /// (the bootstrap connect entry).
    pub target_pubkey: String,
    pub created_at: i64,
    pub parameters: Vec<String>,
}

impl PendingRequest {
    pub fn new(
        session_id: impl Into<String>,
        command: Command,
        target_pubkey: impl Into<String>,
        parameters: Vec<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            command,
            target_pubkey: target_pubkey.into(),
            created_at: chrono::Utc::now().timestamp(),
            parameters,
        }
    }
}
