// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Event model and canonical codec.
//!
//! The event id is the SHA-256 of the canonical array form
//! `[0, pubkey, created_at, kind, tags, content]` serialized without
//! insignificant whitespace; the signature is BIP-340 over that hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BridgeError, Result};
use crate::keys::Keypair;
use crate::schnorr;

/// Wire kind for remote-signer RPC envelope events.
pub const NOSTR_CONNECT_KIND: u16 = 24_133;

/// A signed event as it travels over the relay network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Lowercase hex SHA-256 of the canonical serialization.
    pub id: String,
    /// Author x-only public key, lowercase hex.
    pub pubkey: String,
    /// Unix timestamp (seconds).
    pub created_at: u64,
    /// Kind number.
    pub kind: u16,
    /// Ordered tag lists; the first element of a tag is its key.
    pub tags: Vec<Vec<String>>,
    /// Content body (for RPC envelopes: the NIP-44 payload).
    pub content: String,
    /// 64-byte BIP-340 signature over the id, lowercase hex.
    pub sig: String,
}

/// The unsigned portion of an event, as submitted to `sign_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTemplate {
    pub kind: u16,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub created_at: u64,
}

/// Canonical serialization used for id computation and signing.
pub fn canonical_json(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> String {
    serde_json::to_string(&(0u8, pubkey, created_at, kind, tags, content))
        .expect("canonical event serialization cannot fail")
}

/// SHA-256 of the canonical serialization.
pub fn event_id(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> [u8; 32] {
    Sha256::digest(canonical_json(pubkey, created_at, kind, tags, content).as_bytes()).into()
}

/// Sign a template with the given keypair, producing a complete event.
///
/// The author pubkey is always the keypair's; a caller-supplied pubkey in
/// the template JSON is ignored by construction.
pub fn finalize(template: EventTemplate, keypair: &Keypair) -> Result<Event> {
    let pubkey = keypair.public_hex();
    let id = event_id(
        &pubkey,
        template.created_at,
        template.kind,
        &template.tags,
        &template.content,
    );
    let sig = keypair.sign(&id)?;
    Ok(Event {
        id: hex::encode(id),
        pubkey,
        created_at: template.created_at,
        kind: template.kind,
        tags: template.tags,
        content: template.content,
        sig: hex::encode(sig),
    })
}

impl Event {
    /// Recompute the id from the canonical form.
    pub fn compute_id(&self) -> [u8; 32] {
        event_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
    }

    /// Verify the id against the canonical form and the signature over it.
    pub fn verify(&self) -> Result<()> {
        let id = self.compute_id();
        if hex::encode(id) != self.id {
            return Err(BridgeError::IdMismatch);
        }

        let pubkey: [u8; 32] = hex::decode(&self.pubkey)?
            .try_into()
            .map_err(|_| BridgeError::InvalidPublicKey("pubkey must be 32 bytes".into()))?;
        let sig = hex::decode(&self.sig)?;
        if !schnorr::verify(&id, &sig, &pubkey) {
            return Err(BridgeError::BadSignature);
        }
        Ok(())
    }

    /// The value of the first `p` tag, if any.
    pub fn first_p_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some("p"))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }
}
