// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Injected persistence capabilities.
//!
//! The platform provides the real implementations (keychain, database);
//! the in-memory versions here back tests and embedders without one.
//! Deleting a profile cascades to its sessions by construction, since the
//! profile document owns them.

use std::collections::HashMap;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::error::{BridgeError, Result};
use crate::profile::Profile;

/// Key-store entry prefix for long-term private keys.
pub const KEYPAIR_PREFIX: &str = "userkeypair_";

/// The key-store entry name for a profile's private key.
pub fn keypair_entry(pubkey: &str) -> String {
    format!("{KEYPAIR_PREFIX}{pubkey}")
}

/// Profile persistence.
pub trait ProfileStore: Send + Sync {
    fn get_profile_by_pubkey(&self, pubkey: &str) -> Result<Option<Profile>>;
    fn list_profiles(&self) -> Result<Vec<Profile>>;
    fn upsert_profile(&self, profile: &Profile) -> Result<()>;
    fn delete_profile(&self, pubkey: &str) -> Result<()>;
}

/// Secure storage for long-term private keys, keyed by
/// [`keypair_entry`]; values are 64-character lowercase hex.
pub trait KeyStore: Send + Sync {
    fn load(&self, entry: &str) -> Result<Option<Zeroizing<String>>>;
    fn store(&self, entry: &str, value: &str) -> Result<()>;
    fn remove(&self, entry: &str) -> Result<()>;
}

/// In-memory profile store.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Profile>>> {
        self.profiles
            .lock()
            .map_err(|_| BridgeError::Storage("profile store poisoned".into()))
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get_profile_by_pubkey(&self, pubkey: &str) -> Result<Option<Profile>> {
        Ok(self.lock()?.get(pubkey).cloned())
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.lock()?
            .insert(profile.pubkey.clone(), profile.clone());
        Ok(())
    }

    fn delete_profile(&self, pubkey: &str) -> Result<()> {
        self.lock()?.remove(pubkey);
        Ok(())
    }
}

/// In-memory key store.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: Mutex<HashMap<String, Zeroizing<String>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Zeroizing<String>>>> {
        self.entries
            .lock()
            .map_err(|_| BridgeError::Storage("key store poisoned".into()))
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, entry: &str) -> Result<Option<Zeroizing<String>>> {
        Ok(self.lock()?.get(entry).cloned())
    }

    fn store(&self, entry: &str, value: &str) -> Result<()> {
        self.lock()?
            .insert(entry.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    fn remove(&self, entry: &str) -> Result<()> {
        self.lock()?.remove(entry);
        Ok(())
    }
}
