// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Profile model: an identity and the sessions it owns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// An identity keyed by its x-only pubkey, owning its sessions.
///
/// Sessions reference the profile by the value of their `ours` field;
/// there are no back-pointers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// x-only pubkey, lowercase hex. Unique across the store.
    pub pubkey: String,
    /// Display attributes; opaque to the protocol core.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Profile {
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            attributes: BTreeMap::new(),
            sessions: Vec::new(),
        }
    }

    /// Insert or replace a session by its id, keeping list order stable.
    pub fn upsert_session(&mut self, session: Session) {
        debug_assert_eq!(session.ours, self.pubkey);
        match self
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
        {
            Some(slot) => *slot = session,
            None => self.sessions.push(session),
        }
    }

    /// Remove a session by id; returns whether one was removed.
    pub fn remove_session(&mut self, session_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.session_id != session_id);
        self.sessions.len() != before
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    #[test]
    fn upsert_replaces_in_place() {
        let pubkey = "ab".repeat(32);
        let mut profile = Profile::new(&pubkey);
        let mut session = Session::new(&pubkey, vec!["wss://r/".into()], "s", vec![]);
        profile.upsert_session(session.clone());
        assert_eq!(profile.sessions.len(), 1);

        session.status = SessionStatus::Connected;
        profile.upsert_session(session.clone());
        assert_eq!(profile.sessions.len(), 1);
        assert_eq!(profile.sessions[0].status, SessionStatus::Connected);
    }

    #[test]
    fn remove_session_reports_presence() {
        let pubkey = "ab".repeat(32);
        let mut profile = Profile::new(&pubkey);
        let session = Session::new(&pubkey, vec![], "s", vec![]);
        let id = session.session_id.clone();
        profile.upsert_session(session);
        assert!(profile.remove_session(&id));
        assert!(!profile.remove_session(&id));
    }
}
