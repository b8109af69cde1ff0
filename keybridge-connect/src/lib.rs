// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod profile;
pub mod relay;
pub mod session;
pub mod store;
pub mod uri;

pub use config::ConnectConfig;
pub use engine::{SessionCallbacks, SessionEngine};
pub use envelope::{Command, Request, Response};
pub use error::{BridgeError, Result};
pub use identity::{IdentityManager, SessionMeta};
pub use profile::Profile;
pub use relay::{normalize_relay_url, Filter, RelayFacade, RelayTransport};
pub use session::{PendingRequest, Session, SessionStatus};
pub use store::{KeyStore, MemoryKeyStore, MemoryProfileStore, ProfileStore};
pub use uri::ConnectUri;
