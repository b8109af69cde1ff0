// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

pub mod cipher;
pub mod curve;
pub mod entropy;
pub mod error;
pub mod event;
pub mod keys;
pub mod schnorr;

pub use error::{BridgeError, Result};
pub use event::{Event, EventTemplate, NOSTR_CONNECT_KIND};
pub use keys::Keypair;
