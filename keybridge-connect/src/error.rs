// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
pub use keybridge_core::error::{BridgeError, Result};

/// Map a local handler failure to the error string sent back to the peer.
///
/// Crypto internals are not echoed verbatim; everything else keeps its
/// display form so the caller can act on it.
pub(crate) fn error_for_peer(e: &BridgeError) -> String {
    match e {
        BridgeError::AuthFail
        | BridgeError::PaddingError
        | BridgeError::InvalidPrivateKey
        | BridgeError::SigningFailed(_) => "Cryptographic operation failed".to_string(),
        BridgeError::KeyNotFound(_) => "Signing key unavailable".to_string(),
        other => other.to_string(),
    }
}
