// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OS-backed randomness helpers.
//!
//! Every nonce, secret, request id and key in the protocol must come from
//! a cryptographically secure source; this module is the single place the
//! workspace reaches for it.

use rand::rngs::OsRng;
use rand::RngCore;

/// Fill an `N`-byte array from the OS CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// A fresh 128-bit identifier as lowercase hex, used for request ids and
/// session bootstrap secrets.
pub fn random_id() -> String {
    hex::encode(random_bytes::<16>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_are_distinct() {
        let a: [u8; 32] = random_bytes();
        let b: [u8; 32] = random_bytes();
        assert_ne!(a, b);
    }

    #[test]
    fn random_id_shape() {
        let id = random_id();
        assert_eq!(id.len(), 32);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
