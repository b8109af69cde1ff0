// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Keypair type with a zeroized secret.
use zeroize::{Zeroize, Zeroizing};

use crate::curve;
use crate::entropy;
use crate::error::{BridgeError, Result};
use crate::schnorr;

/// A secp256k1 keypair: 32-byte secret scalar and x-only public key.
///
/// The secret is zeroized on drop. Instances are meant to live only for
/// the duration of a single signing or ECDH operation; the long-term key
/// stays in the platform key store.
#[derive(Clone)]
pub struct Keypair {
    secret_key: Zeroizing<[u8; 32]>,
    public_key: [u8; 32],
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Result<Self> {
        const MAX_RETRIES: usize = 64;
        for _ in 0..MAX_RETRIES {
            let mut secret: [u8; 32] = entropy::random_bytes();
            match Self::from_secret_bytes(&mut secret) {
                Ok(keypair) => return Ok(keypair),
                Err(_) => secret.zeroize(),
            }
        }
        Err(BridgeError::SigningFailed(
            "failed to generate a valid keypair after 64 attempts".into(),
        ))
    }

    /// Create a keypair from secret bytes. Zeroes the source.
    pub fn from_secret_bytes(secret: &mut [u8; 32]) -> Result<Self> {
        let scalar = curve::validate_private(secret)?;
        let public_key = curve::xonly_pub(&scalar);
        let keypair = Self {
            secret_key: Zeroizing::new(*secret),
            public_key,
        };
        secret.zeroize();
        Ok(keypair)
    }

    /// Create a keypair from a 64-character lowercase hex private key.
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let mut decoded = Zeroizing::new(hex::decode(secret_hex)?);
        let mut secret: [u8; 32] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| BridgeError::InvalidPrivateKey)?;
        decoded.zeroize();
        Self::from_secret_bytes(&mut secret)
    }

    /// The secret key bytes.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret_key
    }

    /// The secret key as lowercase hex, zeroized on drop.
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.secret_key))
    }

    /// The x-only public key bytes.
    pub fn public_bytes(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// The x-only public key as lowercase hex.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    /// BIP-340 sign a 32-byte message.
    pub fn sign(&self, msg: &[u8; 32]) -> Result<[u8; 64]> {
        schnorr::sign(msg, &self.secret_key)
    }

    /// ECDH shared x-coordinate with a peer key (32/33/65-byte encoding).
    pub fn ecdh(&self, peer: &[u8]) -> Result<[u8; 32]> {
        let scalar = curve::validate_private(self.secret_key.as_slice())?;
        curve::ecdh(&scalar, peer)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_hex())
            .finish_non_exhaustive()
    }
}

/// Decode a 64-character lowercase hex x-only public key.
pub fn pubkey_from_hex(pubkey_hex: &str) -> Result<[u8; 32]> {
    let decoded = hex::decode(pubkey_hex)?;
    decoded
        .try_into()
        .map_err(|_| BridgeError::InvalidPublicKey("pubkey must be 32 bytes".into()))
}
