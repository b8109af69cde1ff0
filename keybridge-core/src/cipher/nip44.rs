// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! NIP-44 v2 encryption.
//!
//! Conversation key: HKDF-extract over the ECDH x-coordinate with the
//! fixed salt `nip44-v2`. Per message: a random 32-byte nonce expands to
//! ChaCha20 key material and an HMAC key; the plaintext is length-prefixed
//! and padded before the stream cipher runs. Payload:
//! `base64(0x02 || nonce(32) || ciphertext || mac(32))`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::entropy;
use crate::error::{BridgeError, Result};

/// Payload version byte.
pub const VERSION: u8 = 2;

/// HKDF salt for the conversation key.
pub const CONVERSATION_SALT: &[u8] = b"nip44-v2";

/// Plaintext length bounds.
pub const MIN_PLAINTEXT_LEN: usize = 1;
pub const MAX_PLAINTEXT_LEN: usize = 65_535;

const NONCE_LEN: usize = 32;
const MAC_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Derive the 32-byte conversation key from an ECDH shared x-coordinate.
pub fn conversation_key(shared_x: &[u8; 32]) -> [u8; 32] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(CONVERSATION_SALT), shared_x);
    prk.into()
}

/// HKDF-expand the per-message ChaCha20 key, ChaCha20 nonce and HMAC key.
fn message_keys(conversation_key: &[u8; 32], nonce: &[u8; 32]) -> ([u8; 32], [u8; 12], [u8; 32]) {
    let hk = Hkdf::<Sha256>::from_prk(conversation_key).expect("32-byte PRK is always valid");
    let mut okm = [0u8; 76];
    hk.expand(nonce, &mut okm)
        .expect("76 bytes is a valid HKDF-SHA256 output length");

    let mut chacha_key = [0u8; 32];
    let mut chacha_nonce = [0u8; 12];
    let mut hmac_key = [0u8; 32];
    chacha_key.copy_from_slice(&okm[0..32]);
    chacha_nonce.copy_from_slice(&okm[32..44]);
    hmac_key.copy_from_slice(&okm[44..76]);
    (chacha_key, chacha_nonce, hmac_key)
}

/// Padded plaintext size for a plaintext of `len` bytes (prefix excluded).
///
/// Up to 32 bytes pad to 32; beyond that the chunk is 32 while the next
/// power of two stays at or below 256, and an eighth of that power above,
/// with the result rounded up to the next chunk multiple.
pub(crate) fn padded_len(len: usize) -> usize {
    if len <= 32 {
        return 32;
    }
    let next_pow2 = len.next_power_of_two();
    let chunk = if next_pow2 <= 256 { 32 } else { next_pow2 / 8 };
    len.div_ceil(chunk) * chunk
}

fn pad(plaintext: &[u8]) -> Result<Vec<u8>> {
    let len = plaintext.len();
    if !(MIN_PLAINTEXT_LEN..=MAX_PLAINTEXT_LEN).contains(&len) {
        return Err(BridgeError::InvalidPlaintextLength(len));
    }
    let mut padded = vec![0u8; 2 + padded_len(len)];
    padded[..2].copy_from_slice(&(len as u16).to_be_bytes());
    padded[2..2 + len].copy_from_slice(plaintext);
    Ok(padded)
}

fn unpad(padded: &[u8]) -> Result<Vec<u8>> {
    if padded.len() < 2 {
        return Err(BridgeError::PaddingError);
    }
    let len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if len < MIN_PLAINTEXT_LEN || padded.len() != 2 + padded_len(len) {
        return Err(BridgeError::PaddingError);
    }
    Ok(padded[2..2 + len].to_vec())
}

/// Encrypt a plaintext under a conversation key with a random nonce.
pub fn encrypt(plaintext: &str, conversation_key: &[u8; 32]) -> Result<String> {
    encrypt_with_nonce(plaintext, conversation_key, &entropy::random_bytes::<32>())
}

/// Encrypt with a caller-supplied nonce. Exposed for known-answer tests;
/// production traffic always uses [`encrypt`].
pub fn encrypt_with_nonce(
    plaintext: &str,
    conversation_key: &[u8; 32],
    nonce: &[u8; 32],
) -> Result<String> {
    let (chacha_key, chacha_nonce, hmac_key) = message_keys(conversation_key, nonce);

    let mut buffer = pad(plaintext.as_bytes())?;
    let mut cipher = ChaCha20::new(&chacha_key.into(), &chacha_nonce.into());
    cipher.apply_keystream(&mut buffer);

    let mut mac = HmacSha256::new_from_slice(&hmac_key).expect("HMAC accepts 32-byte keys");
    mac.update(nonce);
    mac.update(&buffer);
    let tag = mac.finalize().into_bytes();

    let mut payload = Vec::with_capacity(1 + NONCE_LEN + buffer.len() + MAC_LEN);
    payload.push(VERSION);
    payload.extend_from_slice(nonce);
    payload.extend_from_slice(&buffer);
    payload.extend_from_slice(&tag);
    Ok(BASE64.encode(payload))
}

/// Decrypt a NIP-44 payload under a conversation key.
pub fn decrypt(payload: &str, conversation_key: &[u8; 32]) -> Result<String> {
    let decoded = BASE64
        .decode(payload)
        .map_err(|e| BridgeError::MalformedPayload(format!("base64: {e}")))?;
    if decoded.len() <= 1 + NONCE_LEN + MAC_LEN {
        return Err(BridgeError::MalformedPayload("payload too short".into()));
    }
    if decoded[0] != VERSION {
        return Err(BridgeError::UnsupportedVersion(decoded[0]));
    }

    let nonce: [u8; 32] = decoded[1..1 + NONCE_LEN]
        .try_into()
        .expect("length checked");
    let ciphertext = &decoded[1 + NONCE_LEN..decoded.len() - MAC_LEN];
    let received_mac = &decoded[decoded.len() - MAC_LEN..];

    let (chacha_key, chacha_nonce, hmac_key) = message_keys(conversation_key, &nonce);

    let mut mac = HmacSha256::new_from_slice(&hmac_key).expect("HMAC accepts 32-byte keys");
    mac.update(&nonce);
    mac.update(ciphertext);
    let expected_mac = mac.finalize().into_bytes();
    if !bool::from(expected_mac.as_slice().ct_eq(received_mac)) {
        return Err(BridgeError::AuthFail);
    }

    let mut buffer = ciphertext.to_vec();
    let mut cipher = ChaCha20::new(&chacha_key.into(), &chacha_nonce.into());
    cipher.apply_keystream(&mut buffer);

    let plaintext = unpad(&buffer)?;
    String::from_utf8(plaintext).map_err(|_| BridgeError::MalformedPayload("invalid utf-8".into()))
}
