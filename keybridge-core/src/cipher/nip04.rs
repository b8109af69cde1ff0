// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! NIP-04 legacy encryption: AES-256-CBC with PKCS#7 padding.
//!
//! Wire format: `base64(ciphertext) || "?iv=" || base64(iv)`. Kept only
//! for peers that have not moved to NIP-44.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::entropy;
use crate::error::{BridgeError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_SEPARATOR: &str = "?iv=";

/// Encrypt a UTF-8 plaintext under a 32-byte shared secret.
pub fn encrypt(plaintext: &str, shared_secret: &[u8; 32]) -> String {
    let iv: [u8; 16] = entropy::random_bytes();
    let ciphertext = Aes256CbcEnc::new(shared_secret.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    format!(
        "{}{IV_SEPARATOR}{}",
        BASE64.encode(ciphertext),
        BASE64.encode(iv)
    )
}

/// Decrypt a NIP-04 payload under a 32-byte shared secret.
pub fn decrypt(payload: &str, shared_secret: &[u8; 32]) -> Result<String> {
    let parts: Vec<&str> = payload.split(IV_SEPARATOR).collect();
    if parts.len() != 2 {
        return Err(BridgeError::MalformedPayload(
            "expected <ciphertext>?iv=<iv>".into(),
        ));
    }

    let ciphertext = BASE64
        .decode(parts[0])
        .map_err(|e| BridgeError::MalformedPayload(format!("ciphertext base64: {e}")))?;
    let iv_bytes = BASE64
        .decode(parts[1])
        .map_err(|e| BridgeError::MalformedPayload(format!("iv base64: {e}")))?;
    let iv: [u8; 16] = iv_bytes
        .try_into()
        .map_err(|_| BridgeError::MalformedPayload("iv must be 16 bytes".into()))?;

    let plaintext = Aes256CbcDec::new(shared_secret.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| BridgeError::PaddingError)?;

    String::from_utf8(plaintext).map_err(|_| BridgeError::MalformedPayload("invalid utf-8".into()))
}
