// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! BIP-340 Schnorr signatures over secp256k1.
//!
//! Implemented directly from the tagged-hash construction and the group
//! arithmetic in [`crate::curve`]. Signing takes fresh auxiliary
//! randomness per call and never retries; verification returns `false`
//! for every malformed input rather than an error.

use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{ProjectivePoint, Scalar, U256};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::curve;
use crate::entropy;
use crate::error::{BridgeError, Result};

const TAG_AUX: &str = "BIP0340/aux";
const TAG_NONCE: &str = "BIP0340/nonce";
const TAG_CHALLENGE: &str = "BIP0340/challenge";

/// `SHA256(SHA256(tag) || SHA256(tag) || m0 || m1 || ...)`.
pub fn tagged_hash(tag: &str, chunks: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// Sign a 32-byte message with fresh auxiliary randomness.
pub fn sign(msg: &[u8; 32], secret: &[u8; 32]) -> Result<[u8; 64]> {
    sign_with_aux(msg, secret, &entropy::random_bytes::<32>())
}

/// Sign a 32-byte message with caller-provided auxiliary randomness.
///
/// Fails with [`BridgeError::SigningFailed`] in the (negligible) case the
/// derived nonce is zero; the caller retries with fresh randomness.
pub fn sign_with_aux(msg: &[u8; 32], secret: &[u8; 32], aux: &[u8; 32]) -> Result<[u8; 64]> {
    let d0 = curve::validate_private(secret)?;

    let point = (ProjectivePoint::GENERATOR * d0).to_affine();
    let d = if curve::y_is_odd(&point) { -d0 } else { d0 };
    let px = curve::x_bytes(&point);

    let aux_hash = tagged_hash(TAG_AUX, &[aux]);
    let mut d_bytes: [u8; 32] = d.to_bytes().into();
    let mut t = [0u8; 32];
    for (i, byte) in t.iter_mut().enumerate() {
        *byte = d_bytes[i] ^ aux_hash[i];
    }
    d_bytes.zeroize();

    let nonce_hash = tagged_hash(TAG_NONCE, &[&t, &px, msg]);
    t.zeroize();
    let k0 = <Scalar as Reduce<U256>>::reduce_bytes(&nonce_hash.into());
    if bool::from(k0.is_zero()) {
        return Err(BridgeError::SigningFailed("derived nonce is zero".into()));
    }

    let r_point = (ProjectivePoint::GENERATOR * k0).to_affine();
    let k = if curve::y_is_odd(&r_point) { -k0 } else { k0 };
    let rx = curve::x_bytes(&r_point);

    let challenge = tagged_hash(TAG_CHALLENGE, &[&rx, &px, msg]);
    let e = <Scalar as Reduce<U256>>::reduce_bytes(&challenge.into());
    let s = k + e * d;

    let mut sig = [0u8; 64];
    sig[..32].copy_from_slice(&rx);
    sig[32..].copy_from_slice(&s.to_bytes());
    Ok(sig)
}

/// Verify a 64-byte signature over a 32-byte message for an x-only pubkey.
///
/// Returns `false` for wrong-length signatures, `r >= p`, `s >= n`,
/// off-curve public keys and failed equations — never an error.
pub fn verify(msg: &[u8; 32], sig: &[u8], pubkey_x: &[u8; 32]) -> bool {
    if sig.len() != 64 {
        return false;
    }
    let rx: [u8; 32] = sig[..32].try_into().expect("length checked");
    let s_bytes: [u8; 32] = sig[32..].try_into().expect("length checked");

    let s = match Option::<Scalar>::from(Scalar::from_repr(s_bytes.into())) {
        Some(s) => s,
        None => return false,
    };
    let pubkey = match curve::decompress_xonly(pubkey_x, false) {
        Ok(p) => p,
        Err(_) => return false,
    };
    // Decompression rejects r >= p and x-coordinates off the curve.
    let r_point = match curve::decompress_xonly(&rx, false) {
        Ok(r) => r,
        Err(_) => return false,
    };

    let challenge = tagged_hash(TAG_CHALLENGE, &[&rx, pubkey_x, msg]);
    let e = <Scalar as Reduce<U256>>::reduce_bytes(&challenge.into());

    let lhs = ProjectivePoint::GENERATOR * s;
    let rhs = ProjectivePoint::from(r_point) + ProjectivePoint::from(pubkey) * e;
    lhs == rhs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{validate_private, xonly_pub};

    fn hex32(s: &str) -> [u8; 32] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    #[test]
    fn bip340_vector_zero() {
        // Test vector 0 from the BIP-340 reference vectors.
        let secret = hex32("0000000000000000000000000000000000000000000000000000000000000003");
        let aux = [0u8; 32];
        let msg = [0u8; 32];
        let expected_pub = "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";
        let expected_sig = "e907831f80848d1069a5371b402410364bdf1c5f8307b0084c55f1ce2dca8215\
                            25f66a4a85ea8b71e482a74f382d2ce5ebeee8fdb2172f477df4900d310536c0";

        let d = validate_private(&secret).unwrap();
        assert_eq!(hex::encode(xonly_pub(&d)), expected_pub);

        let sig = sign_with_aux(&msg, &secret, &aux).unwrap();
        assert_eq!(hex::encode(sig), expected_sig);
        assert!(verify(&msg, &sig, &xonly_pub(&d)));
    }

    #[test]
    fn sign_verify_roundtrip() {
        let secret = [0x01u8; 32];
        let msg: [u8; 32] = Sha256::digest(b"pong").into();
        let d = validate_private(&secret).unwrap();
        let sig = sign(&msg, &secret).unwrap();
        assert!(verify(&msg, &sig, &xonly_pub(&d)));
    }

    #[test]
    fn verify_rejects_bit_flips() {
        let secret = [0x01u8; 32];
        let msg: [u8; 32] = Sha256::digest(b"pong").into();
        let d = validate_private(&secret).unwrap();
        let pubkey = xonly_pub(&d);
        let sig = sign(&msg, &secret).unwrap();

        for i in 0..64 {
            let mut bad = sig;
            bad[i] ^= 0x01;
            assert!(!verify(&msg, &bad, &pubkey), "flipped sig byte {i} verified");
        }
        let mut bad_msg = msg;
        bad_msg[0] ^= 0x01;
        assert!(!verify(&bad_msg, &sig, &pubkey));
        let mut bad_pub = pubkey;
        bad_pub[31] ^= 0x01;
        assert!(!verify(&msg, &sig, &bad_pub));
    }

    #[test]
    fn verify_rejects_out_of_range_components() {
        let secret = [0x01u8; 32];
        let msg = [0x55u8; 32];
        let d = validate_private(&secret).unwrap();
        let pubkey = xonly_pub(&d);
        let sig = sign(&msg, &secret).unwrap();

        // r >= p
        let mut bad = sig;
        bad[..32].copy_from_slice(&[0xff; 32]);
        assert!(!verify(&msg, &bad, &pubkey));

        // s >= n
        let mut bad = sig;
        bad[32..].copy_from_slice(&hex32(
            "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        ));
        assert!(!verify(&msg, &bad, &pubkey));

        // wrong length
        assert!(!verify(&msg, &sig[..63], &pubkey));

        // off-curve pubkey (x = 5 is not on the curve)
        let mut off = [0u8; 32];
        off[31] = 5;
        assert!(!verify(&msg, &sig, &off));
    }

    #[test]
    fn distinct_aux_randomness_changes_signature() {
        let secret = [0x07u8; 32];
        let msg = [0xabu8; 32];
        let sig_a = sign_with_aux(&msg, &secret, &[0x01; 32]).unwrap();
        let sig_b = sign_with_aux(&msg, &secret, &[0x02; 32]).unwrap();
        assert_ne!(sig_a, sig_b);

        let d = validate_private(&secret).unwrap();
        assert!(verify(&msg, &sig_a, &xonly_pub(&d)));
        assert!(verify(&msg, &sig_b, &xonly_pub(&d)));
    }
}
