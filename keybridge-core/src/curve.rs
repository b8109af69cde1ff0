// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! secp256k1 primitives.
//!
//! Everything above this module works in terms of 32-byte scalars, x-only
//! public keys and compressed points; this module owns the conversions and
//! the group arithmetic behind them.

use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::point::DecompressPoint;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::subtle::Choice;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{AffinePoint, ProjectivePoint, PublicKey, Scalar};

use crate::error::{BridgeError, Result};

/// Parse and validate a private key: 32 bytes big-endian, `1 <= d < n`.
pub fn validate_private(bytes: &[u8]) -> Result<Scalar> {
    let repr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| BridgeError::InvalidPrivateKey)?;
    let scalar = Option::<Scalar>::from(Scalar::from_repr(repr.into()))
        .ok_or(BridgeError::InvalidPrivateKey)?;
    if bool::from(scalar.is_zero()) {
        return Err(BridgeError::InvalidPrivateKey);
    }
    Ok(scalar)
}

/// The x-only public key of `d`: the 32-byte big-endian x-coordinate of `dG`.
pub fn xonly_pub(d: &Scalar) -> [u8; 32] {
    x_bytes(&(ProjectivePoint::GENERATOR * d).to_affine())
}

/// The compressed public key of `d`: 33 bytes, 0x02/0x03 prefix by y-parity.
pub fn compressed_pub(d: &Scalar) -> [u8; 33] {
    let point = (ProjectivePoint::GENERATOR * d).to_affine();
    let encoded = point.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(encoded.as_bytes());
    out
}

/// Recover the point with the given x-coordinate and y-parity.
///
/// Fails with [`BridgeError::NotOnCurve`] when `x` is not the x-coordinate
/// of a curve point (or is not a canonical field element).
pub fn decompress_xonly(x: &[u8; 32], odd_y: bool) -> Result<AffinePoint> {
    Option::<AffinePoint>::from(AffinePoint::decompress(
        &(*x).into(),
        Choice::from(odd_y as u8),
    ))
    .ok_or(BridgeError::NotOnCurve)
}

/// Parse a peer public key from its 32-byte x-only, 33-byte compressed or
/// 65-byte uncompressed encoding.
///
/// For x-only inputs the even-y point is tried first, then the odd-y
/// point; which parity is chosen is deliberately unspecified — ECDH below
/// only ever uses the x-coordinate of the result.
pub fn parse_peer_pubkey(bytes: &[u8]) -> Result<AffinePoint> {
    match bytes.len() {
        32 => {
            let x: [u8; 32] = bytes.try_into().expect("length checked");
            decompress_xonly(&x, false)
                .or_else(|_| decompress_xonly(&x, true))
                .map_err(|_| BridgeError::InvalidPublicKey("x-only key not on curve".into()))
        }
        33 | 65 => {
            let pubkey = PublicKey::from_sec1_bytes(bytes)
                .map_err(|e| BridgeError::InvalidPublicKey(e.to_string()))?;
            Ok(*pubkey.as_affine())
        }
        n => Err(BridgeError::InvalidPublicKey(format!(
            "unexpected key length {n}"
        ))),
    }
}

/// ECDH: the 32-byte x-coordinate of `d·Q`.
pub fn ecdh(d: &Scalar, peer: &[u8]) -> Result<[u8; 32]> {
    let point = parse_peer_pubkey(peer)?;
    let shared = ProjectivePoint::from(point) * d;
    if bool::from(shared.is_identity()) {
        return Err(BridgeError::InvalidPublicKey(
            "shared point is the identity".into(),
        ));
    }
    Ok(x_bytes(&shared.to_affine()))
}

/// The big-endian x-coordinate of an affine point.
pub(crate) fn x_bytes(point: &AffinePoint) -> [u8; 32] {
    let encoded = point.to_encoded_point(true);
    let mut x = [0u8; 32];
    x.copy_from_slice(&encoded.as_bytes()[1..33]);
    x
}

/// Whether the y-coordinate of an affine point is odd.
pub(crate) fn y_is_odd(point: &AffinePoint) -> bool {
    point.to_encoded_point(true).as_bytes()[0] == 0x03
}
