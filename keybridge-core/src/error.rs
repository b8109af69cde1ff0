// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error shared across the keybridge workspace crates.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Point not on curve")]
    NotOnCurve,

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("MAC verification failed")]
    AuthFail,

    #[error("Invalid padding")]
    PaddingError,

    #[error("Unsupported payload version: {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Plaintext length out of range: {0}")]
    InvalidPlaintextLength(usize),

    #[error("Event id does not match canonical serialization")]
    IdMismatch,

    #[error("Bad event signature")]
    BadSignature,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid connection URI: {0}")]
    InvalidUri(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Request not pending: {0}")]
    RequestNotPending(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("Subscription timed out")]
    SubscriptionTimeout,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
