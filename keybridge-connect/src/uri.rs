// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The `nostrconnect://` bootstrap URI.
//!
//! Authority is the initiator's x-only pubkey in lowercase hex; query
//! parameters carry the ordered relay list, the pairing secret, optional
//! permissions and display metadata. Unknown parameters are ignored on
//! parse.

use crate::error::{BridgeError, Result};

const SCHEME_PREFIX: &str = "nostrconnect://";

/// Parsed or to-be-built bootstrap URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectUri {
    /// Initiator pubkey, 64 lowercase hex chars.
    pub client_pubkey: String,
    /// Ordered relay list; at least one entry.
    pub relays: Vec<String>,
    /// Pairing secret; non-empty.
    pub secret: String,
    /// Permission strings from the `perms` CSV.
    pub permissions: Vec<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

fn is_hex_pubkey(s: &str) -> bool {
    s.len() == 64
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

impl ConnectUri {
    /// Build the URI string, percent-encoding every value.
    pub fn build(&self) -> Result<String> {
        if !is_hex_pubkey(&self.client_pubkey) {
            return Err(BridgeError::InvalidUri(
                "client pubkey must be 64 lowercase hex chars".into(),
            ));
        }
        if self.relays.is_empty() {
            return Err(BridgeError::InvalidUri("at least one relay required".into()));
        }
        if self.secret.is_empty() {
            return Err(BridgeError::InvalidUri("secret must not be empty".into()));
        }

        let mut uri = format!("{SCHEME_PREFIX}{}", self.client_pubkey);
        let mut separator = '?';
        for relay in &self.relays {
            uri.push(separator);
            separator = '&';
            uri.push_str("relay=");
            uri.push_str(&urlencoding::encode(relay));
        }
        uri.push_str("&secret=");
        uri.push_str(&urlencoding::encode(&self.secret));
        if !self.permissions.is_empty() {
            uri.push_str("&perms=");
            uri.push_str(&urlencoding::encode(&self.permissions.join(",")));
        }
        for (key, value) in [
            ("name", &self.name),
            ("url", &self.url),
            ("image", &self.image),
        ] {
            if let Some(value) = value {
                uri.push('&');
                uri.push_str(key);
                uri.push('=');
                uri.push_str(&urlencoding::encode(value));
            }
        }
        Ok(uri)
    }

    /// Parse a URI string. The scheme match is case-insensitive; relay
    /// order is preserved; unknown query parameters are ignored.
    pub fn parse(input: &str) -> Result<Self> {
        let scheme_ok = input
            .get(..SCHEME_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SCHEME_PREFIX));
        if !scheme_ok {
            return Err(BridgeError::InvalidUri(
                "expected nostrconnect:// scheme".into(),
            ));
        }

        let parsed =
            url::Url::parse(input).map_err(|e| BridgeError::InvalidUri(e.to_string()))?;
        let client_pubkey = parsed
            .host_str()
            .ok_or_else(|| BridgeError::InvalidUri("missing client pubkey".into()))?
            .to_lowercase();
        if !is_hex_pubkey(&client_pubkey) {
            return Err(BridgeError::InvalidUri(
                "client pubkey must be 64 lowercase hex chars".into(),
            ));
        }

        let mut uri = ConnectUri {
            client_pubkey,
            ..ConnectUri::default()
        };
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "relay" => uri.relays.push(value.into_owned()),
                "secret" => uri.secret = value.into_owned(),
                "perms" => {
                    uri.permissions = value
                        .split(',')
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "name" => uri.name = Some(value.into_owned()),
                "url" => uri.url = Some(value.into_owned()),
                "image" => uri.image = Some(value.into_owned()),
                _ => {}
            }
        }

        if uri.relays.is_empty() {
            return Err(BridgeError::InvalidUri("at least one relay required".into()));
        }
        if uri.secret.is_empty() {
            return Err(BridgeError::InvalidUri("secret must not be empty".into()));
        }
        Ok(uri)
    }
}
