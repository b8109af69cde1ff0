// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
use std::time::Duration;

/// Tunables for the session engine and relay facade.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Upper bound on a decrypted RPC frame.
    pub max_request_json_size: usize,
    /// Upper bound on the number of request parameters.
    pub max_params: usize,
    /// How long a relay subscription may take to establish.
    pub subscribe_timeout: Duration,
    /// How far back the subscription filter reaches, in seconds.
    pub lookback_secs: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            max_request_json_size: 64 * 1024,
            max_params: 10,
            subscribe_timeout: Duration::from_secs(60),
            lookback_secs: 30,
        }
    }
}
