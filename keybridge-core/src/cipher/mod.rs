// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Message encryption for the RPC envelope.
//!
//! Two schemes share the module: [`nip04`] (legacy AES-256-CBC) and
//! [`nip44`] (v2, the default for all new traffic). Both operate on a
//! caller-supplied shared secret so the curve layer stays separate.

pub mod nip04;
pub mod nip44;
