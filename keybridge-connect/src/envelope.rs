// SPDX-FileCopyrightText: © 2026 Keybridge Contributors
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Request/response wire frames.
//!
//! Frames are JSON objects; a frame with a `method` key is a request,
//! anything else is a response. Parameters and results are strings on the
//! Rust side, but a string that is itself a JSON object or array is
//! embedded raw on the wire and re-stringified (compact) on decode.

use std::fmt;

use serde_json::Value;

use crate::error::{BridgeError, Result};

/// The closed set of RPC commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    SignEvent,
    Ping,
    GetPublicKey,
    Nip04Encrypt,
    Nip04Decrypt,
    Nip44Encrypt,
    Nip44Decrypt,
    Disconnect,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::Connect,
        Command::SignEvent,
        Command::Ping,
        Command::GetPublicKey,
        Command::Nip04Encrypt,
        Command::Nip04Decrypt,
        Command::Nip44Encrypt,
        Command::Nip44Decrypt,
        Command::Disconnect,
    ];

    /// The snake_case wire name.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Command::Connect => "connect",
            Command::SignEvent => "sign_event",
            Command::Ping => "ping",
            Command::GetPublicKey => "get_public_key",
            Command::Nip04Encrypt => "nip04_encrypt",
            Command::Nip04Decrypt => "nip04_decrypt",
            Command::Nip44Encrypt => "nip44_encrypt",
            Command::Nip44Decrypt => "nip44_decrypt",
            Command::Disconnect => "disconnect",
        }
    }

    /// Parse a wire name; unknown strings are an error.
    pub fn from_wire(s: &str) -> Result<Self> {
        match s {
            "connect" => Ok(Command::Connect),
            "sign_event" => Ok(Command::SignEvent),
            "ping" => Ok(Command::Ping),
            "get_public_key" => Ok(Command::GetPublicKey),
            "nip04_encrypt" => Ok(Command::Nip04Encrypt),
            "nip04_decrypt" => Ok(Command::Nip04Decrypt),
            "nip44_encrypt" => Ok(Command::Nip44Encrypt),
            "nip44_decrypt" => Ok(Command::Nip44Decrypt),
            "disconnect" => Ok(Command::Disconnect),
            other => Err(BridgeError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// An outbound request frame.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: String,
    pub command: Command,
    pub params: Vec<String>,
}

impl Request {
    pub fn new(id: impl Into<String>, command: Command, params: Vec<String>) -> Self {
        Self {
            id: id.into(),
            command,
            params,
        }
    }

    /// Encode to wire JSON.
    pub fn to_json(&self) -> String {
        let params: Vec<Value> = self.params.iter().map(|p| embed_param(p)).collect();
        serde_json::json!({
            "id": self.id,
            "method": self.command.as_wire(),
            "params": params,
        })
        .to_string()
    }
}

/// An inbound request before its method string has been resolved.
///
/// Keeping the raw method around lets the engine answer unknown methods
/// with a proper error response instead of dropping the frame.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub id: String,
    pub method: String,
    pub params: Vec<String>,
}

impl RawRequest {
    pub fn command(&self) -> Result<Command> {
        Command::from_wire(&self.method)
    }
}

/// A response frame. `error` is empty iff the request succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: String,
    pub result: String,
    pub error: String,
}

impl Response {
    pub fn ok(id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: result.into(),
            error: String::new(),
        }
    }

    pub fn error(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: String::new(),
            error: error.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_empty()
    }

    /// Encode to wire JSON.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "result": embed_param(&self.result),
            "error": self.error,
        })
        .to_string()
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Request(RawRequest),
    Response(Response),
}

/// Parse an inbound frame, discriminating on the presence of `method`.
pub fn parse_frame(json: &str) -> Result<Frame> {
    let value: Value = serde_json::from_str(json)?;
    let obj = value
        .as_object()
        .ok_or_else(|| BridgeError::MalformedPayload("frame must be a JSON object".into()))?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::MalformedPayload("frame missing string id".into()))?
        .to_string();

    if let Some(method) = obj.get("method") {
        let method = method
            .as_str()
            .ok_or_else(|| BridgeError::MalformedPayload("method must be a string".into()))?
            .to_string();
        let params = match obj.get("params") {
            Some(Value::Array(values)) => values.iter().map(extract_param).collect(),
            Some(_) => {
                return Err(BridgeError::MalformedPayload(
                    "params must be an array".into(),
                ))
            }
            None => Vec::new(),
        };
        Ok(Frame::Request(RawRequest { id, method, params }))
    } else {
        let result = obj.get("result").map(extract_param).unwrap_or_default();
        let error = obj
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Frame::Response(Response { id, result, error }))
    }
}

/// A string that is itself structural JSON goes on the wire raw.
fn embed_param(param: &str) -> Value {
    let structural = (param.starts_with('{') && param.ends_with('}'))
        || (param.starts_with('[') && param.ends_with(']'));
    if structural {
        if let Ok(value) = serde_json::from_str::<Value>(param) {
            if value.is_object() || value.is_array() {
                return value;
            }
        }
    }
    Value::String(param.to_string())
}

/// Structural wire values come back as compact strings.
fn extract_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
