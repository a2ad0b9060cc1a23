//! JSON-lines control protocol.
//!
//! Each request and each response is one JSON object on its own line:
//!
//! ```text
//! {"request_id": 1, "method": "PlayMusic", "params": ["/music/a.flac"]}
//! {"request_id": 1, "status": "ok", "data": {"message": "music played successfully", ...}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Name carried by every fault the daemon returns.
pub const FAULT_NAME: &str = "org.koalad.Error";

static REQUEST_ID: AtomicI64 = AtomicI64::new(1);

/// Generate a unique request ID.
pub fn next_request_id() -> i64 {
    REQUEST_ID.fetch_add(1, Ordering::SeqCst)
}

/// A request sent to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub request_id: i64,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Request {
    /// Create a new request with an auto-generated request ID.
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            request_id: next_request_id(),
            method: method.to_string(),
            params,
        }
    }

    pub fn play_music(path: &str) -> Self {
        Self::new("PlayMusic", vec![path.into()])
    }

    pub fn set_volume(delta: f64) -> Self {
        Self::new("SetVolume", vec![delta.into()])
    }

    pub fn pause_or_unpause() -> Self {
        Self::new("PauseOrUnpause", Vec::new())
    }

    pub fn stop() -> Self {
        Self::new("Stop", Vec::new())
    }

    pub fn status() -> Self {
        Self::new("Status", Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    #[error("{method} expects {expected}")]
    InvalidParams {
        method: &'static str,
        expected: &'static str,
    },
}

/// A validated request, one variant per control method.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PlayMusic(PathBuf),
    SetVolume(f64),
    PauseOrUnpause,
    Stop,
    Status,
}

impl Call {
    pub fn from_request(request: &Request) -> Result<Call, ProtocolError> {
        match request.method.as_str() {
            "PlayMusic" => match request.params.as_slice() {
                [Value::String(path)] if !path.is_empty() => Ok(Call::PlayMusic(PathBuf::from(path))),
                _ => Err(ProtocolError::InvalidParams {
                    method: "PlayMusic",
                    expected: "one non-empty path string",
                }),
            },
            "SetVolume" => match request.params.as_slice() {
                [value] => value
                    .as_f64()
                    .filter(|delta| delta.is_finite())
                    .map(Call::SetVolume)
                    .ok_or(ProtocolError::InvalidParams {
                        method: "SetVolume",
                        expected: "one numeric delta",
                    }),
                _ => Err(ProtocolError::InvalidParams {
                    method: "SetVolume",
                    expected: "one numeric delta",
                }),
            },
            "PauseOrUnpause" | "PauseorUnpause" => Ok(Call::PauseOrUnpause),
            "Stop" => Ok(Call::Stop),
            "Status" => Ok(Call::Status),
            other => Err(ProtocolError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// A domain-qualified error with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{name}: {message}")]
pub struct Fault {
    pub name: String,
    pub message: String,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: FAULT_NAME.to_string(),
            message: message.into(),
        }
    }
}

/// Response to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: i64,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
}

impl Response {
    pub fn ok(request_id: i64, data: Value) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Ok,
            data: Some(data),
            fault: None,
        }
    }

    pub fn fault(request_id: i64, message: impl Into<String>) -> Self {
        Self {
            request_id,
            status: ResponseStatus::Error,
            data: None,
            fault: Some(Fault::new(message)),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// The response data, or its fault.
    pub fn into_result(self) -> Result<Value, Fault> {
        match self.status {
            ResponseStatus::Ok => Ok(self.data.unwrap_or(Value::Null)),
            ResponseStatus::Error => Err(self
                .fault
                .unwrap_or_else(|| Fault::new("request failed without a message"))),
        }
    }
}
