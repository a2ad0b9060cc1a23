//! Local control surface over a Unix domain socket

pub mod client;
mod facade;
pub mod protocol;
mod server;

pub use client::send_request;
pub use facade::{dispatch, handle_line, ControlSurface, SessionFacade};
pub use protocol::{Call, Fault, ProtocolError, Request, Response, ResponseStatus, FAULT_NAME};
pub use server::{IpcServer, MAX_REQUEST_BYTES};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Socket {0} is already served by a running daemon")]
    AddrInUse(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("Disconnected")]
    Disconnected,
}
