use crate::ipc::facade::{handle_line, ControlSurface};
use crate::ipc::protocol::{ProtocolError, Response};
use crate::ipc::IpcError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, trace, warn};

const LOG_TARGET: &str = "koalad::ipc::server";

/// Longest request line accepted, newline included.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Accepts control connections on a Unix domain socket.
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
}

impl IpcServer {
    /// Binds `path`, replacing a stale socket file left by a previous run.
    /// Must be called from within a Tokio runtime.
    pub fn bind(path: &Path) -> Result<Self, IpcError> {
        if path.exists() {
            if std::os::unix::net::UnixStream::connect(path).is_ok() {
                return Err(IpcError::AddrInUse(path.to_path_buf()));
            }
            debug!(target: LOG_TARGET, "Removing stale socket {}", path.display());
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let listener = UnixListener::bind(path)?;
        info!(target: LOG_TARGET, "Listening on {}", path.display());
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serves connections until `shutdown` fires, then removes the socket file.
    #[instrument(skip_all, fields(socket = %self.path.display()))]
    pub async fn serve(
        self,
        surface: Arc<dyn ControlSurface>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IpcError> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let surface = Arc::clone(&surface);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, surface).await {
                                warn!(target: LOG_TARGET, "Connection ended with error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!(target: LOG_TARGET, "Failed to accept connection: {}", e);
                    }
                },
                _ = shutdown.recv() => {
                    info!(target: LOG_TARGET, "Shutdown signal received, closing control socket.");
                    break;
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(target: LOG_TARGET, "Failed to remove socket {}: {}", self.path.display(), e);
            }
        }
        Ok(())
    }
}

async fn handle_connection(stream: UnixStream, surface: Arc<dyn ControlSurface>) -> Result<(), IpcError> {
    debug!(target: LOG_TARGET, "Client connected");
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = (&mut reader)
            .take(MAX_REQUEST_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            debug!(target: LOG_TARGET, "Client disconnected");
            return Ok(());
        }
        if line.len() > MAX_REQUEST_BYTES {
            // No way to find the next request boundary; answer and hang up.
            warn!(target: LOG_TARGET, "Request exceeds {} bytes, closing connection", MAX_REQUEST_BYTES);
            let response = Response::fault(
                0,
                ProtocolError::Malformed(format!("request longer than {} bytes", MAX_REQUEST_BYTES)).to_string(),
            );
            write_response(&mut writer, &response).await?;
            return Ok(());
        }

        let response = match std::str::from_utf8(&line) {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                trace!(target: LOG_TARGET, "Request: {}", trimmed);
                handle_line(surface.as_ref(), trimmed).await
            }
            Err(e) => {
                warn!(target: LOG_TARGET, "Request is not valid UTF-8: {}", e);
                Response::fault(0, ProtocolError::Malformed(format!("invalid UTF-8: {}", e)).to_string())
            }
        };
        write_response(&mut writer, &response).await?;
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<(), IpcError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}
