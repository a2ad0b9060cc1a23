use crate::ipc::protocol::{Request, Response};
use crate::ipc::IpcError;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::debug;

const LOG_TARGET: &str = "koalad::ipc::client";

/// Sends one request to the daemon at `socket` and waits for its response.
pub async fn send_request(socket: &Path, request: &Request) -> Result<Response, IpcError> {
    let stream = UnixStream::connect(socket)
        .await
        .map_err(|e| IpcError::ConnectionFailed(format!("{}: {}", socket.display(), e)))?;
    let (reader, mut writer) = stream.into_split();

    let mut payload = serde_json::to_vec(request)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await?;
    debug!(target: LOG_TARGET, request_id = request.request_id, method = %request.method, "Request sent");

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::Disconnected);
    }
    let response: Response = serde_json::from_str(line.trim())?;
    if response.request_id != request.request_id {
        return Err(IpcError::UnexpectedResponse(format!(
            "expected request_id {}, got {}",
            request.request_id, response.request_id
        )));
    }
    Ok(response)
}
