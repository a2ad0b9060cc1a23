//! Integration tests for the control socket
//!
//! These tests run a real session behind the socket server and talk to it
//! with the client.

use crate::test_utils::{test_session, write_sine_wav};
use koalad::ipc::{send_request, ControlSurface, IpcServer, Request, SessionFacade, FAULT_NAME};
use serde_json::Value;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::broadcast;

#[cfg(test)]
mod ipc_integration_tests {
    use super::*;

    async fn call_ok(socket: &Path, request: Request) -> Result<Value, Box<dyn Error>> {
        let response = send_request(socket, &request).await?;
        Ok(response.into_result()?)
    }

    async fn call_fault(socket: &Path, request: Request) -> Result<String, Box<dyn Error>> {
        let response = send_request(socket, &request).await?;
        match response.into_result() {
            Ok(data) => Err(format!("expected a fault, got {}", data).into()),
            Err(fault) => {
                assert_eq!(fault.name, FAULT_NAME);
                Ok(fault.message)
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_control_session_over_socket() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let music = dir.path().join("tone.wav");
        write_sine_wav(&music, 44_100, 2, 8.0)?;
        let socket = dir.path().join("koalad.sock");

        let (session, log) = test_session();
        let server = IpcServer::bind(&socket)?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let surface: Arc<dyn ControlSurface> = Arc::new(SessionFacade::new(session.clone()));
        let server_task = tokio::spawn(server.serve(surface, shutdown_rx));

        let fault = call_fault(&socket, Request::set_volume(1.0)).await?;
        assert_eq!(fault, "No music is currently playing");
        let fault = call_fault(&socket, Request::pause_or_unpause()).await?;
        assert_eq!(fault, "No music is currently playing");

        let played = call_ok(&socket, Request::play_music(&music.to_string_lossy())).await?;
        assert_eq!(played["message"], "music played successfully");
        assert_eq!(played["track"]["codec"], "wav");
        assert_eq!(played["track"]["sample_rate"], 44_100);

        let volume = call_ok(&socket, Request::set_volume(1.0)).await?;
        assert_eq!(volume["message"], "volume set");
        assert_eq!(volume["gain"], 1.0);

        let paused = call_ok(&socket, Request::pause_or_unpause()).await?;
        assert_eq!(paused["message"], "paused");
        let status = call_ok(&socket, Request::status()).await?;
        assert_eq!(status["status"]["state"], "paused");
        assert_eq!(status["status"]["gain"], 1.0);
        assert_eq!(status["status"]["multiplier"], 2.0);
        assert_eq!(status["status"]["open_handles"], 1);

        // The misspelled method name is accepted too.
        let resumed = call_ok(&socket, Request::new("PauseorUnpause", Vec::new())).await?;
        assert_eq!(resumed["message"], "resumed");

        let stopped = call_ok(&socket, Request::stop()).await?;
        assert_eq!(stopped["message"], "stopped");
        let stopped = call_ok(&socket, Request::stop()).await?;
        assert_eq!(stopped["message"], "already idle");

        let missing = dir.path().join("missing.flac");
        let fault = call_fault(&socket, Request::play_music(&missing.to_string_lossy())).await?;
        assert!(fault.starts_with("cannot resolve"), "unexpected fault: {}", fault);

        let fault = call_fault(&socket, Request::new("Shuffle", Vec::new())).await?;
        assert!(fault.contains("unknown method"));

        assert_eq!(log.lock().unwrap().opens.len(), 1);
        assert_eq!(session.open_handles(), 0);

        shutdown_tx.send(())?;
        server_task.await??;
        assert!(!socket.exists());

        tokio::task::spawn_blocking(move || session.shutdown()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_second_server_is_refused() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let socket = dir.path().join("koalad.sock");

        let (session, _log) = test_session();
        let server = IpcServer::bind(&socket)?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let surface: Arc<dyn ControlSurface> = Arc::new(SessionFacade::new(session));
        let server_task = tokio::spawn(server.serve(surface, shutdown_rx));

        assert!(IpcServer::bind(&socket).is_err());

        shutdown_tx.send(())?;
        server_task.await??;
        Ok(())
    }
}
