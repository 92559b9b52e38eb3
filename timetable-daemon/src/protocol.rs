//! Client side of the daemon socket: one JSON request line, one JSON
//! response line.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Status,
    Sync,
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    fn into_data(self) -> Result<Value, DaemonError> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(DaemonError::Protocol(
                self.error.unwrap_or_else(|| "unknown daemon error".to_string()),
            ))
        }
    }
}

/// Send one request to the daemon socket under `home` and wait for the reply.
pub fn send_request(home: &Path, cmd: Command) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound
        | std::io::ErrorKind::ConnectionRefused
        | std::io::ErrorKind::ConnectionReset => DaemonError::DaemonNotRunning {
            socket: socket.clone(),
        },
        _ => io_err(&socket, err),
    })?;

    let mut payload = serde_json::to_vec(&DaemonRequest { cmd })?;
    payload.push(b'\n');
    stream.write_all(&payload).map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut line = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Daemon status, retrying briefly while a just-started daemon binds its
/// socket.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let mut attempts = 5;
    loop {
        match send_request(home, Command::Status) {
            Ok(response) => return response.into_data(),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                attempts -= 1;
                if attempts == 0 {
                    return Err(err);
                }
                sleep(Duration::from_millis(100));
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run one cycle now. Fails if a cycle is already in flight.
pub fn request_sync(home: &Path) -> Result<Value, DaemonError> {
    send_request(home, Command::Sync)?.into_data()
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    send_request(home, Command::Stop)?.into_data().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn request_encodes_lowercase_command() {
        let line = serde_json::to_string(&DaemonRequest { cmd: Command::Sync }).unwrap();
        assert_eq!(line, r#"{"cmd":"sync"}"#);
    }

    #[test]
    fn error_response_becomes_protocol_error() {
        let err = DaemonResponse::error("busy").into_data().unwrap_err();
        assert!(matches!(err, DaemonError::Protocol(msg) if msg == "busy"));
    }

    #[test]
    fn missing_socket_means_not_running() {
        let home = TempDir::new().unwrap();
        let err = send_request(home.path(), Command::Stop).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}
