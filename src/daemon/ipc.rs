//! Control channel transport
//!
//! Exposes the `ControlDispatcher` on a Unix domain socket. Each line a client
//! writes is one JSON control request; each request gets exactly one JSON
//! response line, matched by `request_id`. A WaitForNextEvent holds its
//! connection until the event, a cancellation, or the client hanging up.
//! Requests sent on that connection meanwhile are answered `Busy` at once, so
//! their replies can precede the reply to the earlier wait.

use crate::dispatcher::{Completion, ControlDispatcher, ControlReply, ControlRequest, PendingWait};
use crate::daemon::logging::DaemonLogger;
use crate::error::ControlError;
use crate::models::ProcessEvent;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use uuid::Uuid;

/// Control request envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcMessage {
    /// Unique request ID for tracking
    pub request_id: String,
    #[serde(flatten)]
    pub request: ControlRequest,
}

impl IpcMessage {
    pub fn new(request: ControlRequest) -> Self {
        Self {
            request_id: generate_request_id(),
            request,
        }
    }
}

/// IPC response types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum IpcResponse {
    /// Successful operation
    Success {
        request_id: String,
        data: Option<serde_json::Value>,
        message: Option<String>,
    },
    /// Operation failed
    Error {
        request_id: String,
        code: u32,
        message: String,
        details: Option<String>,
    },
}

impl IpcResponse {
    pub fn from_result(request_id: String, result: Result<ControlReply, ControlError>) -> Self {
        match result {
            Ok(ControlReply::Event(event)) => IpcResponse::Success {
                request_id,
                data: serde_json::to_value(&event).ok(),
                message: Some("process event".to_string()),
            },
            Ok(ControlReply::DecisionAccepted(decision)) => IpcResponse::Success {
                request_id,
                data: serde_json::to_value(decision).ok(),
                message: Some("decision acknowledged".to_string()),
            },
            Err(error) => IpcResponse::from_error(request_id, &error, None),
        }
    }

    pub fn from_error(request_id: String, error: &ControlError, details: Option<String>) -> Self {
        IpcResponse::Error {
            request_id,
            code: error.status_code(),
            message: error.to_string(),
            details,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            IpcResponse::Success { request_id, .. } | IpcResponse::Error { request_id, .. } => {
                request_id
            }
        }
    }
}

/// Generate unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Control socket server
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        // Clean up socket file when server is dropped
        if self.listener.is_some() && self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl IpcServer {
    /// Bind the control socket, replacing a stale socket file
    pub fn bind(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path).with_context(|| {
                format!("Failed to remove existing socket: {}", socket_path.display())
            })?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create socket directory: {}", parent.display())
            })?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind to socket: {}", socket_path.display()))?;
        log::info!("control channel listening on {}", socket_path.display());

        Ok(Self {
            socket_path: socket_path.to_path_buf(),
            listener: Some(listener),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until the listener fails; each connection runs in its own task
    pub async fn serve(&self, dispatcher: ControlDispatcher, logger: DaemonLogger) -> Result<()> {
        let Some(listener) = self.listener.as_ref() else {
            bail!("Control socket is not bound");
        };

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .context("Failed to accept control connection")?;
            let handler = ConnectionHandler {
                dispatcher: dispatcher.clone(),
                logger: logger.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = handler.handle_connection(stream).await {
                    handler.logger.log_error(
                        &format!("Error handling control connection: {:#}", e),
                        Some("ipc"),
                    );
                }
            });
        }
    }

    /// Stop listening and remove the socket file
    pub fn stop(&mut self) -> Result<()> {
        if self.listener.take().is_some() && self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).with_context(|| {
                format!("Failed to remove socket file: {}", self.socket_path.display())
            })?;
        }
        Ok(())
    }
}

/// Handler for individual control connections
#[derive(Clone)]
struct ConnectionHandler {
    dispatcher: ControlDispatcher,
    logger: DaemonLogger,
}

type RequestLines = Lines<BufReader<OwnedReadHalf>>;

impl ConnectionHandler {
    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines
            .next_line()
            .await
            .context("Failed to read from client")?
        {
            let message = match parse_message(&line) {
                Some(Ok(message)) => message,
                Some(Err(response)) => {
                    write_response(&mut writer, &response).await?;
                    continue;
                }
                None => continue,
            };

            let request_id = message.request_id;
            let result = match self.dispatcher.dispatch(message.request) {
                Completion::Ready(result) => result,
                Completion::Pending(pending) => {
                    match self.await_pending(pending, &mut lines, &mut writer).await? {
                        Some(result) => result.map(ControlReply::Event),
                        // Client hung up; dropping the wait frees the slot
                        None => return Ok(()),
                    }
                }
            };

            match &result {
                Ok(ControlReply::Event(event)) => self.logger.log_event_delivered(event),
                Ok(ControlReply::DecisionAccepted(decision)) => self.logger.log_decision(decision),
                Err(error) => self
                    .logger
                    .log_rejected(&request_id, error.status_code(), &error.to_string()),
            }
            write_response(&mut writer, &IpcResponse::from_result(request_id, result)).await?;
        }

        Ok(())
    }

    /// Wait for the pending request while watching the connection.
    ///
    /// Returns `None` if the client disconnects first. Requests arriving on this
    /// connection meanwhile are answered `Busy`.
    async fn await_pending(
        &self,
        pending: PendingWait,
        lines: &mut RequestLines,
        writer: &mut OwnedWriteHalf,
    ) -> Result<Option<Result<ProcessEvent, ControlError>>> {
        let wait = pending.wait();
        tokio::pin!(wait);

        loop {
            tokio::select! {
                result = &mut wait => return Ok(Some(result)),
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read from client")? else {
                        return Ok(None);
                    };
                    let response = match parse_message(&line) {
                        Some(Ok(message)) => IpcResponse::from_error(
                            message.request_id,
                            &ControlError::Busy,
                            Some("a wait is already outstanding on this connection".to_string()),
                        ),
                        Some(Err(response)) => response,
                        None => continue,
                    };
                    write_response(writer, &response).await?;
                }
            }
        }
    }
}

/// `None` for blank lines, `Err` carries the response for an unparseable request
fn parse_message(line: &str) -> Option<Result<IpcMessage, IpcResponse>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(serde_json::from_str(line).map_err(|e| {
        IpcResponse::from_error(
            String::new(),
            &ControlError::InvalidRequest(0),
            Some(format!("Failed to parse control request: {}", e)),
        )
    }))
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &IpcResponse) -> Result<()> {
    let response_json = serde_json::to_string(response).context("Failed to serialize response")?;
    writer
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline")?;
    Ok(())
}
