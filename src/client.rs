//! Client side of the control channel
//!
//! Used by the CLI and by decision services written in Rust. One connection
//! carries requests sequentially; a wait blocks the connection until it completes.

use crate::daemon::ipc::{IpcMessage, IpcResponse};
use crate::dispatcher::ControlRequest;
use crate::error::ControlError;
use crate::models::{Decision, DecisionRecord, ProcessEvent};
use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

pub struct ControlClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl ControlClient {
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).await.with_context(|| {
            format!("Failed to connect to control socket: {}", socket_path.display())
        })?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    /// Send one request and read its response
    pub async fn call(&mut self, request: ControlRequest) -> Result<IpcResponse> {
        let message = IpcMessage::new(request);
        let mut payload = serde_json::to_string(&message).context("Failed to serialize request")?;
        payload.push('\n');
        self.writer
            .write_all(payload.as_bytes())
            .await
            .context("Failed to send request")?;

        let line = self
            .lines
            .next_line()
            .await
            .context("Failed to read response")?
            .ok_or_else(|| anyhow!("Control channel closed before responding"))?;
        let response: IpcResponse =
            serde_json::from_str(&line).context("Failed to parse response")?;

        if response.request_id() != message.request_id {
            bail!(
                "Response for request {} does not match request {}",
                response.request_id(),
                message.request_id
            );
        }
        Ok(response)
    }

    /// Block until the next process event. The inner error is the control-level failure.
    pub async fn wait_for_next_event(&mut self) -> Result<Result<ProcessEvent, ControlError>> {
        let response = self.call(ControlRequest::wait_for_next_event()).await?;
        into_control_result(response)
    }

    pub async fn submit_decision(
        &mut self,
        decision: Decision,
    ) -> Result<Result<Decision, ControlError>> {
        let response = self
            .call(ControlRequest::submit_decision(DecisionRecord::from(decision)))
            .await?;
        into_control_result(response)
    }
}

fn into_control_result<T: serde::de::DeserializeOwned>(
    response: IpcResponse,
) -> Result<Result<T, ControlError>> {
    match response {
        IpcResponse::Success { data, .. } => {
            let data = data.ok_or_else(|| anyhow!("Response carries no data"))?;
            let value = serde_json::from_value(data).context("Unexpected response payload")?;
            Ok(Ok(value))
        }
        IpcResponse::Error {
            code,
            message,
            details,
            ..
        } => match ControlError::from_status(code, &message) {
            Some(error) => Ok(Err(error)),
            None => Err(anyhow!(
                "Control request failed ({:#x}): {}{}",
                code,
                message,
                details.map(|d| format!(" ({})", d)).unwrap_or_default()
            )),
        },
    }
}
