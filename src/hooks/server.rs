//! The hook-process side of [`SocketHook`](crate::hooks::SocketHook).
//!
//! A policy process binds a [`HookServer`] and hands it a handler. The server
//! decodes each request's payload into the handler's type and writes back the
//! handler's [`HookResponse`]. A request that is oversized or doesn't decode
//! gets no answer, which the gatehouse side treats as "no hook ran".

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use crate::error::{GatehouseError, Result};
use crate::hooks::{HookEventName, HookRequest, HookResponse, MAX_MESSAGE_BYTES};

/// One decoded hook invocation, as seen by the policy handler.
#[derive(Debug, Clone)]
pub struct HookCall<P> {
    pub event: HookEventName,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: P,
}

impl<P: DeserializeOwned> HookCall<P> {
    /// Decode the opaque payload of `request` as JSON `P`.
    pub fn decode(request: HookRequest) -> Result<Self> {
        let payload = serde_json::from_str(request.payload.as_str()).map_err(|e| {
            GatehouseError::HookProtocol {
                reason: format!("{} payload does not decode: {}", request.event, e),
            }
        })?;
        Ok(Self {
            event: request.event,
            correlation_id: request.correlation_id,
            timestamp: request.timestamp,
            payload,
        })
    }
}

pub struct HookServer {
    socket_path: PathBuf,
    shutdown: CancellationToken,
}

impl HookServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Answer hook calls until [`shutdown`](Self::shutdown). A stale socket
    /// file at the path is replaced; the socket is removed on return.
    pub async fn serve<P, F, Fut>(&self, handler: F) -> Result<()>
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(HookCall<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResponse> + Send + 'static,
    {
        let listener = self.bind()?;
        let handler = Arc::new(handler);
        tracing::info!("hook server: listening on {}", self.socket_path.display());

        loop {
            let stream = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        tracing::warn!("hook server: accept failed: {}", e);
                        continue;
                    }
                },
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = answer(stream, handler.as_ref()).await {
                    tracing::warn!("hook server: request dropped: {}", e);
                }
            });
        }

        let _ = std::fs::remove_file(&self.socket_path);
        tracing::info!("hook server: stopped");
        Ok(())
    }

    /// Stop accepting. Calls already being answered run to completion.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn bind(&self) -> Result<UnixListener> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        UnixListener::bind(&self.socket_path).map_err(|e| GatehouseError::HookTransport {
            reason: format!("cannot bind {}: {}", self.socket_path.display(), e),
        })
    }
}

async fn answer<P, F, Fut>(stream: UnixStream, handler: &F) -> Result<()>
where
    P: DeserializeOwned,
    F: Fn(HookCall<P>) -> Fut,
    Fut: Future<Output = HookResponse>,
{
    let (reader, mut writer) = stream.into_split();
    let request = read_request(reader).await?;
    let call = HookCall::decode(request)?;

    let mut line = serde_json::to_vec(&handler(call).await)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Read one JSON line, refusing anything longer than [`MAX_MESSAGE_BYTES`].
async fn read_request<R>(reader: R) -> Result<HookRequest>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut bounded = BufReader::new(reader.take(MAX_MESSAGE_BYTES));
    let mut line = Vec::new();
    let n = bounded.read_until(b'\n', &mut line).await?;
    if n as u64 >= MAX_MESSAGE_BYTES && line.last() != Some(&b'\n') {
        return Err(GatehouseError::HookProtocol {
            reason: format!("request exceeds {} bytes", MAX_MESSAGE_BYTES),
        });
    }
    serde_json::from_slice(&line).map_err(|e| GatehouseError::HookProtocol {
        reason: format!("invalid request: {}", e),
    })
}
