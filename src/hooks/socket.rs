use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::{GatehouseError, Result};
use crate::hooks::{HookRequest, HookResponse, HookTransport, MAX_MESSAGE_BYTES};

/// A hook process listening on a Unix socket. One JSON line each way per
/// connection.
pub struct SocketHook {
    socket_path: PathBuf,
}

impl SocketHook {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }
}

#[async_trait]
impl HookTransport for SocketHook {
    async fn dispatch(&self, request: &HookRequest) -> Result<HookResponse> {
        if !self.socket_path.exists() {
            return Err(GatehouseError::SocketNotFound {
                path: self.socket_path.clone(),
            });
        }

        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| GatehouseError::HookTransport {
                reason: format!("connect failed: {}", e),
            })?;

        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        stream
            .write_all(&line)
            .await
            .map_err(|e| GatehouseError::HookTransport {
                reason: format!("write failed: {}", e),
            })?;
        stream
            .shutdown()
            .await
            .map_err(|e| GatehouseError::HookTransport {
                reason: format!("shutdown write failed: {}", e),
            })?;

        let mut response_buf = Vec::new();
        stream
            .take(MAX_MESSAGE_BYTES)
            .read_to_end(&mut response_buf)
            .await
            .map_err(|e| GatehouseError::HookTransport {
                reason: format!("read failed: {}", e),
            })?;

        serde_json::from_slice(&response_buf).map_err(|e| GatehouseError::HookProtocol {
            reason: format!("invalid response JSON: {}", e),
        })
    }

    fn describe(&self) -> String {
        format!("socket:{}", self.socket_path.display())
    }
}
