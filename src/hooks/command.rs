//! Hooks implemented as external commands.
//!
//! The request is written to the child's stdin as one JSON document. The child
//! answers on stdout:
//! - exit 0 with a JSON [`HookResponse`], or with empty stdout for "continue";
//! - exit 2 to block, with the reason on stderr;
//! - any other exit status is a hook failure.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::{GatehouseError, Result};
use crate::hooks::{HookRequest, HookResponse, HookTransport, MAX_MESSAGE_BYTES};

/// Exit status a command uses to block.
const BLOCK_EXIT_CODE: i32 = 2;

#[derive(Debug, Clone)]
pub struct CommandHook {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
}

impl CommandHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn envs(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }
}

#[async_trait]
impl HookTransport for CommandHook {
    async fn dispatch(&self, request: &HookRequest) -> Result<HookResponse> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .env("GATEHOUSE_HOOK_EVENT", request.event.to_string())
            .env("GATEHOUSE_CORRELATION_ID", &request.correlation_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The channel drops this future on timeout; take the child with it.
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| GatehouseError::HookTransport {
            reason: format!("failed to spawn '{}': {}", self.command, e),
        })?;

        let request_json = serde_json::to_vec(request)?;
        if let Some(mut stdin) = child.stdin.take() {
            // A hook that exits without reading stdin is not an error.
            let _ = stdin.write_all(&request_json).await;
            let _ = stdin.shutdown().await;
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (out, err) = tokio::join!(read_bounded(stdout), read_bounded(stderr));
        let (out, err) = (out?, err?);

        let status = child.wait().await.map_err(|e| GatehouseError::HookTransport {
            reason: format!("failed to wait for '{}': {}", self.command, e),
        })?;

        match status.code() {
            Some(0) => parse_stdout(&out),
            Some(BLOCK_EXIT_CODE) => {
                let reason = String::from_utf8_lossy(&err).trim().to_string();
                Ok(HookResponse {
                    decision: crate::hooks::HookVerdict::Block,
                    reason: (!reason.is_empty()).then_some(reason),
                    additional_context: None,
                })
            }
            code => Err(GatehouseError::HookTransport {
                reason: format!(
                    "'{}' exited with {}: {}",
                    self.command,
                    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}")),
                    String::from_utf8_lossy(&err).trim()
                ),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("command:{}", self.command)
    }
}

async fn read_bounded<R>(stream: Option<R>) -> Result<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(stream) = stream {
        stream
            .take(MAX_MESSAGE_BYTES)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| GatehouseError::HookTransport {
                reason: format!("read failed: {}", e),
            })?;
    }
    Ok(buf)
}

fn parse_stdout(out: &[u8]) -> Result<HookResponse> {
    let text = String::from_utf8_lossy(out);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(HookResponse::proceed());
    }
    serde_json::from_str(trimmed).map_err(|e| GatehouseError::HookProtocol {
        reason: format!("invalid hook output: {}", e),
    })
}
