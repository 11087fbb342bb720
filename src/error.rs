use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GatehouseError {
    #[error("directory does not exist: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("path is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("directory is already in the workspace: {}", path.display())]
    AlreadyInWorkspace { path: PathBuf },

    #[error("directory is not accessible: {}: {reason}", path.display())]
    Inaccessible { path: PathBuf, reason: String },

    #[error("please provide at least one path to add")]
    NoPathsProvided,

    #[error(
        "adding directories is not supported in restrictive sandbox profiles; \
         use --include-directories when starting the session instead"
    )]
    SandboxRestricted,

    #[error("unknown trust level: {value}")]
    InvalidTrustLevel { value: String },

    #[error("unknown hook event: {value}")]
    InvalidHookEvent { value: String },

    #[error("config parse error in {}: {reason}", path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("hook transport error: {reason}")]
    HookTransport { reason: String },

    #[error("hook protocol error: {reason}")]
    HookProtocol { reason: String },

    #[error("hook timeout after {timeout_ms}ms")]
    HookTimeout { timeout_ms: u64 },

    #[error("socket not found at {}", path.display())]
    SocketNotFound { path: PathBuf },

    #[error("model backend error: {reason}")]
    ModelBackend { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatehouseError {
    /// True for the errors that reject a single directory during validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GatehouseError::DirectoryNotFound { .. }
                | GatehouseError::NotADirectory { .. }
                | GatehouseError::AlreadyInWorkspace { .. }
                | GatehouseError::Inaccessible { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GatehouseError>;
