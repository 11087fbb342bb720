pub mod directory;
pub mod turn;

pub use directory::AddDirectoriesStep;
pub use turn::{ModelBackend, TurnOutcome, TurnRequest};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::Result;
use crate::hooks::HookChannel;
use crate::trust::{TrustResolver, TrustStore};
use crate::workspace::paths::home_dir;
use crate::workspace::WorkspaceContext;

/// Whether directory adds are gated by trust, and whether the session's own
/// workspace is trusted (gating only applies inside a trusted workspace).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustGating {
    pub enabled: bool,
    pub workspace_trusted: bool,
}

impl Default for TrustGating {
    fn default() -> Self {
        Self {
            enabled: true,
            workspace_trusted: false,
        }
    }
}

/// Ties the workspace, the trust store and the hook channel together for
/// one session.
pub struct LifecycleCoordinator {
    workspace: Arc<WorkspaceContext>,
    store: TrustStore,
    resolver: TrustResolver,
    hooks: Arc<HookChannel>,
    gating: TrustGating,
    restrictive_sandbox: bool,
    cwd: PathBuf,
    home: Option<PathBuf>,
}

impl LifecycleCoordinator {
    pub fn new(
        workspace: Arc<WorkspaceContext>,
        store: TrustStore,
        hooks: Arc<HookChannel>,
        cwd: PathBuf,
    ) -> Self {
        Self {
            workspace,
            resolver: TrustResolver::new(store.clone()),
            store,
            hooks,
            gating: TrustGating::default(),
            restrictive_sandbox: false,
            cwd,
            home: home_dir(),
        }
    }

    /// Build a session rooted at `cwd` from settings: the workspace starts
    /// with `cwd`, workspace trust comes from the settings override or else
    /// from the trust store.
    ///
    /// The sandbox restriction is left off so startup directories can still be
    /// added; apply it with [`with_restrictive_sandbox`](Self::with_restrictive_sandbox)
    /// once they are in.
    pub fn from_settings(settings: &Settings, cwd: PathBuf) -> Result<Self> {
        let workspace = Arc::new(WorkspaceContext::with_directories(vec![cwd.clone()])?);
        let store = TrustStore::open(settings.trust_file());
        let workspace_trusted = settings
            .folder_trust
            .workspace_trusted
            .or_else(|| store.is_workspace_trusted(&cwd))
            .unwrap_or(false);
        let hooks = Arc::new(HookChannel::from_config(&settings.hooks));

        Ok(Self::new(workspace, store, hooks, cwd)
            .with_trust_gating(TrustGating {
                enabled: settings.folder_trust.enabled,
                workspace_trusted,
            }))
    }

    pub fn with_trust_gating(mut self, gating: TrustGating) -> Self {
        self.gating = gating;
        self
    }

    pub fn with_restrictive_sandbox(mut self, restrictive: bool) -> Self {
        self.restrictive_sandbox = restrictive;
        self
    }

    /// Override the home directory used for `~` expansion.
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn workspace(&self) -> &Arc<WorkspaceContext> {
        &self.workspace
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.store
    }

    pub fn hooks(&self) -> &Arc<HookChannel> {
        &self.hooks
    }

    pub fn gating(&self) -> TrustGating {
        self.gating
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}
