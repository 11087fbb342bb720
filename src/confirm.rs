use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{GatehouseError, Result};
use crate::trust::{TrustLevel, TrustStore};
use crate::workspace::WorkspaceContext;

/// The options offered for directories with no recorded trust level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustChoice {
    /// Add the directories for this session only.
    AddOnce,
    /// Record the directories as TRUST_FOLDER, then add them.
    AddAndRemember,
    /// Add nothing; report the directories as untrusted.
    Reject,
    /// Abandon the operation without touching anything.
    Cancel,
}

impl std::fmt::Display for TrustChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustChoice::AddOnce => write!(f, "add-once"),
            TrustChoice::AddAndRemember => write!(f, "add-and-remember"),
            TrustChoice::Reject => write!(f, "reject"),
            TrustChoice::Cancel => write!(f, "cancel"),
        }
    }
}

impl std::str::FromStr for TrustChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "y" | "yes" | "once" | "add-once" => Ok(TrustChoice::AddOnce),
            "r" | "remember" | "yes-and-remember" | "add-and-remember" => {
                Ok(TrustChoice::AddAndRemember)
            }
            "n" | "no" | "reject" => Ok(TrustChoice::Reject),
            "c" | "cancel" => Ok(TrustChoice::Cancel),
            _ => Err(format!("unknown choice: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationOutcome {
    Applied,
    Cancelled,
}

/// Lifecycle of a [`PendingConfirmation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "detail")]
pub enum ConfirmationState {
    Open,
    Resolving(TrustChoice),
    Closed(ConfirmationOutcome),
}

/// What a directory-add batch did. Every path through the flow produces one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub added: Vec<PathBuf>,
    pub errors: Vec<String>,
    /// Requested directories that were already in the workspace.
    pub already_present: Vec<PathBuf>,
    /// Degraded-mode notices, e.g. an unreadable trust store.
    pub warnings: Vec<String>,
}

impl CompletionReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Informational lines for display, in the order they should appear.
    pub fn info_messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.already_present.is_empty() {
            out.push(format!(
                "The following directories are already in the workspace:\n{}",
                bullet_list(&self.already_present)
            ));
        }
        if !self.added.is_empty() {
            out.push(format!(
                "Successfully added directories:\n{}",
                bullet_list(&self.added)
            ));
        }
        out
    }

    /// File the outcome of adding `path`. A directory that another batch added
    /// in the meantime counts as already present, not as a failure.
    pub(crate) fn record_add(&mut self, path: PathBuf, result: Result<()>) {
        match result {
            Ok(()) => self.added.push(path),
            Err(GatehouseError::AlreadyInWorkspace { .. }) => self.already_present.push(path),
            Err(e) => self
                .errors
                .push(format!("Error adding '{}': {}", path.display(), e)),
        }
    }

    /// All errors joined into one message, if there are any.
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("\n"))
        }
    }
}

pub(crate) fn bullet_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("- {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// What the UI collaborator is shown for a pending confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub folders: Vec<PathBuf>,
    /// Follows the confirmation through `Resolving` to `Closed`, so the UI can
    /// show an "applying" state after the choice is made.
    pub state: watch::Receiver<ConfirmationState>,
}

/// The UI side of a pending confirmation. Implementations present the folders
/// and return exactly one choice.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, request: ConfirmationRequest) -> TrustChoice;
}

/// An unresolved trust decision for directories with no recorded trust level.
///
/// Created by the directory-add flow with the paths that still need consent,
/// plus the report accumulated so far for the same batch. Resolved exactly once.
#[derive(Debug)]
pub struct PendingConfirmation {
    unknown: Vec<PathBuf>,
    report: CompletionReport,
    state: watch::Sender<ConfirmationState>,
}

impl PendingConfirmation {
    pub(crate) fn new(unknown: Vec<PathBuf>, report: CompletionReport) -> Self {
        debug_assert!(!unknown.is_empty(), "nothing to confirm");
        let (state, _) = watch::channel(ConfirmationState::Open);
        Self {
            unknown,
            report,
            state,
        }
    }

    /// Directories awaiting a decision.
    pub fn unknown(&self) -> &[PathBuf] {
        &self.unknown
    }

    /// Directories of this batch already added before confirmation.
    pub fn trusted(&self) -> &[PathBuf] {
        &self.report.added
    }

    pub fn errors(&self) -> &[String] {
        &self.report.errors
    }

    pub fn state(&self) -> ConfirmationState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<ConfirmationState> {
        self.state.subscribe()
    }

    pub fn request(&self) -> ConfirmationRequest {
        ConfirmationRequest {
            folders: self.unknown.clone(),
            state: self.watch(),
        }
    }

    /// Apply `choice` and close the confirmation.
    ///
    /// Per-path failures land in the report's errors; they never abort the
    /// batch. With `AddAndRemember` the trust record is written before the
    /// directory is added, so an interrupted run leaves trust recorded and can
    /// be finished by adding again.
    ///
    /// # Panics
    ///
    /// Panics if the confirmation was already resolved.
    pub async fn resolve(
        &mut self,
        choice: TrustChoice,
        workspace: &WorkspaceContext,
        store: &TrustStore,
    ) -> CompletionReport {
        let current = self.state();
        if current != ConfirmationState::Open {
            panic!("pending confirmation resolved twice (state: {current:?}, choice: {choice})");
        }
        self.state.send_replace(ConfirmationState::Resolving(choice));
        tracing::debug!("confirmation: {} for {} folder(s)", choice, self.unknown.len());

        let outcome = match choice {
            TrustChoice::Cancel => {
                self.report.errors.push(format!(
                    "Operation cancelled. The following directories were not added:\n{}",
                    bullet_list(&self.unknown)
                ));
                ConfirmationOutcome::Cancelled
            }
            TrustChoice::Reject => {
                self.report.errors.push(format!(
                    "The following directories were not added because they were not trusted:\n{}",
                    bullet_list(&self.unknown)
                ));
                ConfirmationOutcome::Applied
            }
            TrustChoice::AddOnce | TrustChoice::AddAndRemember => {
                let remember = choice == TrustChoice::AddAndRemember;
                for dir in self.unknown.clone() {
                    if remember {
                        if let Err(e) = remember_trusted(store, &dir).await {
                            self.report
                                .errors
                                .push(format!("Error adding '{}': {}", dir.display(), e));
                            continue;
                        }
                    }
                    let result = workspace.add_directory(&dir);
                    self.report.record_add(dir, result);
                }
                ConfirmationOutcome::Applied
            }
        };

        self.state.send_replace(ConfirmationState::Closed(outcome));
        std::mem::take(&mut self.report)
    }
}

/// The store write takes a file lock, so it runs on the blocking pool.
async fn remember_trusted(store: &TrustStore, dir: &std::path::Path) -> Result<()> {
    let store = store.clone();
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || store.set(&dir, TrustLevel::TrustFolder))
        .await
        .map_err(|e| GatehouseError::Storage {
            reason: format!("trust write task failed: {}", e),
        })?
}
