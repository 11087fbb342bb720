use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::confirm::{
    bullet_list, CompletionReport, ConfirmationPrompt, PendingConfirmation, TrustChoice,
};
use crate::coordinator::LifecycleCoordinator;
use crate::error::{GatehouseError, Result};
use crate::workspace::paths::{dedup_preserving_order, normalize, split_path_list};

/// Where a directory-add batch stands after the synchronous part.
#[derive(Debug)]
pub enum AddDirectoriesStep {
    /// Nothing needs confirmation; the report is final.
    Complete(CompletionReport),
    /// Some directories have no recorded trust. The report is final once the
    /// confirmation is resolved.
    NeedsConfirmation(PendingConfirmation),
}

impl LifecycleCoordinator {
    /// Run the synchronous part of a directory add.
    ///
    /// Each input may hold several comma-separated paths. Directories already
    /// in the workspace are reported and skipped, trusted ones are added now,
    /// untrusted ones become a single error, and unknown ones are returned
    /// as a [`PendingConfirmation`].
    pub fn begin_add_directories<S: AsRef<str>>(&self, raw: &[S]) -> Result<AddDirectoriesStep> {
        if self.restrictive_sandbox {
            return Err(GatehouseError::SandboxRestricted);
        }

        let requested: Vec<PathBuf> = raw
            .iter()
            .flat_map(|entry| split_path_list(entry.as_ref()))
            .map(|p| normalize(&p, &self.cwd, self.home.as_deref()))
            .collect();
        if requested.is_empty() {
            return Err(GatehouseError::NoPathsProvided);
        }

        let mut report = CompletionReport::default();
        let mut to_process = Vec::new();
        for path in dedup_preserving_order(requested) {
            if self.workspace.contains(&path) {
                report.already_present.push(path);
            } else {
                to_process.push(path);
            }
        }
        if to_process.is_empty() {
            return Ok(AddDirectoriesStep::Complete(report));
        }

        let classes = self.resolver.classify(
            &to_process,
            self.gating.enabled,
            self.gating.workspace_trusted,
        );
        report.warnings.extend(classes.warning);

        if !classes.untrusted.is_empty() {
            report.errors.push(format!(
                "The following directories are explicitly untrusted and cannot be added to a \
                 trusted workspace:\n{}\nPlease use the permissions command to modify their \
                 trust level.",
                bullet_list(&classes.untrusted)
            ));
        }

        for path in classes.trusted {
            let result = self.workspace.add_directory(&path);
            report.record_add(path, result);
        }

        if classes.unknown.is_empty() {
            tracing::info!(
                "directories: added {}, {} error(s)",
                report.added.len(),
                report.errors.len()
            );
            return Ok(AddDirectoriesStep::Complete(report));
        }

        tracing::debug!(
            "directories: {} folder(s) need confirmation",
            classes.unknown.len()
        );
        Ok(AddDirectoriesStep::NeedsConfirmation(PendingConfirmation::new(
            classes.unknown,
            report,
        )))
    }

    /// Apply the user's choice to a pending confirmation from this session.
    pub async fn resolve_confirmation(
        &self,
        pending: &mut PendingConfirmation,
        choice: TrustChoice,
    ) -> CompletionReport {
        let report = pending.resolve(choice, &self.workspace, &self.store).await;
        tracing::info!(
            "directories: {} -> added {}, {} error(s)",
            choice,
            report.added.len(),
            report.errors.len()
        );
        report
    }

    /// Run a whole directory add, asking `prompt` about unknown directories.
    ///
    /// If `cancel` fires while the prompt is open, the confirmation resolves
    /// as [`TrustChoice::Cancel`] and the prompt's eventual answer is dropped.
    pub async fn add_directories<S: AsRef<str>>(
        &self,
        raw: &[S],
        prompt: &dyn ConfirmationPrompt,
        cancel: &CancellationToken,
    ) -> Result<CompletionReport> {
        let mut pending = match self.begin_add_directories(raw)? {
            AddDirectoriesStep::Complete(report) => return Ok(report),
            AddDirectoriesStep::NeedsConfirmation(pending) => pending,
        };

        let choice = tokio::select! {
            biased;
            _ = cancel.cancelled() => TrustChoice::Cancel,
            choice = prompt.confirm(pending.request()) => choice,
        };

        Ok(self.resolve_confirmation(&mut pending, choice).await)
    }
}
