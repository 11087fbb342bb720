use tokio_util::sync::CancellationToken;

use crate::cli::prompt::{FixedChoice, TerminalPrompt};
use crate::cli::{current_dir, load_settings};
use crate::confirm::{CompletionReport, ConfirmationPrompt, TrustChoice};
use crate::coordinator::LifecycleCoordinator;
use crate::error::Result;

/// Add directories to the session workspace, then list it.
pub async fn run_add(
    paths: &str,
    include_directories: &[String],
    choice: Option<TrustChoice>,
    cancel: &CancellationToken,
) -> Result<()> {
    let prompt: Box<dyn ConfirmationPrompt> = match choice {
        Some(choice) => Box::new(FixedChoice(choice)),
        None => Box::new(TerminalPrompt::new()),
    };
    let coordinator = start_session(include_directories, prompt.as_ref(), cancel).await?;

    let report = coordinator
        .add_directories(&[paths], prompt.as_ref(), cancel)
        .await?;
    print_report(&report);

    print_directories(&coordinator.workspace().directories());
    Ok(())
}

/// Show the session workspace.
pub async fn run_show(include_directories: &[String], cancel: &CancellationToken) -> Result<()> {
    let prompt = TerminalPrompt::new();
    let coordinator = start_session(include_directories, &prompt, cancel).await?;
    print_directories(&coordinator.workspace().directories());
    Ok(())
}

/// Open a session at the current directory and add the startup directories
/// (settings first, then `extra`) before any sandbox restriction applies.
async fn start_session(
    extra: &[String],
    prompt: &dyn ConfirmationPrompt,
    cancel: &CancellationToken,
) -> Result<LifecycleCoordinator> {
    let settings = load_settings()?;
    let coordinator = LifecycleCoordinator::from_settings(&settings, current_dir())?;

    let mut include = settings.include_directories.clone();
    include.extend(extra.iter().cloned());
    if !include.is_empty() {
        let report = coordinator.add_directories(&include, prompt, cancel).await?;
        print_report(&report);
    }

    Ok(coordinator.with_restrictive_sandbox(settings.sandbox.restrictive))
}

fn print_report(report: &CompletionReport) {
    for warning in &report.warnings {
        eprintln!("gatehouse: warning: {}", warning);
    }
    for line in report.info_messages() {
        println!("{}", line);
    }
    if let Some(errors) = report.error_message() {
        eprintln!("{}", errors);
    }
}

fn print_directories(dirs: &[std::path::PathBuf]) {
    println!("Current workspace directories:");
    for dir in dirs {
        println!("- {}", dir.display());
    }
}
