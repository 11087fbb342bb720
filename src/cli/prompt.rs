use std::io::BufRead;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::confirm::{ConfirmationPrompt, ConfirmationRequest, ConfirmationState, TrustChoice};

/// Asks on the terminal: folders and options on stderr, answer from stdin.
/// End of input counts as cancel.
///
/// Stdin is read on a plain thread started at the first question. A read
/// blocked there never holds up runtime shutdown, so an interrupt that drops
/// the question lets the process exit without waiting for Enter.
#[derive(Default)]
pub struct TerminalPrompt {
    lines: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfirmationPrompt for TerminalPrompt {
    async fn confirm(&self, request: ConfirmationRequest) -> TrustChoice {
        show_applying(&request);

        eprintln!("Do you trust the following folders being added to this workspace?");
        for folder in &request.folders {
            eprintln!("- {}", folder.display());
        }
        eprintln!(
            "Trusting a folder allows the assistant to read and perform auto-edits in it \
             when in auto-approval mode."
        );

        let mut lines = self.lines.lock().await;
        let lines = lines.get_or_insert_with(spawn_stdin_reader);
        loop {
            eprint!("[y]es / yes and [r]emember / [n]o / [c]ancel: ");
            let Some(line) = lines.recv().await else {
                return TrustChoice::Cancel;
            };
            match line.parse::<TrustChoice>() {
                Ok(choice) => return choice,
                Err(e) => eprintln!("{}", e),
            }
        }
    }
}

/// Forward stdin lines until end of input, a read error, or the receiver
/// going away. The sender drops with the thread, which closes the channel.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("gatehouse-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            loop {
                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("prompt: stdin read failed: {}", e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("prompt: cannot start stdin reader: {}", e);
    }
    rx
}

/// Answers every confirmation with the same choice (`--choice`).
pub struct FixedChoice(pub TrustChoice);

#[async_trait]
impl ConfirmationPrompt for FixedChoice {
    async fn confirm(&self, request: ConfirmationRequest) -> TrustChoice {
        show_applying(&request);
        eprintln!(
            "gatehouse: answering '{}' for {} folder(s)",
            self.0,
            request.folders.len()
        );
        self.0
    }
}

/// Print the transitional state once the choice is being applied. The task
/// ends when the confirmation is dropped.
fn show_applying(request: &ConfirmationRequest) {
    let mut state = request.state.clone();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow();
            if let ConfirmationState::Resolving(choice) = current {
                if choice != TrustChoice::Cancel {
                    eprintln!("Applying trust settings...");
                }
            }
        }
    });
}
