use tokio::sync::mpsc;

use crate::cli::load_settings;
use crate::error::Result;
use crate::hooks::{HookChannel, HookEventName, HookPayload};

/// Fire one event through the configured hooks and print the decision.
pub async fn run_fire(
    event: HookEventName,
    payload: Option<&str>,
    correlation_id: Option<&str>,
) -> Result<()> {
    let settings = load_settings()?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = HookChannel::from_config(&settings.hooks).with_diagnostics(tx);

    if !channel.has_hook(event) {
        eprintln!("gatehouse: no hook configured for {}", event);
    }

    let correlation_id = correlation_id
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let decision = channel
        .fire(
            event,
            HookPayload::text(payload.unwrap_or_default()),
            &correlation_id,
        )
        .await;

    while let Ok(diag) = rx.try_recv() {
        eprintln!("gatehouse: hook {} failed: {}", diag.hook, diag.message);
    }
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
