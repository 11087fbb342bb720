use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::{HookSpec, HooksConfig};
use crate::error::GatehouseError;
use crate::hooks::{
    CommandHook, HookDecision, HookEventName, HookPayload, HookRequest, HookTransport, SocketHook,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookFailureKind {
    Timeout,
    Transport,
    Protocol,
}

/// Reported whenever a registered hook could not produce a decision.
#[derive(Debug, Clone, Serialize)]
pub struct HookDiagnostic {
    pub event: HookEventName,
    pub correlation_id: String,
    pub hook: String,
    pub kind: HookFailureKind,
    pub message: String,
}

/// Dispatches lifecycle events to registered hooks and waits, within a
/// deadline, for their decision.
pub struct HookChannel {
    hooks: HashMap<HookEventName, Arc<dyn HookTransport>>,
    timeout: Duration,
    outstanding: DashMap<String, HookEventName>,
    diagnostics: Option<mpsc::UnboundedSender<HookDiagnostic>>,
}

impl HookChannel {
    pub fn new(timeout: Duration) -> Self {
        Self {
            hooks: HashMap::new(),
            timeout,
            outstanding: DashMap::new(),
            diagnostics: None,
        }
    }

    /// Build a channel from the `hooks` section of the settings.
    pub fn from_config(config: &HooksConfig) -> Self {
        let mut channel = Self::new(Duration::from_millis(config.timeout_ms));
        let specs = [
            (HookEventName::BeforeAgent, &config.before_agent),
            (HookEventName::AfterAgent, &config.after_agent),
        ];
        for (event, spec) in specs {
            if let Some(spec) = spec {
                channel.register(event, transport_for(spec));
            }
        }
        channel
    }

    /// Attach (or replace) the hook for `event`.
    pub fn register(&mut self, event: HookEventName, transport: Arc<dyn HookTransport>) {
        tracing::debug!("hooks: {} -> {}", event, transport.describe());
        self.hooks.insert(event, transport);
    }

    /// Send diagnostics for failed hook calls to `sender` as well as the log.
    pub fn with_diagnostics(mut self, sender: mpsc::UnboundedSender<HookDiagnostic>) -> Self {
        self.diagnostics = Some(sender);
        self
    }

    pub fn has_hook(&self, event: HookEventName) -> bool {
        self.hooks.contains_key(&event)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fire `event` and return the hook's normalized decision.
    ///
    /// Never fails: a missing hook, a timeout, a transport failure or a
    /// malformed response all yield [`HookDecision::not_ran`]. If the returned
    /// future is dropped the call is abandoned and any late answer discarded.
    ///
    /// # Panics
    ///
    /// Panics if a call with the same `correlation_id` is still outstanding.
    pub async fn fire(
        &self,
        event: HookEventName,
        payload: HookPayload,
        correlation_id: &str,
    ) -> HookDecision {
        let Some(transport) = self.hooks.get(&event).cloned() else {
            return HookDecision::not_ran();
        };

        let _outstanding = self.claim(correlation_id, event);
        let request = HookRequest::new(event, payload, correlation_id);
        tracing::debug!("hooks: firing {} ({})", event, correlation_id);

        let failure = match tokio::time::timeout(self.timeout, transport.dispatch(&request)).await
        {
            Ok(Ok(response)) => {
                let decision = HookDecision::from_response(response);
                tracing::debug!(
                    "hooks: {} ({}) -> blocked={}",
                    event,
                    correlation_id,
                    decision.blocked
                );
                return decision;
            }
            Ok(Err(e)) => {
                let kind = match e {
                    GatehouseError::HookProtocol { .. } | GatehouseError::Json(_) => {
                        HookFailureKind::Protocol
                    }
                    GatehouseError::HookTimeout { .. } => HookFailureKind::Timeout,
                    _ => HookFailureKind::Transport,
                };
                (kind, e.to_string())
            }
            Err(_) => (
                HookFailureKind::Timeout,
                GatehouseError::HookTimeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
                .to_string(),
            ),
        };

        self.report(HookDiagnostic {
            event,
            correlation_id: correlation_id.to_string(),
            hook: transport.describe(),
            kind: failure.0,
            message: failure.1,
        });
        HookDecision::not_ran()
    }

    fn claim(&self, correlation_id: &str, event: HookEventName) -> Outstanding<'_> {
        match self.outstanding.entry(correlation_id.to_string()) {
            Entry::Occupied(existing) => {
                let other = *existing.get();
                drop(existing);
                panic!(
                    "hook call already outstanding for correlation id '{correlation_id}' \
                     ({other} in flight, {event} requested)"
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(event);
            }
        }
        Outstanding {
            map: &self.outstanding,
            id: correlation_id.to_string(),
        }
    }

    fn report(&self, diagnostic: HookDiagnostic) {
        tracing::warn!(
            "hook {} for {} ({}) ignored: {}",
            diagnostic.hook,
            diagnostic.event,
            diagnostic.correlation_id,
            diagnostic.message
        );
        if let Some(tx) = &self.diagnostics {
            let _ = tx.send(diagnostic);
        }
    }
}

/// Releases a correlation id when the call finishes or is dropped.
struct Outstanding<'a> {
    map: &'a DashMap<String, HookEventName>,
    id: String,
}

impl Drop for Outstanding<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.id);
    }
}

fn transport_for(spec: &HookSpec) -> Arc<dyn HookTransport> {
    match spec {
        HookSpec::Command {
            command,
            args,
            env,
            working_dir,
        } => Arc::new(
            CommandHook::new(command.clone())
                .args(args.clone())
                .envs(env.clone())
                .working_dir(working_dir.clone()),
        ),
        HookSpec::Socket { path } => Arc::new(SocketHook::new(path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::hooks::HookResponse;
    use async_trait::async_trait;

    struct Fixed(HookResponse);

    #[async_trait]
    impl HookTransport for Fixed {
        async fn dispatch(&self, _request: &HookRequest) -> Result<HookResponse> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    struct Broken;

    #[async_trait]
    impl HookTransport for Broken {
        async fn dispatch(&self, _request: &HookRequest) -> Result<HookResponse> {
            Err(GatehouseError::HookProtocol {
                reason: "garbage".into(),
            })
        }

        fn describe(&self) -> String {
            "broken".into()
        }
    }

    #[tokio::test]
    async fn test_unregistered_event_is_not_ran() {
        let channel = HookChannel::new(Duration::from_secs(1));
        let d = channel
            .fire(HookEventName::BeforeAgent, HookPayload::text("x"), "c1")
            .await;
        assert_eq!(d, HookDecision::not_ran());
    }

    #[tokio::test]
    async fn test_failure_reports_diagnostic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut channel = HookChannel::new(Duration::from_secs(1)).with_diagnostics(tx);
        channel.register(HookEventName::AfterAgent, Arc::new(Broken));

        let d = channel
            .fire(HookEventName::AfterAgent, HookPayload::default(), "c2")
            .await;
        assert_eq!(d, HookDecision::not_ran());

        let diag = rx.try_recv().unwrap();
        assert_eq!(diag.kind, HookFailureKind::Protocol);
        assert_eq!(diag.correlation_id, "c2");
        assert_eq!(diag.hook, "broken");
    }

    #[tokio::test]
    async fn test_correlation_id_released_after_call() {
        let mut channel = HookChannel::new(Duration::from_secs(1));
        channel.register(
            HookEventName::BeforeAgent,
            Arc::new(Fixed(HookResponse::proceed())),
        );
        for _ in 0..3 {
            let d = channel
                .fire(HookEventName::BeforeAgent, HookPayload::default(), "same")
                .await;
            assert!(d.ran);
        }
        assert!(channel.outstanding.is_empty());
    }
}
