use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::coordinator::LifecycleCoordinator;
use crate::error::Result;
use crate::hooks::{AgentTurnPayload, HookEventName, HookPayload};

/// The request handed to the model once the before-agent hook let it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnRequest {
    pub correlation_id: String,
    pub prompt: String,
    /// Context contributed by hooks, in the order it was received.
    pub additional_context: Vec<String>,
}

impl TurnRequest {
    /// The prompt with any hook context appended as separate paragraphs.
    pub fn render(&self) -> String {
        let mut out = self.prompt.clone();
        for context in &self.additional_context {
            out.push_str("\n\n");
            out.push_str(context);
        }
        out
    }
}

/// The model API. Out of scope here; only the contract is defined.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn respond(&self, request: &TurnRequest) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The response is final.
    Completed { response: String },
    /// The before-agent hook stopped the turn; the model was never called.
    /// `reason` is shown in place of a response.
    Blocked { reason: String },
    /// The after-agent hook asked to keep the turn open.
    ContinueRequested { response: String, reason: String },
    /// The turn was interrupted; any late hook or model result was dropped.
    Interrupted,
}

impl LifecycleCoordinator {
    /// Run one turn with before-agent and after-agent hooks around the model
    /// call. Hook failures never fail the turn; model errors do.
    pub async fn run_turn(
        &self,
        prompt: &str,
        backend: &dyn ModelBackend,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let correlation_id = uuid::Uuid::new_v4().to_string();

        let before_payload = HookPayload::json(&AgentTurnPayload {
            prompt: prompt.to_string(),
            response: None,
        })?;
        let before = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TurnOutcome::Interrupted),
            d = self.hooks.fire(HookEventName::BeforeAgent, before_payload, &correlation_id) => d,
        };
        if before.is_blocking() {
            tracing::info!("turn {}: blocked by before-agent hook", correlation_id);
            return Ok(TurnOutcome::Blocked {
                reason: before.effective_reason().to_string(),
            });
        }

        let request = TurnRequest {
            correlation_id: correlation_id.clone(),
            prompt: prompt.to_string(),
            additional_context: before.additional_context.into_iter().collect(),
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TurnOutcome::Interrupted),
            r = backend.respond(&request) => r?,
        };

        let after_payload = HookPayload::json(&AgentTurnPayload {
            prompt: prompt.to_string(),
            response: Some(response.clone()),
        })?;
        let after = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TurnOutcome::Interrupted),
            d = self.hooks.fire(HookEventName::AfterAgent, after_payload, &correlation_id) => d,
        };
        if after.is_blocking() {
            tracing::info!("turn {}: after-agent hook requested continuation", correlation_id);
            return Ok(TurnOutcome::ContinueRequested {
                reason: after.effective_reason().to_string(),
                response,
            });
        }

        Ok(TurnOutcome::Completed { response })
    }
}
