pub mod channel;
pub mod command;
pub mod decision;
pub mod server;
pub mod socket;

pub use channel::{HookChannel, HookDiagnostic, HookFailureKind};
pub use command::CommandHook;
pub use decision::HookDecision;
pub use server::{HookCall, HookServer};
pub use socket::SocketHook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GatehouseError, Result};

/// Upper bound on one hook message, in either direction.
pub const MAX_MESSAGE_BYTES: u64 = 1_048_576;

/// The lifecycle points a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEventName {
    /// Before a user request reaches the model.
    BeforeAgent,
    /// After the model produced a response.
    AfterAgent,
}

impl std::fmt::Display for HookEventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEventName::BeforeAgent => write!(f, "before-agent"),
            HookEventName::AfterAgent => write!(f, "after-agent"),
        }
    }
}

impl std::str::FromStr for HookEventName {
    type Err = GatehouseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "before-agent" | "beforeagent" => Ok(HookEventName::BeforeAgent),
            "after-agent" | "afteragent" => Ok(HookEventName::AfterAgent),
            _ => Err(GatehouseError::InvalidHookEvent {
                value: s.to_string(),
            }),
        }
    }
}

/// Event payload. Opaque to the channel and the coordinator; only hook
/// implementations decode it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookPayload(String);

impl HookPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encode a structured value as the payload.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_string(value)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// What the coordinator sends as the payload of `before-agent` and
/// `after-agent`. `response` is only present after the model answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTurnPayload {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Request sent to a hook process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRequest {
    pub event: HookEventName,
    pub payload: HookPayload,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl HookRequest {
    pub fn new(event: HookEventName, payload: HookPayload, correlation_id: &str) -> Self {
        Self {
            event,
            payload,
            correlation_id: correlation_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// A hook's raw verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookVerdict {
    #[serde(alias = "allow", alias = "approve")]
    Continue,
    #[serde(alias = "deny", alias = "stop")]
    Block,
}

/// Response returned by a hook process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    pub decision: HookVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl HookResponse {
    pub fn proceed() -> Self {
        Self {
            decision: HookVerdict::Continue,
            reason: None,
            additional_context: None,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            decision: HookVerdict::Block,
            reason: Some(reason.into()),
            additional_context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }
}

/// The message-passing boundary to one external hook.
#[async_trait]
pub trait HookTransport: Send + Sync {
    /// Deliver the request and wait for the hook's answer. Deadlines are
    /// enforced by the caller.
    async fn dispatch(&self, request: &HookRequest) -> Result<HookResponse>;

    /// Short description for diagnostics.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(
            "before-agent".parse::<HookEventName>().unwrap(),
            HookEventName::BeforeAgent
        );
        assert_eq!(
            "AfterAgent".parse::<HookEventName>().unwrap(),
            HookEventName::AfterAgent
        );
        assert!("on-tool".parse::<HookEventName>().is_err());
        assert_eq!(
            serde_json::to_string(&HookEventName::AfterAgent).unwrap(),
            "\"after-agent\""
        );
    }

    #[test]
    fn test_request_wire_shape() {
        let req = HookRequest::new(
            HookEventName::BeforeAgent,
            HookPayload::text("hello"),
            "turn-1",
        );
        let value: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["event"], "before-agent");
        assert_eq!(value["payload"], "hello");
        assert_eq!(value["correlationId"], "turn-1");
    }

    #[test]
    fn test_verdict_aliases() {
        let r: HookResponse = serde_json::from_str(r#"{"decision":"deny","reason":"no"}"#).unwrap();
        assert_eq!(r.decision, HookVerdict::Block);
        let r: HookResponse = serde_json::from_str(r#"{"decision":"allow"}"#).unwrap();
        assert_eq!(r.decision, HookVerdict::Continue);
        let r: HookResponse =
            serde_json::from_str(r#"{"decision":"continue","additionalContext":"ctx"}"#).unwrap();
        assert_eq!(r.additional_context.as_deref(), Some("ctx"));
        assert!(serde_json::from_str::<HookResponse>(r#"{"decision":"maybe"}"#).is_err());
    }
}
