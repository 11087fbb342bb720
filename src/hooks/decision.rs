use serde::{Deserialize, Serialize};

use crate::hooks::{HookResponse, HookVerdict};

const NO_REASON: &str = "No reason provided";

/// Normalized outcome of firing a hook.
///
/// `ran == false` always comes with `blocked == false`: a missing, broken or
/// slow hook never blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDecision {
    pub ran: bool,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl HookDecision {
    /// No hook ran.
    pub fn not_ran() -> Self {
        Self::default()
    }

    pub fn from_response(response: HookResponse) -> Self {
        Self {
            ran: true,
            blocked: response.decision == HookVerdict::Block,
            reason: response.reason.filter(|r| !r.trim().is_empty()),
            additional_context: response
                .additional_context
                .filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.ran && self.blocked
    }

    /// The hook's reason, or a fixed placeholder when it gave none.
    pub fn effective_reason(&self) -> &str {
        self.reason.as_deref().unwrap_or(NO_REASON)
    }

    pub fn additional_context(&self) -> Option<&str> {
        self.additional_context.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ran_never_blocks() {
        let d = HookDecision::not_ran();
        assert!(!d.ran);
        assert!(!d.blocked);
        assert!(!d.is_blocking());
        assert_eq!(d.effective_reason(), "No reason provided");
    }

    #[test]
    fn test_from_block_response() {
        let d = HookDecision::from_response(HookResponse::block("policy"));
        assert!(d.is_blocking());
        assert_eq!(d.effective_reason(), "policy");
    }

    #[test]
    fn test_blank_fields_are_dropped() {
        let d = HookDecision::from_response(HookResponse {
            decision: HookVerdict::Continue,
            reason: Some("  ".into()),
            additional_context: Some(String::new()),
        });
        assert!(d.ran && !d.blocked);
        assert_eq!(d.reason, None);
        assert_eq!(d.additional_context(), None);
    }
}
