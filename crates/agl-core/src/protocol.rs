//! Runtime message protocol
//!
//! JSON messages exchanged between the page, the authority, and the settings
//! panel. TypeScript declarations for the extension scripts are exported with
//! `ts-rs` when the tests run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::ProtocolError;

// =============================================================================
// Authority Requests & Replies
// =============================================================================

/// Request to the policy authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "camelCase")]
#[ts(export)]
pub enum AuthorityRequest {
    /// State of the sender's tab
    GetState,
    GetStats,
    ToggleExtension,
    ToggleSite {
        #[serde(default)]
        hostname: Option<String>,
    },
}

impl AuthorityRequest {
    pub const ACTIONS: &'static [&'static str] = &["getState", "getStats", "toggleExtension", "toggleSite"];

    pub fn action(&self) -> &'static str {
        match self {
            Self::GetState => "getState",
            Self::GetStats => "getStats",
            Self::ToggleExtension => "toggleExtension",
            Self::ToggleSite { .. } => "toggleSite",
        }
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        check_action(&value, Self::ACTIONS)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StateReply {
    pub enabled: bool,
    pub hostname: Option<String>,
    #[serde(alias = "isWhitelisted")]
    pub is_allow_listed: bool,
    #[serde(default)]
    pub tab_blocked_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatsReply {
    pub blocked_total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ToggleExtensionReply {
    /// New value
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ToggleSiteReply {
    /// New value
    #[serde(alias = "isWhitelisted")]
    pub is_allow_listed: bool,
}

/// Rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorReply {
    pub error: String,
}

impl From<&ProtocolError> for ErrorReply {
    fn from(err: &ProtocolError) -> Self {
        Self { error: err.to_string() }
    }
}

/// Any reply of the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum AuthorityReply {
    State(StateReply),
    Stats(StatsReply),
    ToggleExtension(ToggleExtensionReply),
    ToggleSite(ToggleSiteReply),
    Error(ErrorReply),
}

// =============================================================================
// Page Messages
// =============================================================================

/// Message delivered to the page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "camelCase")]
#[ts(export)]
pub enum PageMessage {
    GetHiddenCount,
    ExtensionToggled {
        #[serde(default)]
        enabled: bool,
    },
    WhitelistChanged {
        #[serde(default, rename = "isAllowListed", alias = "isWhitelisted")]
        is_allow_listed: bool,
    },
}

impl PageMessage {
    pub const ACTIONS: &'static [&'static str] = &["getHiddenCount", "extensionToggled", "whitelistChanged"];

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        check_action(&value, Self::ACTIONS)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Does this push notification end the page session?
    pub fn requires_reload(&self) -> bool {
        matches!(self, Self::ExtensionToggled { .. } | Self::WhitelistChanged { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HiddenCountReply {
    pub hidden_count: u32,
}

fn check_action(value: &Value, known: &[&str]) -> Result<(), ProtocolError> {
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField { action: "<none>", field: "action" })?;
    if known.contains(&action) {
        Ok(())
    } else {
        Err(ProtocolError::UnknownAction(action.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_requests() {
        assert_eq!(AuthorityRequest::parse(r#"{"action":"getState"}"#).unwrap(), AuthorityRequest::GetState);
        assert_eq!(
            AuthorityRequest::parse(r#"{"action":"toggleSite","hostname":"example.com"}"#).unwrap(),
            AuthorityRequest::ToggleSite {
                hostname: Some("example.com".to_string())
            }
        );
        assert_eq!(
            AuthorityRequest::parse(r#"{"action":"toggleSite"}"#).unwrap(),
            AuthorityRequest::ToggleSite { hostname: None }
        );
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert!(matches!(
            AuthorityRequest::parse(r#"{"action":"deleteEverything"}"#),
            Err(ProtocolError::UnknownAction(action)) if action == "deleteEverything"
        ));
        assert!(matches!(
            AuthorityRequest::parse(r#"{"hostname":"x"}"#),
            Err(ProtocolError::MissingField { field: "action", .. })
        ));
        assert!(matches!(AuthorityRequest::parse("not json"), Err(ProtocolError::Malformed(_))));
        assert!(matches!(
            PageMessage::parse(r#"{"action":"getState"}"#),
            Err(ProtocolError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_wire_names() {
        let reply = AuthorityReply::State(StateReply {
            enabled: true,
            hostname: Some("example.com".to_string()),
            is_allow_listed: false,
            tab_blocked_count: 4,
        });
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"enabled": true, "hostname": "example.com", "isAllowListed": false, "tabBlockedCount": 4})
        );
        assert_eq!(
            serde_json::to_value(HiddenCountReply { hidden_count: 7 }).unwrap(),
            json!({"hiddenCount": 7})
        );
        assert_eq!(
            serde_json::to_value(PageMessage::WhitelistChanged { is_allow_listed: true }).unwrap(),
            json!({"action": "whitelistChanged", "isAllowListed": true})
        );
    }

    #[test]
    fn test_legacy_whitelist_field_accepted() {
        let reply: StateReply =
            serde_json::from_str(r#"{"enabled":true,"hostname":null,"isWhitelisted":true}"#).unwrap();
        assert!(reply.is_allow_listed);
        assert_eq!(reply.tab_blocked_count, 0);

        let push = PageMessage::parse(r#"{"action":"whitelistChanged","isWhitelisted":true}"#).unwrap();
        assert_eq!(push, PageMessage::WhitelistChanged { is_allow_listed: true });
        assert!(push.requires_reload());
        assert!(!PageMessage::GetHiddenCount.requires_reload());
    }
}
