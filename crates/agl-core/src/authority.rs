//! In-process policy authority
//!
//! Owns the enabled flag, the ordered allow list, and the blocked counters,
//! and answers [`AuthorityRequest`]s. Toggles also produce the push
//! notifications the affected pages must receive.

use std::collections::HashMap;

use log::{debug, info};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::protocol::{
    AuthorityReply, AuthorityRequest, ErrorReply, PageMessage, StateReply, StatsReply,
    ToggleExtensionReply, ToggleSiteReply,
};

/// Browser tab identifier.
pub type TabId = u32;

/// Hostnames allow-listed on first run.
pub const DEFAULT_ALLOW_LIST: &[&str] = &["youtube.com", "www.youtube.com"];

/// A push notification addressed to one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub tab: TabId,
    pub message: PageMessage,
}

/// Reply to a request plus the notifications it triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    pub reply: AuthorityReply,
    pub notifications: Vec<Notification>,
}

impl Handled {
    fn reply(reply: AuthorityReply) -> Self {
        Self {
            reply,
            notifications: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryAuthority {
    enabled: bool,
    allow_list: Vec<String>,
    tabs: HashMap<TabId, String>,
    tab_counts: HashMap<TabId, u32>,
    blocked_total: u32,
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuthority {
    /// Enabled, empty allow list.
    pub fn new() -> Self {
        Self {
            enabled: true,
            allow_list: Vec::new(),
            tabs: HashMap::new(),
            tab_counts: HashMap::new(),
            blocked_total: 0,
        }
    }

    /// First-run state: enabled, with the video platform allow-listed.
    pub fn with_default_allow_list() -> Self {
        let mut authority = Self::new();
        authority.allow_list = DEFAULT_ALLOW_LIST.iter().map(|host| host.to_string()).collect();
        authority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn allow_list(&self) -> &[String] {
        &self.allow_list
    }

    pub fn is_allow_listed(&self, hostname: &str) -> bool {
        self.allow_list.iter().any(|host| host == hostname)
    }

    pub fn blocked_total(&self) -> u32 {
        self.blocked_total
    }

    /// Track a tab showing `hostname`.
    pub fn open_tab(&mut self, tab: TabId, hostname: &str) {
        self.tabs.insert(tab, hostname.to_string());
    }

    pub fn close_tab(&mut self, tab: TabId) {
        self.tabs.remove(&tab);
        self.tab_counts.remove(&tab);
    }

    /// Add `count` blocked items to a tab and to the cumulative total.
    pub fn record_blocked(&mut self, tab: TabId, count: u32) {
        let entry = self.tab_counts.entry(tab).or_insert(0);
        *entry = entry.saturating_add(count);
        self.blocked_total = self.blocked_total.saturating_add(count);
    }

    /// Answer `request`, sent from `sender` (none for the settings panel).
    pub fn handle(
        &mut self,
        request: &AuthorityRequest,
        sender: Option<TabId>,
    ) -> Result<Handled, ProtocolError> {
        debug!("Authority request {} from {sender:?}", request.action());
        match request {
            AuthorityRequest::GetState => Ok(Handled::reply(AuthorityReply::State(self.state(sender)))),
            AuthorityRequest::GetStats => Ok(Handled::reply(AuthorityReply::Stats(StatsReply {
                blocked_total: self.blocked_total,
            }))),
            AuthorityRequest::ToggleExtension => Ok(self.toggle_extension()),
            AuthorityRequest::ToggleSite { hostname } => match hostname.as_deref() {
                Some(hostname) if !hostname.is_empty() => Ok(self.toggle_site(hostname)),
                _ => Err(ProtocolError::MissingField {
                    action: "toggleSite",
                    field: "hostname",
                }),
            },
        }
    }

    /// Answer a raw JSON request. Failures become an error reply.
    pub fn handle_value(&mut self, request: Value, sender: Option<TabId>) -> (Value, Vec<Notification>) {
        let handled = AuthorityRequest::from_value(request).and_then(|request| self.handle(&request, sender));
        let (reply, notifications) = match handled {
            Ok(handled) => (handled.reply, handled.notifications),
            Err(err) => {
                debug!("Rejected authority request: {err}");
                (AuthorityReply::Error(ErrorReply::from(&err)), Vec::new())
            }
        };
        let reply = serde_json::to_value(reply).unwrap_or(Value::Null);
        (reply, notifications)
    }

    fn state(&self, sender: Option<TabId>) -> StateReply {
        let hostname = sender.and_then(|tab| self.tabs.get(&tab).cloned());
        let is_allow_listed = hostname.as_deref().is_some_and(|host| self.is_allow_listed(host));
        let tab_blocked_count = sender
            .and_then(|tab| self.tab_counts.get(&tab).copied())
            .unwrap_or(0);
        StateReply {
            enabled: self.enabled,
            hostname,
            is_allow_listed,
            tab_blocked_count,
        }
    }

    fn toggle_extension(&mut self) -> Handled {
        self.enabled = !self.enabled;
        info!("Extension {}", if self.enabled { "enabled" } else { "disabled" });

        let mut tabs: Vec<TabId> = self.tabs.keys().copied().collect();
        tabs.sort_unstable();
        let notifications = tabs
            .into_iter()
            .map(|tab| Notification {
                tab,
                message: PageMessage::ExtensionToggled { enabled: self.enabled },
            })
            .collect();

        Handled {
            reply: AuthorityReply::ToggleExtension(ToggleExtensionReply { enabled: self.enabled }),
            notifications,
        }
    }

    fn toggle_site(&mut self, hostname: &str) -> Handled {
        let is_allow_listed = match self.allow_list.iter().position(|host| host == hostname) {
            Some(idx) => {
                self.allow_list.remove(idx);
                false
            }
            None => {
                self.allow_list.push(hostname.to_string());
                true
            }
        };
        info!("{hostname} {} the allow list", if is_allow_listed { "added to" } else { "removed from" });

        let mut tabs: Vec<TabId> = self
            .tabs
            .iter()
            .filter(|(_, host)| host.as_str() == hostname)
            .map(|(tab, _)| *tab)
            .collect();
        tabs.sort_unstable();
        let notifications = tabs
            .into_iter()
            .map(|tab| Notification {
                tab,
                message: PageMessage::WhitelistChanged { is_allow_listed },
            })
            .collect();

        Handled {
            reply: AuthorityReply::ToggleSite(ToggleSiteReply { is_allow_listed }),
            notifications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_state_for_sender_tab() {
        let mut authority = MemoryAuthority::with_default_allow_list();
        authority.open_tab(1, "www.youtube.com");
        authority.open_tab(2, "example.com");
        authority.record_blocked(2, 5);

        let handled = authority.handle(&AuthorityRequest::GetState, Some(1)).unwrap();
        assert_eq!(
            handled.reply,
            AuthorityReply::State(StateReply {
                enabled: true,
                hostname: Some("www.youtube.com".to_string()),
                is_allow_listed: true,
                tab_blocked_count: 0,
            })
        );

        let AuthorityReply::State(state) = authority.handle(&AuthorityRequest::GetState, Some(2)).unwrap().reply else {
            panic!("expected a state reply");
        };
        assert!(!state.is_allow_listed);
        assert_eq!(state.tab_blocked_count, 5);

        // No sender tab: nothing to report about a site.
        let AuthorityReply::State(state) = authority.handle(&AuthorityRequest::GetState, None).unwrap().reply else {
            panic!("expected a state reply");
        };
        assert_eq!(state.hostname, None);
        assert!(!state.is_allow_listed);
    }

    #[test]
    fn test_toggle_site_notifies_matching_tabs() {
        let mut authority = MemoryAuthority::new();
        authority.open_tab(3, "example.com");
        authority.open_tab(4, "example.com");
        authority.open_tab(5, "other.org");

        let request = AuthorityRequest::ToggleSite {
            hostname: Some("example.com".to_string()),
        };
        let handled = authority.handle(&request, None).unwrap();
        assert_eq!(handled.reply, AuthorityReply::ToggleSite(ToggleSiteReply { is_allow_listed: true }));
        assert_eq!(
            handled.notifications,
            vec![
                Notification {
                    tab: 3,
                    message: PageMessage::WhitelistChanged { is_allow_listed: true }
                },
                Notification {
                    tab: 4,
                    message: PageMessage::WhitelistChanged { is_allow_listed: true }
                },
            ]
        );
        assert_eq!(authority.allow_list(), ["example.com".to_string()]);

        let handled = authority.handle(&request, None).unwrap();
        assert_eq!(handled.reply, AuthorityReply::ToggleSite(ToggleSiteReply { is_allow_listed: false }));
        assert!(authority.allow_list().is_empty());
    }

    #[test]
    fn test_toggle_extension_notifies_every_tab() {
        let mut authority = MemoryAuthority::new();
        authority.open_tab(1, "a.com");
        authority.open_tab(2, "b.com");
        let handled = authority.handle(&AuthorityRequest::ToggleExtension, None).unwrap();
        assert_eq!(handled.reply, AuthorityReply::ToggleExtension(ToggleExtensionReply { enabled: false }));
        assert_eq!(handled.notifications.len(), 2);
        assert!(!authority.is_enabled());
    }

    #[test]
    fn test_stats_accumulate() {
        let mut authority = MemoryAuthority::new();
        authority.record_blocked(1, 3);
        authority.record_blocked(2, 4);
        authority.close_tab(1);
        let handled = authority.handle(&AuthorityRequest::GetStats, None).unwrap();
        assert_eq!(handled.reply, AuthorityReply::Stats(StatsReply { blocked_total: 7 }));
    }

    #[test]
    fn test_raw_requests() {
        let mut authority = MemoryAuthority::with_default_allow_list();
        let (reply, _) = authority.handle_value(json!({"action": "frobnicate"}), None);
        assert_eq!(reply, json!({"error": "Unknown action: frobnicate"}));

        let (reply, _) = authority.handle_value(json!({"action": "toggleSite"}), None);
        assert_eq!(reply, json!({"error": "Missing field 'hostname' for action 'toggleSite'"}));

        let (reply, _) = authority.handle_value(json!({"action": "getStats"}), None);
        assert_eq!(reply, json!({"blockedTotal": 0}));
    }
}
