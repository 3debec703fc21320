//! Site policy gate
//!
//! Turns the authority's answer (or its absence) into a go/no-go for one
//! guarded action. Answers are never cached: every check carries the result of
//! its own round trip.

use log::{info, warn};

use crate::config::FailMode;
use crate::error::AuthorityError;
use crate::protocol::StateReply;

/// Enablement and allow-list status of the current page, as reported by the
/// authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePolicyState {
    pub enabled: bool,
    pub hostname: Option<String>,
    pub is_allow_listed: bool,
}

impl SitePolicyState {
    pub fn active(hostname: Option<String>) -> Self {
        Self {
            enabled: true,
            hostname,
            is_allow_listed: false,
        }
    }
}

impl From<StateReply> for SitePolicyState {
    fn from(reply: StateReply) -> Self {
        Self {
            enabled: reply.enabled,
            hostname: reply.hostname,
            is_allow_listed: reply.is_allow_listed,
        }
    }
}

/// The guarded action a policy check is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCheck {
    /// Initial activation once the document is ready
    PageReady,
    /// Top of a periodic sanitizer tick
    Tick,
    /// The one-shot pass after window load
    PostLoad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    AllowListed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Activate,
    Skip(SkipReason),
}

impl PolicyDecision {
    pub fn is_active(self) -> bool {
        self == Self::Activate
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyGate {
    fail_mode: FailMode,
}

impl PolicyGate {
    pub fn new(fail_mode: FailMode) -> Self {
        Self { fail_mode }
    }

    pub fn decide(
        &self,
        check: PolicyCheck,
        result: Result<SitePolicyState, AuthorityError>,
    ) -> PolicyDecision {
        let state = match result {
            Ok(state) => state,
            Err(err) => {
                warn!("Policy check ({check:?}) failed, failing {:?}: {err}", self.fail_mode);
                match self.fail_mode {
                    FailMode::Open => return PolicyDecision::Activate,
                    FailMode::Closed => return PolicyDecision::Skip(SkipReason::Disabled),
                }
            }
        };

        let decision = if !state.enabled {
            PolicyDecision::Skip(SkipReason::Disabled)
        } else if state.is_allow_listed {
            PolicyDecision::Skip(SkipReason::AllowListed)
        } else {
            PolicyDecision::Activate
        };

        if check == PolicyCheck::PageReady {
            match decision {
                PolicyDecision::Skip(SkipReason::Disabled) => {
                    info!("Extension is disabled, skipping ad blocking")
                }
                PolicyDecision::Skip(SkipReason::AllowListed) => {
                    info!("Site is allow-listed, skipping ad blocking")
                }
                PolicyDecision::Activate => info!(
                    "Ad blocking active on {}",
                    state.hostname.as_deref().unwrap_or("<unknown host>")
                ),
            }
        }
        decision
    }
}
