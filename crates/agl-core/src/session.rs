//! Page session
//!
//! Everything the engine knows about one page load lives in a [`PageSession`]:
//! the selected site profile, the components built from it, the debounce
//! schedule, and the hidden-element count. The host drives it through a small
//! set of entry points:
//!
//! - [`PageSession::install_guard`] as early as possible;
//! - [`PageSession::on_policy`] with the result of each authority round trip;
//! - [`PageSession::on_mutations`] for every observed mutation batch;
//! - [`PageSession::on_timer`] when a scheduled timer fires;
//! - [`PageSession::on_window_load`] on the window `load` event;
//! - [`PageSession::handle_message`] for runtime messages.
//!
//! Entry points never return DOM or timer errors: failures are logged and the
//! session carries on.

use std::rc::Rc;

use log::{debug, info, warn};

use crate::classifier::Classifier;
use crate::config::{EngineConfig, GuardGating};
use crate::dom::Document;
use crate::error::AuthorityError;
use crate::guard::{PageInterceptor, PopupGuard};
use crate::observer::{ChangeObserver, MutationBatch};
use crate::overlay::OverlayRemover;
use crate::policy::{PolicyCheck, PolicyDecision, PolicyGate, SitePolicyState, SkipReason};
use crate::profile::SiteProfile;
use crate::protocol::{HiddenCountReply, PageMessage};
use crate::sanitizer::Sanitizer;
use crate::scheduler::Scheduler;
use crate::sweep::Sweeper;
use crate::types::{TimerId, TimerKind};

/// Lifecycle of a page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first policy answer
    Pending,
    /// Filtering the page
    Active,
    /// Policy said no; nothing runs until the page reloads
    Inactive(SkipReason),
}

/// What the host must do after a timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    Done,
    /// Ask the authority, then call [`PageSession::on_policy`] with `check`
    NeedsPolicy(PolicyCheck),
}

/// What the host must do with a runtime message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Reply(HiddenCountReply),
    /// The page has been reloaded; the session is over
    Reloaded,
}

pub struct PageSession<D: Document, S: Scheduler> {
    doc: D,
    scheduler: S,
    config: EngineConfig,
    profile: &'static SiteProfile,
    sweeper: Sweeper,
    overlays: OverlayRemover,
    sanitizer: Sanitizer,
    guard: Rc<PopupGuard>,
    observer: ChangeObserver,
    gate: PolicyGate,
    phase: Phase,
    hidden_count: usize,
    sanitizer_timer: Option<TimerId>,
    post_load_timer: Option<TimerId>,
}

impl<D: Document, S: Scheduler> PageSession<D, S> {
    pub fn new(doc: D, scheduler: S, config: EngineConfig) -> Self {
        let hostname = doc.hostname();
        let profile = SiteProfile::for_hostname(&hostname);
        let catalog = profile.catalog(config.aggressiveness);
        debug!(
            "Session for {hostname}: profile {}, {} patterns in {} sections",
            profile.name,
            catalog.len(),
            catalog.sections().len()
        );

        Self {
            sweeper: Sweeper::new(catalog, Classifier::new(config.min_ad_size_px), config.slow_sweep_ms),
            overlays: OverlayRemover::new(profile, config.overlay_coverage),
            sanitizer: Sanitizer::new(profile),
            guard: Rc::new(PopupGuard::new(profile.guard, config.synthetic_click_window_ms)),
            observer: ChangeObserver::new(config.sweep_debounce_ms, config.overlay_debounce_ms),
            gate: PolicyGate::new(config.authority_failure),
            phase: Phase::Pending,
            hidden_count: 0,
            sanitizer_timer: None,
            post_load_timer: None,
            doc,
            scheduler,
            config,
            profile,
        }
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn profile(&self) -> &'static SiteProfile {
        self.profile
    }

    pub fn guard(&self) -> &Rc<PopupGuard> {
        &self.guard
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Elements hidden by sweeps during this session.
    pub fn hidden_count(&self) -> usize {
        self.hidden_count
    }

    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Install the popup guard's interception layer. Only the first call
    /// installs anything.
    pub fn install_guard<I: PageInterceptor + ?Sized>(&self, interceptor: &I) {
        match self.guard.install_with(interceptor) {
            Ok(true) => {
                debug!("Popup guard installed");
                if self.config.guard_gating == GuardGating::Always {
                    self.guard.arm();
                }
            }
            Ok(false) => {}
            Err(err) => warn!("Failed to install popup guard: {err}"),
        }
    }

    /// Apply the answer to a policy query made for `check`.
    pub fn on_policy(&mut self, check: PolicyCheck, result: Result<SitePolicyState, AuthorityError>) {
        let decision = self.gate.decide(check, result);
        match check {
            PolicyCheck::PageReady => self.on_page_ready_policy(decision),
            PolicyCheck::Tick => {
                if self.is_active() && decision.is_active() {
                    self.sanitizer.run(&self.doc, &self.overlays, &self.guard);
                }
            }
            PolicyCheck::PostLoad => {
                if decision.is_active() && !matches!(self.phase, Phase::Inactive(_)) {
                    self.post_load_pass();
                }
            }
        }
    }

    /// Debounce the sweeps a mutation batch calls for.
    pub fn on_mutations(&mut self, batch: &MutationBatch<D::Element>) {
        if !self.is_active() {
            return;
        }
        if let Err(err) = self.observer.on_mutations(batch, &self.scheduler) {
            warn!("Failed to schedule sweep: {err}");
        }
    }

    pub fn on_timer(&mut self, kind: TimerKind) -> TimerOutcome {
        match kind {
            TimerKind::AdSweep => {
                if self.observer.on_fired(kind) && self.is_active() {
                    self.run_sweep();
                }
                TimerOutcome::Done
            }
            TimerKind::OverlaySweep => {
                if self.observer.on_fired(kind) && self.is_active() {
                    self.overlays.remove_overlays(&self.doc);
                }
                TimerOutcome::Done
            }
            TimerKind::SanitizerTick => {
                self.sanitizer_timer = None;
                if !self.is_active() {
                    return TimerOutcome::Done;
                }
                self.schedule_sanitizer();
                TimerOutcome::NeedsPolicy(PolicyCheck::Tick)
            }
            TimerKind::PostLoad => {
                if self.post_load_timer.take().is_none() {
                    return TimerOutcome::Done;
                }
                TimerOutcome::NeedsPolicy(PolicyCheck::PostLoad)
            }
        }
    }

    /// Schedule the delayed post-load pass. Only the first load counts.
    pub fn on_window_load(&mut self) {
        if self.post_load_timer.is_some() || matches!(self.phase, Phase::Inactive(_)) {
            return;
        }
        match self.scheduler.schedule(TimerKind::PostLoad, self.config.post_load_delay_ms) {
            Ok(id) => self.post_load_timer = Some(id),
            Err(err) => warn!("Failed to schedule post-load pass: {err}"),
        }
    }

    pub fn handle_message(&mut self, message: &PageMessage) -> PageAction {
        match message {
            PageMessage::GetHiddenCount => PageAction::Reply(HiddenCountReply {
                hidden_count: u32::try_from(self.hidden_count).unwrap_or(u32::MAX),
            }),
            PageMessage::ExtensionToggled { .. } | PageMessage::WhitelistChanged { .. } => {
                info!("Policy changed ({message:?}), reloading page");
                self.doc.reload();
                PageAction::Reloaded
            }
        }
    }

    // =========================================================================
    // Passes
    // =========================================================================

    fn on_page_ready_policy(&mut self, decision: PolicyDecision) {
        if self.phase != Phase::Pending {
            debug!("Ignoring repeated page-ready policy answer");
            return;
        }
        match decision {
            PolicyDecision::Activate => self.activate(),
            PolicyDecision::Skip(reason) => self.phase = Phase::Inactive(reason),
        }
    }

    fn activate(&mut self) {
        self.phase = Phase::Active;
        self.run_sweep();
        self.guard.arm();
        self.guard.strip_popup_handlers(&self.doc, self.sanitizer.content_exemption());
        self.overlays.remove_overlays(&self.doc);
        self.schedule_sanitizer();
    }

    fn post_load_pass(&mut self) {
        self.run_sweep();
        self.overlays.remove_overlays(&self.doc);
        self.guard.arm();
        self.guard.strip_popup_handlers(&self.doc, self.sanitizer.content_exemption());
    }

    fn run_sweep(&mut self) {
        let report = self.sweeper.run(&self.doc, &self.scheduler);
        self.hidden_count += report.hidden;
    }

    fn schedule_sanitizer(&mut self) {
        if self.sanitizer_timer.is_some() {
            return;
        }
        match self.scheduler.schedule(TimerKind::SanitizerTick, self.config.sanitizer_interval_ms) {
            Ok(id) => self.sanitizer_timer = Some(id),
            Err(err) => warn!("Failed to schedule sanitizer: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::MemoryAuthority;
    use crate::dom::memory::{MemoryDocument, MemoryElement, MemoryWindow};
    use crate::dom::Element;
    use crate::protocol::{AuthorityReply, AuthorityRequest};
    use crate::scheduler::ManualScheduler;

    type Session = PageSession<MemoryDocument, ManualScheduler>;

    fn ad_page(host: &str) -> MemoryDocument {
        let doc = MemoryDocument::new(host);
        let body = doc.body_element();
        for class in ["ad-banner", "sponsored"] {
            let el = doc.create("div");
            el.set_attr("class", class);
            el.set_size(300.0, 250.0);
            body.append(&el);
        }
        let story = doc.create("article");
        story.set_attr("class", "thread-view");
        story.set_size(800.0, 1200.0);
        body.append(&story);
        doc
    }

    fn session(doc: &MemoryDocument) -> (Session, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let session = PageSession::new(doc.clone(), scheduler.clone(), EngineConfig::default());
        (session, scheduler)
    }

    fn policy(authority: &mut MemoryAuthority, tab: u32) -> Result<SitePolicyState, AuthorityError> {
        match authority.handle(&AuthorityRequest::GetState, Some(tab)) {
            Ok(handled) => match handled.reply {
                AuthorityReply::State(state) => Ok(state.into()),
                other => Err(AuthorityError::MalformedReply(format!("{other:?}"))),
            },
            Err(err) => Err(AuthorityError::Rejected(err.to_string())),
        }
    }

    /// Advance the clock, answering policy queries from `authority`.
    fn advance(session: &mut Session, scheduler: &ManualScheduler, authority: &mut MemoryAuthority, ms: f64) {
        scheduler.advance(ms, |kind| {
            if let TimerOutcome::NeedsPolicy(check) = session.on_timer(kind) {
                session.on_policy(check, policy(authority, 1));
            }
        });
    }

    fn added(doc: &MemoryDocument, class: &str) -> MemoryElement {
        let el = doc.create("div");
        el.set_attr("class", class);
        el.set_size(300.0, 250.0);
        doc.body_element().append(&el);
        el
    }

    #[test]
    fn test_active_site_hides_ads() {
        let doc = ad_page("example.com");
        let (mut session, _) = session(&doc);
        let mut authority = MemoryAuthority::new();
        authority.open_tab(1, "example.com");

        session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.hidden_count(), 2);
        assert_eq!(
            session.handle_message(&PageMessage::GetHiddenCount),
            PageAction::Reply(HiddenCountReply { hidden_count: 2 })
        );
    }

    #[test]
    fn test_allow_listed_site_untouched() {
        let doc = ad_page("www.youtube.com");
        let (mut session, scheduler) = session(&doc);
        let window = MemoryWindow::new();
        session.install_guard(&window);
        let mut authority = MemoryAuthority::with_default_allow_list();
        authority.open_tab(1, "www.youtube.com");

        session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));
        assert_eq!(session.phase(), Phase::Inactive(SkipReason::AllowListed));
        assert_eq!(session.hidden_count(), 0);
        assert_eq!(doc.query_count(), 0);

        // No observer, no sanitizer.
        session.on_mutations(&MutationBatch::elements(vec![added(&doc, "ad-banner")]));
        assert_eq!(scheduler.pending(TimerKind::AdSweep), 0);
        assert_eq!(scheduler.pending(TimerKind::SanitizerTick), 0);
        assert!(window.open("https://popup.example"));
    }

    #[test]
    fn test_disabled_extension_skips_everything() {
        let doc = ad_page("example.com");
        let (mut session, _) = session(&doc);
        let mut authority = MemoryAuthority::new();
        authority.open_tab(1, "example.com");
        authority.handle(&AuthorityRequest::ToggleExtension, None).unwrap();

        session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));
        assert_eq!(session.phase(), Phase::Inactive(SkipReason::Disabled));
        assert_eq!(session.hidden_count(), 0);
    }

    #[test]
    fn test_unreachable_authority_fails_open() {
        let doc = ad_page("example.com");
        let (mut session, _) = session(&doc);
        session.on_policy(
            PolicyCheck::PageReady,
            Err(AuthorityError::Unreachable("receiving end does not exist".to_string())),
        );
        assert!(session.is_active());
        assert_eq!(session.hidden_count(), 2);
    }

    #[test]
    fn test_whitelist_change_reloads() {
        let doc = ad_page("example.com");
        let (mut session, _) = session(&doc);
        let mut authority = MemoryAuthority::new();
        authority.open_tab(1, "example.com");
        session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));

        let request = AuthorityRequest::ToggleSite {
            hostname: Some("example.com".to_string()),
        };
        let handled = authority.handle(&request, None).unwrap();
        assert_eq!(handled.notifications.len(), 1);
        let action = session.handle_message(&handled.notifications[0].message);
        assert_eq!(action, PageAction::Reloaded);
        assert_eq!(doc.reload_count(), 1);
    }

    #[test]
    fn test_window_open_blocked_after_activation() {
        let doc = ad_page("example.com");
        let (mut session, _) = session(&doc);
        let window = MemoryWindow::new();
        session.install_guard(&window);
        session.install_guard(&window);
        assert_eq!(window.install_count(), 1);

        session.on_policy(PolicyCheck::PageReady, Ok(SitePolicyState::active(None)));
        assert!(!window.open("https://popunder.example"));
        assert!(window.opened().is_empty());
        assert_eq!(session.guard().blocked_popups(), 1);
    }

    #[test]
    fn test_guard_gating_always_blocks_before_policy() {
        let doc = ad_page("example.com");
        let config = EngineConfig {
            guard_gating: GuardGating::Always,
            ..EngineConfig::default()
        };
        let session = PageSession::new(doc, ManualScheduler::new(), config);
        let window = MemoryWindow::new();
        session.install_guard(&window);
        assert!(!window.open("https://popunder.example"));
    }

    #[test]
    fn test_mutation_batches_coalesce_into_one_sweep() {
        let doc = ad_page("example.com");
        let (mut session, scheduler) = session(&doc);
        let mut authority = MemoryAuthority::new();
        authority.open_tab(1, "example.com");
        session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));
        let queries_after_activation = doc.query_count();

        for _ in 0..4 {
            session.on_mutations(&MutationBatch::elements(vec![added(&doc, "ad-banner")]));
            advance(&mut session, &scheduler, &mut authority, 100.0);
        }
        // Nothing swept yet: every batch restarted the debounce.
        assert_eq!(doc.query_count(), queries_after_activation);
        assert_eq!(session.hidden_count(), 2);

        advance(&mut session, &scheduler, &mut authority, 250.0);
        assert_eq!(session.hidden_count(), 6);
        let sweep_queries = session.sweeper.catalog().len();
        assert_eq!(doc.query_count(), queries_after_activation + sweep_queries);
    }

    #[test]
    fn test_overlay_addition_removed_quickly() {
        let doc = ad_page("example.com");
        let (mut session, scheduler) = session(&doc);
        let mut authority = MemoryAuthority::new();
        session.on_policy(PolicyCheck::PageReady, Ok(SitePolicyState::active(None)));

        let modal = doc.create("div");
        modal.set_attr("class", "newsletter-overlay");
        modal.set_size(1280.0, 720.0);
        doc.body_element().append(&modal);
        session.on_mutations(&MutationBatch::elements(vec![modal.clone()]));

        advance(&mut session, &scheduler, &mut authority, 100.0);
        assert_eq!(modal.style_property("display"), "none");
        assert_eq!(doc.body_element().style_property("overflow"), "auto");
    }

    #[test]
    fn test_sanitizer_ticks_and_requeries_policy() {
        let doc = ad_page("example.com");
        let (mut session, scheduler) = session(&doc);
        let mut authority = MemoryAuthority::new();
        authority.open_tab(1, "example.com");
        session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));

        let container = doc.create("div");
        container.set_attr("class", "ad-container");
        doc.body_element().append(&container);

        let mut checks = Vec::new();
        scheduler.advance(4_500.0, |kind| {
            if let TimerOutcome::NeedsPolicy(check) = session.on_timer(kind) {
                checks.push(check);
                session.on_policy(check, policy(&mut authority, 1));
            }
        });
        assert_eq!(checks, vec![PolicyCheck::Tick, PolicyCheck::Tick]);
        assert_eq!(container.style_property("display"), "none");
        assert_eq!(scheduler.pending(TimerKind::SanitizerTick), 1);
    }

    #[test]
    fn test_sanitizer_skips_ticks_once_policy_turns_inactive() {
        let toggles = [
            AuthorityRequest::ToggleExtension,
            AuthorityRequest::ToggleSite {
                hostname: Some("example.com".to_string()),
            },
        ];
        for toggle in toggles {
            let doc = ad_page("example.com");
            let (mut session, scheduler) = session(&doc);
            let mut authority = MemoryAuthority::new();
            authority.open_tab(1, "example.com");
            session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));
            assert!(session.is_active());

            authority.handle(&toggle, None).unwrap();
            let container = doc.create("div");
            container.set_attr("class", "ad-container");
            doc.body_element().append(&container);

            advance(&mut session, &scheduler, &mut authority, 4_500.0);
            assert_eq!(container.style_property("display"), "", "{toggle:?}");
        }
    }

    #[test]
    fn test_post_load_pass() {
        let doc = ad_page("example.com");
        let (mut session, scheduler) = session(&doc);
        let mut authority = MemoryAuthority::new();
        authority.open_tab(1, "example.com");
        session.on_policy(PolicyCheck::PageReady, policy(&mut authority, 1));

        added(&doc, "ad-strip");
        session.on_window_load();
        session.on_window_load();
        assert_eq!(scheduler.pending(TimerKind::PostLoad), 1);

        advance(&mut session, &scheduler, &mut authority, 1_000.0);
        assert_eq!(session.hidden_count(), 3);
        assert_eq!(scheduler.pending(TimerKind::PostLoad), 0);
    }

    #[test]
    fn test_policy_answer_after_reload_is_ignored() {
        let doc = ad_page("example.com");
        let (mut session, _) = session(&doc);
        session.on_policy(PolicyCheck::PageReady, Ok(SitePolicyState::active(None)));
        let hidden = session.hidden_count();
        session.on_policy(PolicyCheck::PageReady, Ok(SitePolicyState::active(None)));
        assert_eq!(session.hidden_count(), hidden);
        assert!(session.guard().is_armed());
    }
}
