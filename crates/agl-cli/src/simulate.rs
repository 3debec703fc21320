use agl_core::authority::{MemoryAuthority, TabId};
use agl_core::config::EngineConfig;
use agl_core::dom::memory::{synthetic_page, MemoryDocument, MemoryElement, MemoryWindow};
use agl_core::dom::Document;
use agl_core::error::AuthorityError;
use agl_core::observer::MutationBatch;
use agl_core::policy::{PolicyCheck, SitePolicyState};
use agl_core::protocol::{AuthorityReply, AuthorityRequest, PageMessage};
use agl_core::scheduler::{ManualScheduler, Scheduler};
use agl_core::session::{PageAction, PageSession, TimerOutcome};
use log::debug;

const TAB: TabId = 1;

pub struct SimulateOptions {
    pub hostname: String,
    pub allow: bool,
    pub disabled: bool,
    pub blocks: usize,
    pub config: EngineConfig,
}

/// Counters read back at the end of a simulated page session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationReport {
    pub hidden: u32,
    /// Hidden by the sweep that followed the late-content mutation batch
    pub late_hidden: usize,
    pub blocked_popups: usize,
    pub suppressed_clicks: usize,
    pub windows_opened: usize,
    pub blocked_total: u32,
}

type Session = PageSession<MemoryDocument, ManualScheduler>;

pub fn run_simulation(opts: SimulateOptions) -> Result<SimulationReport, String> {
    let mut authority = MemoryAuthority::with_default_allow_list();
    authority.open_tab(TAB, &opts.hostname);
    if opts.allow && !authority.is_allow_listed(&opts.hostname) {
        request(&mut authority, AuthorityRequest::ToggleSite {
            hostname: Some(opts.hostname.clone()),
        })?;
    }
    if opts.disabled {
        request(&mut authority, AuthorityRequest::ToggleExtension)?;
    }

    println!("Page Session Simulation");
    println!("==================================================");

    let doc = synthetic_page(&opts.hostname, opts.blocks);
    let window = MemoryWindow::new();
    let scheduler = ManualScheduler::new();
    let mut session = PageSession::new(doc.clone(), scheduler.clone(), opts.config);
    println!("Host:     {} (profile {})", opts.hostname, session.profile().name);

    session.install_guard(&window);
    session.on_policy(PolicyCheck::PageReady, query_state(&mut authority));
    println!("Phase:    {:?}", session.phase());
    println!("[ready]   hidden {}", session.hidden_count());

    let before = session.hidden_count();
    let batch = inject_late_content(&doc);
    session.on_mutations(&batch);
    let sweep_wait = f64::from(session.config().sweep_debounce_ms.max(session.config().overlay_debounce_ms));
    drive(&scheduler, &mut session, &mut authority, sweep_wait);
    let late_hidden = session.hidden_count() - before;
    println!("[mutate]  {} late elements, {late_hidden} newly hidden", batch.added_elements.len());

    let opened = window.open("https://popunder.example/landing");
    let click = window.click(scheduler.now_ms());
    println!("[popup]   window opened: {opened}, synthetic click: {click:?}");

    session.on_window_load();
    let config = session.config();
    let settle = f64::from(config.post_load_delay_ms.max(config.sanitizer_interval_ms)) + 500.0;
    drive(&scheduler, &mut session, &mut authority, settle);
    println!("[load]    hidden {} after {:.0} ms", session.hidden_count(), scheduler.now_ms());

    let hidden = match session.handle_message(&PageMessage::GetHiddenCount) {
        PageAction::Reply(reply) => reply.hidden_count,
        PageAction::Reloaded => 0,
    };
    authority.record_blocked(TAB, hidden + u32::try_from(session.guard().blocked_popups()).unwrap_or(u32::MAX));
    let total = match request(&mut authority, AuthorityRequest::GetStats)? {
        AuthorityReply::Stats(stats) => stats.blocked_total,
        other => return Err(format!("Unexpected stats reply: {:?}", other)),
    };

    let report = SimulationReport {
        hidden,
        late_hidden,
        blocked_popups: session.guard().blocked_popups(),
        suppressed_clicks: session.guard().suppressed_clicks(),
        windows_opened: window.opened().len(),
        blocked_total: total,
    };

    println!();
    println!("Results");
    println!("--------------------------------------------------");
    println!("  Hidden elements:   {}", report.hidden);
    println!("  Blocked popups:    {}", report.blocked_popups);
    println!("  Suppressed clicks: {}", report.suppressed_clicks);
    println!("  Windows opened:    {}", report.windows_opened);
    println!("  Blocked total:     {}", report.blocked_total);
    Ok(report)
}

fn request(authority: &mut MemoryAuthority, request: AuthorityRequest) -> Result<AuthorityReply, String> {
    authority
        .handle(&request, None)
        .map(|handled| handled.reply)
        .map_err(|e| format!("Authority rejected {}: {}", request.action(), e))
}

fn query_state(authority: &mut MemoryAuthority) -> Result<SitePolicyState, AuthorityError> {
    let handled = authority
        .handle(&AuthorityRequest::GetState, Some(TAB))
        .map_err(|e| AuthorityError::Rejected(e.to_string()))?;
    match handled.reply {
        AuthorityReply::State(state) => Ok(state.into()),
        other => Err(AuthorityError::MalformedReply(format!("{other:?}"))),
    }
}

/// Advance the virtual clock, answering every policy check the session asks
/// for on the way.
fn drive(scheduler: &ManualScheduler, session: &mut Session, authority: &mut MemoryAuthority, ms: f64) {
    scheduler.advance(ms, |kind| {
        if let TimerOutcome::NeedsPolicy(check) = session.on_timer(kind) {
            debug!("{kind:?} timer asked for a {check:?} policy check");
            session.on_policy(check, query_state(authority));
        }
    });
}

/// Late ad slots and a full-screen overlay, the way ad scripts add them after
/// the first sweep.
fn inject_late_content(doc: &MemoryDocument) -> MutationBatch<MemoryElement> {
    let body = doc.body_element();
    let mut added = Vec::new();

    for i in 0..3 {
        let slot = doc.create("div");
        slot.set_attr("class", "ad-banner");
        slot.set_attr("id", &format!("late-slot-{i}"));
        slot.set_size(300.0, 250.0);
        body.append(&slot);
        added.push(slot);
    }

    let viewport = doc.viewport();
    let overlay = doc.create("div");
    overlay.set_attr("class", "interstitial-overlay");
    overlay.set_size(viewport.width, viewport.height);
    body.append(&overlay);
    added.push(overlay);

    MutationBatch::elements(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(hostname: &str) -> SimulateOptions {
        SimulateOptions {
            hostname: hostname.to_string(),
            allow: false,
            disabled: false,
            blocks: 10,
            config: EngineConfig::default(),
        }
    }

    #[test]
    fn test_active_site_hides_and_blocks() {
        let report = run_simulation(options("example.com")).unwrap();
        assert!(report.late_hidden >= 3);
        assert!(report.hidden as usize > report.late_hidden);
        assert_eq!(report.blocked_popups, 1);
        assert_eq!(report.suppressed_clicks, 1);
        assert_eq!(report.windows_opened, 0);
        assert_eq!(report.blocked_total, report.hidden + 1);
    }

    #[test]
    fn test_default_allow_list_leaves_video_platform_alone() {
        let report = run_simulation(options("www.youtube.com")).unwrap();
        assert_eq!(report.hidden, 0);
        assert_eq!(report.late_hidden, 0);
        assert_eq!(report.blocked_popups, 0);
        assert_eq!(report.windows_opened, 1);
        assert_eq!(report.blocked_total, 0);
    }

    #[test]
    fn test_streaming_mirror_profile() {
        let report = run_simulation(options("movies2watch.tv")).unwrap();
        assert!(report.hidden > 0);
        assert_eq!(report.windows_opened, 0);
    }

    #[test]
    fn test_toggles_disable_the_session() {
        for (allow, disabled) in [(true, false), (false, true)] {
            let mut opts = options("example.com");
            opts.allow = allow;
            opts.disabled = disabled;
            let report = run_simulation(opts).unwrap();
            assert_eq!(report.hidden, 0);
            assert_eq!(report.suppressed_clicks, 0);
            assert_eq!(report.windows_opened, 1);
        }
    }
}
