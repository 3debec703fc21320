//! WebAssembly bindings for AdGuard Lite
//!
//! Hosts one [`PageSession`] per page on top of `web-sys`: the live document,
//! `setTimeout` timers, a `MutationObserver`, the popup interception layer,
//! and `chrome.runtime` messaging. The extension's content script calls
//! [`start`] once, as early as possible.

mod dom;
mod intercept;
mod logger;
mod runtime;
mod timers;

use std::cell::RefCell;

use agl_core::observer::MutationBatch;
use agl_core::policy::PolicyCheck;
use agl_core::protocol::PageMessage;
use agl_core::session::{PageAction, PageSession, TimerOutcome};
use agl_core::{AuthorityError, EngineConfig, SitePolicyState, TimerKind};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MutationObserver, MutationObserverInit, MutationRecord};

pub use dom::{WebDocument, WebElement};
pub use intercept::WebInterceptor;
pub use runtime::PolicyChannel;
pub use timers::WebScheduler;

type WebSession = PageSession<WebDocument, WebScheduler>;
type MutationCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

struct Host {
    session: WebSession,
    policy: PolicyChannel,
    observer: Option<(MutationObserver, MutationCallback)>,
}

thread_local! {
    static HOST: RefCell<Option<Host>> = const { RefCell::new(None) };
}

/// Run `f` on the page host. `None` before [`start`] or on re-entry.
fn with_host<R>(f: impl FnOnce(&mut Host) -> R) -> Option<R> {
    HOST.with(|cell| match cell.try_borrow_mut() {
        Ok(mut host) => host.as_mut().map(f),
        Err(_) => {
            log::debug!("Page host busy, dropping re-entrant call");
            None
        }
    })
}

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Start filtering this page. `config` is an optional JSON engine config.
#[wasm_bindgen]
pub fn start(config: Option<String>) -> Result<(), JsValue> {
    let config = EngineConfig::from_json(config.as_deref().unwrap_or("")).map_err(js_err)?;
    logger::init(config.log_level_filter());

    if HOST.with(|cell| cell.borrow().is_some()) {
        return Err(JsValue::from_str("Already started. Reload the page to restart."));
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let doc = WebDocument::new(window.clone()).map_err(js_err)?;
    let scheduler = WebScheduler::new(window.clone(), on_timer);
    let session = PageSession::new(doc.clone(), scheduler, config);
    session.install_guard(&WebInterceptor::new(window.clone()));

    HOST.with(|cell| {
        *cell.borrow_mut() = Some(Host {
            session,
            policy: PolicyChannel::new(on_policy),
            observer: None,
        })
    });

    if let Err(err) = runtime::listen(on_message) {
        log::warn!("Runtime messaging unavailable: {err}");
    }

    let ready_state = doc.raw().ready_state();
    if ready_state == "loading" {
        let ready = Closure::once_into_js(page_ready);
        doc.raw()
            .add_event_listener_with_callback("DOMContentLoaded", ready.unchecked_ref())?;
    } else {
        page_ready();
    }

    if ready_state == "complete" {
        window_loaded();
    } else {
        let loaded = Closure::once_into_js(window_loaded);
        window.add_event_listener_with_callback("load", loaded.unchecked_ref())?;
    }

    Ok(())
}

/// Elements hidden on this page so far.
#[wasm_bindgen]
pub fn hidden_count() -> u32 {
    with_host(|host| u32::try_from(host.session.hidden_count()).unwrap_or(u32::MAX)).unwrap_or(0)
}

/// Run the ad heuristics on one element.
#[wasm_bindgen]
pub fn classify_element(element: web_sys::Element) -> bool {
    agl_core::classify(&WebElement(element))
}

// =============================================================================
// Event Dispatch
// =============================================================================

fn page_ready() {
    with_host(|host| host.policy.query(PolicyCheck::PageReady));
}

fn window_loaded() {
    with_host(|host| host.session.on_window_load());
}

fn on_timer(kind: TimerKind) {
    with_host(|host| {
        if let TimerOutcome::NeedsPolicy(check) = host.session.on_timer(kind) {
            host.policy.query(check);
        }
    });
}

fn on_policy(check: PolicyCheck, result: Result<SitePolicyState, AuthorityError>) {
    with_host(|host| {
        host.session.on_policy(check, result);
        if host.session.is_active() && host.observer.is_none() {
            match observe(host.session.document()) {
                Ok(observer) => host.observer = Some(observer),
                Err(err) => log::warn!("Failed to observe mutations: {err:?}"),
            }
        }
    });
}

fn on_message(message: PageMessage) -> Option<Value> {
    match with_host(|host| host.session.handle_message(&message))? {
        PageAction::Reply(reply) => serde_json::to_value(reply).ok(),
        PageAction::Reloaded => None,
    }
}

fn on_mutations(records: js_sys::Array) {
    let batch = mutation_batch(&records);
    with_host(|host| host.session.on_mutations(&batch));
}

fn observe(doc: &WebDocument) -> Result<(MutationObserver, MutationCallback), JsValue> {
    let body = doc.raw().body().ok_or_else(|| JsValue::from_str("No body"))?;
    let callback = MutationCallback::new(|records: js_sys::Array, _: MutationObserver| on_mutations(records));
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    observer.observe_with_options(&body, &init)?;
    Ok((observer, callback))
}

fn mutation_batch(records: &js_sys::Array) -> MutationBatch<WebElement> {
    let mut added_nodes = 0usize;
    let mut elements = Vec::new();
    for record in records.iter() {
        let Ok(record) = record.dyn_into::<MutationRecord>() else {
            continue;
        };
        let nodes = record.added_nodes();
        added_nodes += nodes.length() as usize;
        for idx in 0..nodes.length() {
            if let Some(element) = nodes.item(idx).and_then(|node| node.dyn_into::<web_sys::Element>().ok()) {
                elements.push(WebElement(element));
            }
        }
    }
    MutationBatch::new(added_nodes, elements)
}
