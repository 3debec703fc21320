//! Popup and navigation guard
//!
//! The guard itself is a set of decisions. The host routes page events into
//! it through a [`PageInterceptor`], installed once per page load, and applies
//! the verdicts.

use std::cell::Cell;
use std::rc::Rc;

use log::{debug, info};

use crate::catalog::POPUP_HANDLER_PATTERNS;
use crate::dom::{Document, Element};
use crate::error::DomError;
use crate::types::{GuardFeatures, StylePriority};

/// What to do with a window-open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenVerdict {
    /// Return a null handle without opening anything
    Block,
    /// Call through to the original window-open
    Forward,
}

/// What to do with a click event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickVerdict {
    Allow,
    /// Prevent the default action and stop propagation
    Suppress,
}

/// What to do with a before-unload event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadVerdict {
    Allow,
    /// Clear the return value so no confirmation prompt is shown
    ClearPrompt,
}

/// Interception layer between page-initiated side effects and the guard.
///
/// An implementation must, exactly once per page load and before page
/// scripts get a chance to run:
/// - replace window-open with a hook that asks [`PopupGuard::on_window_open`]
///   and returns null on [`OpenVerdict::Block`] or forwards the call;
/// - report every trusted pointer-down to [`PopupGuard::on_pointer_down`];
/// - ask [`PopupGuard::on_click`] for every click, in the capture phase;
/// - ask [`PopupGuard::on_before_unload`] for every before-unload event.
///
/// Nothing else on the page is touched.
pub trait PageInterceptor {
    fn install(&self, guard: Rc<PopupGuard>) -> Result<(), DomError>;
}

/// Decisions of the popup/navigation guard for one page session.
#[derive(Debug)]
pub struct PopupGuard {
    features: GuardFeatures,
    click_window_ms: f64,
    armed: Cell<bool>,
    installed: Cell<bool>,
    last_pointer_down: Cell<Option<f64>>,
    blocked_popups: Cell<usize>,
    suppressed_clicks: Cell<usize>,
}

impl PopupGuard {
    pub fn new(features: GuardFeatures, click_window_ms: f64) -> Self {
        Self {
            features,
            click_window_ms,
            armed: Cell::new(false),
            installed: Cell::new(false),
            last_pointer_down: Cell::new(None),
            blocked_popups: Cell::new(0),
            suppressed_clicks: Cell::new(0),
        }
    }

    pub fn features(&self) -> GuardFeatures {
        self.features
    }

    /// Start blocking. Until armed every verdict is permissive.
    pub fn arm(&self) {
        if !self.armed.replace(true) {
            debug!("Popup guard armed ({:?})", self.features);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    /// Install through `interceptor` unless already installed.
    pub fn install_with<I: PageInterceptor + ?Sized>(
        self: &Rc<Self>,
        interceptor: &I,
    ) -> Result<bool, DomError> {
        if self.installed.get() {
            return Ok(false);
        }
        interceptor.install(Rc::clone(self))?;
        self.installed.set(true);
        Ok(true)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.get()
    }

    fn active(&self, feature: GuardFeatures) -> bool {
        self.armed.get() && self.features.contains(feature)
    }

    pub fn on_window_open(&self, url: Option<&str>) -> OpenVerdict {
        if !self.active(GuardFeatures::WINDOW_OPEN) {
            return OpenVerdict::Forward;
        }
        self.blocked_popups.set(self.blocked_popups.get() + 1);
        info!("Blocked popup: {}", url.unwrap_or("<no url>"));
        OpenVerdict::Block
    }

    pub fn on_pointer_down(&self, now_ms: f64) {
        self.last_pointer_down.set(Some(now_ms));
    }

    /// A click with no pointer-down inside the window is treated as
    /// synthesized.
    pub fn on_click(&self, now_ms: f64) -> ClickVerdict {
        if !self.active(GuardFeatures::SYNTHETIC_CLICK) {
            return ClickVerdict::Allow;
        }
        match self.last_pointer_down.get() {
            Some(last) if now_ms - last <= self.click_window_ms => ClickVerdict::Allow,
            Some(last) => {
                debug!("Suppressed synthetic click ({:.0}ms after pointer-down)", now_ms - last);
                self.suppress_click()
            }
            None => {
                debug!("Suppressed synthetic click (no pointer-down)");
                self.suppress_click()
            }
        }
    }

    fn suppress_click(&self) -> ClickVerdict {
        self.suppressed_clicks.set(self.suppressed_clicks.get() + 1);
        ClickVerdict::Suppress
    }

    pub fn on_before_unload(&self) -> UnloadVerdict {
        if self.active(GuardFeatures::BEFORE_UNLOAD) {
            UnloadVerdict::ClearPrompt
        } else {
            UnloadVerdict::Allow
        }
    }

    pub fn blocked_popups(&self) -> usize {
        self.blocked_popups.get()
    }

    pub fn suppressed_clicks(&self) -> usize {
        self.suppressed_clicks.get()
    }

    /// Remove popup-opening inline click handlers outside `exemption`
    /// containers. Returns the number of elements changed.
    pub fn strip_popup_handlers<D: Document>(&self, doc: &D, exemption: Option<&str>) -> usize {
        if !self.active(GuardFeatures::INLINE_HANDLERS) {
            return 0;
        }
        let mut stripped = 0usize;
        for pattern in POPUP_HANDLER_PATTERNS {
            let elements = match doc.query_all(pattern) {
                Ok(elements) => elements,
                Err(err) => {
                    debug!("Skipping handler selector {pattern}: {err}");
                    continue;
                }
            };
            for element in elements {
                if is_inside(&element, exemption) {
                    continue;
                }
                match strip_handler(&element) {
                    Ok(()) => stripped += 1,
                    Err(err) => debug!("Failed to strip click handler: {err}"),
                }
            }
        }
        if stripped > 0 {
            debug!("Removed {stripped} suspicious click handlers");
        }
        stripped
    }
}

fn strip_handler<E: Element>(element: &E) -> Result<(), DomError> {
    element.remove_attribute("onclick")?;
    element.set_style_property("cursor", "default", StylePriority::Normal)
}

/// Is `element` inside a container matching `exemption`? Errors count as
/// inside.
pub(crate) fn is_inside<E: Element>(element: &E, exemption: Option<&str>) -> bool {
    match exemption {
        Some(selector) => element.closest(selector).map_or(true, |found| found.is_some()),
        None => false,
    }
}
