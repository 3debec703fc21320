//! Timers backed by `setTimeout`.

use std::rc::Rc;

use agl_core::error::DomError;
use agl_core::scheduler::Scheduler;
use agl_core::types::{TimerId, TimerKind};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::dom::js_error;

const KINDS: [TimerKind; 4] = [
    TimerKind::AdSweep,
    TimerKind::OverlaySweep,
    TimerKind::SanitizerTick,
    TimerKind::PostLoad,
];

/// One persistent callback per timer kind, reused by every `setTimeout`.
pub struct WebScheduler {
    window: web_sys::Window,
    callbacks: Vec<(TimerKind, Closure<dyn Fn()>)>,
}

impl WebScheduler {
    pub fn new(window: web_sys::Window, dispatch: impl Fn(TimerKind) + 'static) -> Self {
        let dispatch = Rc::new(dispatch);
        let callbacks = KINDS
            .iter()
            .map(|&kind| {
                let dispatch = Rc::clone(&dispatch);
                (kind, Closure::<dyn Fn()>::new(move || dispatch(kind)))
            })
            .collect();
        Self { window, callbacks }
    }

    fn callback(&self, kind: TimerKind) -> Result<&js_sys::Function, DomError> {
        self.callbacks
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, closure)| closure.as_ref().unchecked_ref())
            .ok_or_else(|| DomError::Host(format!("no callback for {kind:?}")))
    }
}

impl Scheduler for WebScheduler {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn schedule(&self, kind: TimerKind, delay_ms: u32) -> Result<TimerId, DomError> {
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        let handle = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(self.callback(kind)?, delay)
            .map_err(js_error)?;
        Ok(TimerId(u64::from(handle.unsigned_abs())))
    }

    fn cancel(&self, id: TimerId) {
        if let Ok(handle) = i32::try_from(id.0) {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}
