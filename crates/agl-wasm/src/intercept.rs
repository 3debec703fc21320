//! Interception layer between page-initiated side effects and the popup
//! guard.
//!
//! Runs in the page's main world so the `window.open` replacement is the one
//! page scripts see. Everything installed here lives as long as the page.

use std::rc::Rc;

use agl_core::error::DomError;
use agl_core::guard::{ClickVerdict, OpenVerdict, PageInterceptor, PopupGuard, UnloadVerdict};
use js_sys::{Function, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{BeforeUnloadEvent, Event};

use crate::dom::js_error;

pub struct WebInterceptor {
    window: web_sys::Window,
}

impl WebInterceptor {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }

    fn hook_window_open(&self, guard: Rc<PopupGuard>) -> Result<(), DomError> {
        let original: Function = Reflect::get(&self.window, &"open".into())
            .map_err(js_error)?
            .dyn_into()
            .map_err(|_| DomError::Host("window.open is not a function".to_string()))?;
        let window = self.window.clone();

        let hook = Closure::<dyn Fn(JsValue, JsValue, JsValue) -> JsValue>::new(
            move |url: JsValue, target: JsValue, features: JsValue| {
                match guard.on_window_open(url.as_string().as_deref()) {
                    OpenVerdict::Block => JsValue::NULL,
                    OpenVerdict::Forward => original
                        .call3(&window, &url, &target, &features)
                        .unwrap_or(JsValue::NULL),
                }
            },
        );
        Reflect::set(&self.window, &"open".into(), hook.as_ref()).map_err(js_error)?;
        hook.forget();
        Ok(())
    }

    fn listen(&self, event: &str, handler: impl Fn(Event) + 'static) -> Result<(), DomError> {
        let closure = Closure::<dyn Fn(Event)>::new(handler);
        self.window
            .add_event_listener_with_callback_and_bool(event, closure.as_ref().unchecked_ref(), true)
            .map_err(js_error)?;
        closure.forget();
        Ok(())
    }
}

impl PageInterceptor for WebInterceptor {
    fn install(&self, guard: Rc<PopupGuard>) -> Result<(), DomError> {
        self.hook_window_open(Rc::clone(&guard))?;

        let pointer_guard = Rc::clone(&guard);
        self.listen("mousedown", move |event| {
            if event.is_trusted() {
                pointer_guard.on_pointer_down(js_sys::Date::now());
            }
        })?;

        let click_guard = Rc::clone(&guard);
        self.listen("click", move |event| {
            if click_guard.on_click(js_sys::Date::now()) == ClickVerdict::Suppress {
                event.prevent_default();
                event.stop_propagation();
            }
        })?;

        // Capture listener on the target fires before the page's own; stopping
        // here keeps later listeners from setting the prompt again.
        // `preventDefault` is what requests the prompt, so it is not called.
        self.listen("beforeunload", move |event| {
            if guard.on_before_unload() == UnloadVerdict::ClearPrompt {
                event.stop_immediate_propagation();
                if let Some(event) = event.dyn_ref::<BeforeUnloadEvent>() {
                    event.set_return_value("");
                }
            }
        })
    }
}
