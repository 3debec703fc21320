//! Extension runtime messaging (`chrome.runtime`).

use std::rc::Rc;

use agl_core::error::AuthorityError;
use agl_core::policy::PolicyCheck;
use agl_core::protocol::{AuthorityRequest, ErrorReply, PageMessage, StateReply};
use agl_core::SitePolicyState;
use js_sys::{Function, Promise, Reflect};
use serde_json::Value;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

const CHECKS: [PolicyCheck; 3] = [PolicyCheck::PageReady, PolicyCheck::Tick, PolicyCheck::PostLoad];

type PolicyHandler = Closure<dyn FnMut(JsValue)>;

fn describe(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}

fn runtime() -> Result<JsValue, String> {
    let chrome = Reflect::get(&js_sys::global(), &"chrome".into()).map_err(|e| describe(&e))?;
    if chrome.is_undefined() {
        return Err("chrome is unavailable".to_string());
    }
    let runtime = Reflect::get(&chrome, &"runtime".into()).map_err(|e| describe(&e))?;
    if runtime.is_undefined() {
        return Err("chrome.runtime is unavailable".to_string());
    }
    Ok(runtime)
}

fn method(target: &JsValue, name: &str) -> Result<Function, String> {
    Reflect::get(target, &name.into())
        .map_err(|e| describe(&e))?
        .dyn_into::<Function>()
        .map_err(|_| format!("{name} is not a function"))
}

fn to_js(value: &Value) -> JsValue {
    js_sys::JSON::parse(&value.to_string()).unwrap_or(JsValue::NULL)
}

fn from_js(value: &JsValue) -> Result<Value, String> {
    let text = js_sys::JSON::stringify(value).map_err(|e| describe(&e))?;
    serde_json::from_str(&String::from(text)).map_err(|e| e.to_string())
}

fn error_reply(error: String) -> Value {
    serde_json::to_value(ErrorReply { error }).unwrap_or(Value::Null)
}

/// Parse a `getState` reply.
pub fn parse_state(reply: &JsValue) -> Result<SitePolicyState, AuthorityError> {
    if reply.is_undefined() || reply.is_null() {
        return Err(AuthorityError::MalformedReply("empty reply".to_string()));
    }
    let value = from_js(reply).map_err(AuthorityError::MalformedReply)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(AuthorityError::Rejected(error.to_string()));
    }
    serde_json::from_value::<StateReply>(value)
        .map(SitePolicyState::from)
        .map_err(|e| AuthorityError::MalformedReply(e.to_string()))
}

fn send_message(request: &AuthorityRequest) -> Result<Promise, String> {
    let message = serde_json::to_value(request).map_err(|e| e.to_string())?;
    let runtime = runtime()?;
    method(&runtime, "sendMessage")?
        .call1(&runtime, &to_js(&message))
        .map_err(|e| describe(&e))?
        .dyn_into::<Promise>()
        .map_err(|_| "sendMessage did not return a promise".to_string())
}

/// `getState` round trips. Each policy check has its own persistent pair of
/// promise handlers, so answers are always delivered asynchronously.
pub struct PolicyChannel {
    handlers: Vec<(PolicyCheck, PolicyHandler, PolicyHandler)>,
}

impl PolicyChannel {
    pub fn new(dispatch: impl Fn(PolicyCheck, Result<SitePolicyState, AuthorityError>) + 'static) -> Self {
        let dispatch = Rc::new(dispatch);
        let handlers = CHECKS
            .iter()
            .map(|&check| {
                let on_reply = Rc::clone(&dispatch);
                let on_failure = Rc::clone(&dispatch);
                let resolve = PolicyHandler::new(move |reply: JsValue| on_reply(check, parse_state(&reply)));
                let reject = PolicyHandler::new(move |err: JsValue| {
                    on_failure(check, Err(AuthorityError::Unreachable(describe(&err))))
                });
                (check, resolve, reject)
            })
            .collect();
        Self { handlers }
    }

    pub fn query(&self, check: PolicyCheck) {
        let Some((_, resolve, reject)) = self.handlers.iter().find(|(c, _, _)| *c == check) else {
            return;
        };
        let promise = send_message(&AuthorityRequest::GetState)
            .unwrap_or_else(|err| Promise::reject(&JsValue::from_str(&err)));
        let _ = promise.then2(resolve, reject);
    }
}

/// Register `handler` for messages delivered to this page. A handler returning
/// `Some` answers the sender; unreadable messages get an error reply.
pub fn listen(handler: impl Fn(PageMessage) -> Option<Value> + 'static) -> Result<(), String> {
    let on_message = Reflect::get(&runtime()?, &"onMessage".into()).map_err(|e| describe(&e))?;
    let add_listener = method(&on_message, "addListener")?;

    let listener = Closure::<dyn Fn(JsValue, JsValue, JsValue) -> bool>::new(
        move |request: JsValue, _sender: JsValue, send_response: JsValue| {
            let reply = match from_js(&request) {
                Err(err) => Some(error_reply(format!("Malformed message: {err}"))),
                Ok(value) => match PageMessage::from_value(value) {
                    Ok(message) => handler(message),
                    Err(err) => {
                        log::debug!("Rejected page message: {err}");
                        Some(error_reply(err.to_string()))
                    }
                },
            };
            if let (Some(reply), Some(respond)) = (reply, send_response.dyn_ref::<Function>()) {
                let _ = respond.call1(&JsValue::UNDEFINED, &to_js(&reply));
            }
            false
        },
    );
    add_listener
        .call1(&on_message, listener.as_ref())
        .map_err(|e| describe(&e))?;
    listener.forget();
    Ok(())
}
