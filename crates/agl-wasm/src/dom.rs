//! `web-sys` implementation of the DOM host traits.

use agl_core::dom::{Document, Element};
use agl_core::error::DomError;
use agl_core::types::{Rect, StylePriority, Viewport};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlElement, HtmlIFrameElement};

/// Message text of a thrown JS value.
pub(crate) fn js_error(value: JsValue) -> DomError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    DomError::Host(message)
}

#[derive(Clone, Debug, PartialEq)]
pub struct WebElement(pub web_sys::Element);

impl WebElement {
    fn html(&self) -> Option<&HtmlElement> {
        self.0.dyn_ref::<HtmlElement>()
    }
}

impl Element for WebElement {
    fn tag_name(&self) -> String {
        self.0.tag_name().to_ascii_uppercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), DomError> {
        self.0.set_attribute(name, value).map_err(js_error)
    }

    fn remove_attribute(&self, name: &str) -> Result<(), DomError> {
        self.0.remove_attribute(name).map_err(js_error)
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.0.has_attribute(name)
    }

    fn id(&self) -> String {
        self.0.id()
    }

    fn class_name(&self) -> String {
        self.0.class_name()
    }

    /// Resolved `src` for frames, raw attribute otherwise.
    fn source_url(&self) -> String {
        match self.0.dyn_ref::<HtmlIFrameElement>() {
            Some(frame) => frame.src(),
            None => self.0.get_attribute("src").unwrap_or_default(),
        }
    }

    fn bounding_rect(&self) -> Rect {
        let rect = self.0.get_bounding_client_rect();
        Rect::new(rect.x(), rect.y(), rect.width(), rect.height())
    }

    fn closest(&self, selector: &str) -> Result<Option<Self>, DomError> {
        self.0.closest(selector).map(|found| found.map(WebElement)).map_err(js_error)
    }

    fn children(&self) -> Vec<Self> {
        let children = self.0.children();
        (0..children.length())
            .filter_map(|idx| children.item(idx))
            .map(WebElement)
            .collect()
    }

    fn style_property(&self, property: &str) -> String {
        self.html()
            .and_then(|el| el.style().get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn set_style_property(
        &self,
        property: &str,
        value: &str,
        priority: StylePriority,
    ) -> Result<(), DomError> {
        let Some(el) = self.html() else {
            return Err(DomError::Host(format!("<{}> has no inline style", self.0.tag_name())));
        };
        el.style()
            .set_property_with_priority(property, value, priority.as_str())
            .map_err(js_error)
    }

    fn remove(&self) {
        self.0.remove();
    }
}

/// The page's document and window.
#[derive(Clone)]
pub struct WebDocument {
    window: web_sys::Window,
    document: web_sys::Document,
}

impl WebDocument {
    pub fn new(window: web_sys::Window) -> Result<Self, DomError> {
        let document = window
            .document()
            .ok_or_else(|| DomError::Host("window has no document".to_string()))?;
        Ok(Self { window, document })
    }

    pub fn window(&self) -> &web_sys::Window {
        &self.window
    }

    pub fn raw(&self) -> &web_sys::Document {
        &self.document
    }
}

impl Document for WebDocument {
    type Element = WebElement;

    fn query_all(&self, selector: &str) -> Result<Vec<WebElement>, DomError> {
        let nodes = self.document.query_selector_all(selector).map_err(js_error)?;
        Ok((0..nodes.length())
            .filter_map(|idx| nodes.item(idx))
            .filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
            .map(WebElement)
            .collect())
    }

    fn viewport(&self) -> Viewport {
        let dimension = |value: Result<JsValue, JsValue>| value.ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Viewport::new(dimension(self.window.inner_width()), dimension(self.window.inner_height()))
    }

    fn body(&self) -> Option<WebElement> {
        self.document.body().map(|body| WebElement(body.into()))
    }

    fn root(&self) -> Option<WebElement> {
        self.document.document_element().map(WebElement)
    }

    fn hostname(&self) -> String {
        self.window.location().hostname().unwrap_or_default()
    }

    fn reload(&self) {
        if let Err(err) = self.window.location().reload() {
            log::warn!("Reload failed: {}", js_error(err));
        }
    }
}
