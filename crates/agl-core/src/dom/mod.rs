//! DOM host abstraction
//!
//! The engine never talks to a browser directly. A host (the `web-sys`
//! bindings in the wasm crate, or [`memory::MemoryDocument`] in tests and the
//! CLI) implements [`Document`] and [`Element`], and every component works
//! against these traits.
//!
//! Mutating methods take `&self`: DOM handles are shared references into a
//! tree owned by the host, like `web_sys::Element`.

pub mod memory;

use crate::error::DomError;
use crate::types::{Rect, StylePriority, Viewport};

/// A handle to one element of the live document.
pub trait Element: Clone {
    /// Upper-case tag name (`DIV`, `IFRAME`, `YTD-AD-SLOT-RENDERER`).
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), DomError>;

    fn remove_attribute(&self, name: &str) -> Result<(), DomError>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn id(&self) -> String {
        self.attribute("id").unwrap_or_default()
    }

    /// Raw `class` attribute text.
    fn class_name(&self) -> String {
        self.attribute("class").unwrap_or_default()
    }

    /// Source URL of a frame or script. Hosts that resolve URLs (the `src`
    /// property of a real iframe) override this.
    fn source_url(&self) -> String {
        self.attribute("src").unwrap_or_default()
    }

    fn bounding_rect(&self) -> Rect;

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, selector: &str) -> Result<Option<Self>, DomError>;

    fn children(&self) -> Vec<Self>;

    /// Inline style value of `property`, empty if unset.
    fn style_property(&self, property: &str) -> String;

    fn set_style_property(
        &self,
        property: &str,
        value: &str,
        priority: StylePriority,
    ) -> Result<(), DomError>;

    /// Detach the element from its parent.
    fn remove(&self);
}

/// The document of one page context.
pub trait Document {
    type Element: Element;

    /// All elements matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, DomError>;

    fn viewport(&self) -> Viewport;

    fn body(&self) -> Option<Self::Element>;

    /// The root (`<html>`) element.
    fn root(&self) -> Option<Self::Element>;

    /// Current page hostname.
    fn hostname(&self) -> String;

    /// Reload the page. Ends the current session.
    fn reload(&self);
}

/// `class + " " + id`, lower-cased. Shared by the classifier and the change
/// observer.
pub fn class_and_id<E: Element>(element: &E) -> String {
    let mut text = element.class_name();
    text.push(' ');
    text.push_str(&element.id());
    text.make_ascii_lowercase();
    text
}

/// Is the inline style of `element` hiding it?
pub fn is_inline_hidden<E: Element>(element: &E) -> bool {
    element.style_property("display") == "none" || element.style_property("visibility") == "hidden"
}
