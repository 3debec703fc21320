//! In-memory DOM host
//!
//! A small element tree with inline styles and fixed geometry (there is no
//! layout: every element reports the rectangle it was given), and a window
//! that routes page actions through the popup guard. Used by the unit tests,
//! the benchmarks, and the CLI simulations.
//!
//! Selectors are evaluated by `scraper` against the tree's markup, so the
//! accepted syntax matches the browser's selector engine. The parsed markup
//! is cached until the tree changes.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use scraper::{Html, Selector};

use super::{Document, Element};
use crate::error::DomError;
use crate::guard::{ClickVerdict, OpenVerdict, PageInterceptor, PopupGuard, UnloadVerdict};
use crate::types::{Rect, StylePriority, Viewport};

/// Position of an element in [`ParsedTree::nodes`], written into its markup.
const NODE_INDEX_ATTRIBUTE: &str = "data-agl-node";

/// Elements that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

// =============================================================================
// Element
// =============================================================================

/// Shared handle to a node of a [`MemoryDocument`].
#[derive(Clone)]
pub struct MemoryElement(Rc<RefCell<Node>>);

struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    style: Vec<StyleDecl>,
    rect: Rect,
    parent: Weak<RefCell<Node>>,
    children: Vec<MemoryElement>,
    tree: Rc<TreeState>,
}

#[derive(Debug, Clone)]
struct StyleDecl {
    property: String,
    value: String,
    important: bool,
}

impl MemoryElement {
    fn new(tag: &str, tree: Rc<TreeState>) -> Self {
        Self(Rc::new(RefCell::new(Node {
            tag: tag.to_ascii_uppercase(),
            attrs: Vec::new(),
            style: Vec::new(),
            rect: Rect::default(),
            parent: Weak::new(),
            children: Vec::new(),
            tree,
        })))
    }

    /// Set an attribute. `style` is parsed into inline declarations.
    pub fn set_attr(&self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let mut node = self.0.borrow_mut();
        node.tree.touch();
        if name == "style" {
            node.style = parse_style(value);
            return;
        }
        match node.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => node.attrs.push((name, value.to_string())),
        }
    }

    pub fn set_rect(&self, rect: Rect) {
        self.0.borrow_mut().rect = rect;
    }

    pub fn set_size(&self, width: f64, height: f64) {
        self.set_rect(Rect::sized(width, height));
    }

    /// Append `child`, detaching it from any previous parent.
    pub fn append(&self, child: &MemoryElement) {
        child.remove();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        let mut node = self.0.borrow_mut();
        node.tree.touch();
        node.children.push(child.clone());
    }

    pub fn parent(&self) -> Option<MemoryElement> {
        self.0.borrow().parent.upgrade().map(MemoryElement)
    }

    /// Is the element hidden by the sweep's marker?
    pub fn is_marked(&self) -> bool {
        self.has_attribute(crate::types::MARKER_ATTRIBUTE)
    }

    fn descendants_into(&self, out: &mut Vec<MemoryElement>) {
        for child in self.0.borrow().children.iter() {
            out.push(child.clone());
            child.descendants_into(out);
        }
    }

    /// Outermost ancestor, or the element itself when detached.
    fn top(&self) -> MemoryElement {
        let mut top = self.clone();
        while let Some(parent) = top.parent() {
            top = parent;
        }
        top
    }

    fn tree(&self) -> Rc<TreeState> {
        Rc::clone(&self.0.borrow().tree)
    }

    fn write_markup(&self, out: &mut String, nodes: &mut Vec<MemoryElement>) {
        let index = nodes.len();
        nodes.push(self.clone());

        let node = self.0.borrow();
        let tag = node.tag.to_ascii_lowercase();
        out.push('<');
        out.push_str(&tag);
        write_attr(out, NODE_INDEX_ATTRIBUTE, &index.to_string());
        for (name, value) in &node.attrs {
            write_attr(out, name, value);
        }
        if !node.style.is_empty() {
            write_attr(out, "style", &serialize_style(&node.style));
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }
        for child in &node.children {
            child.write_markup(out, nodes);
        }
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }
}

fn write_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
    out.push('"');
}

impl PartialEq for MemoryElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for MemoryElement {}

impl std::fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = self.0.borrow();
        write!(f, "<{}", node.tag.to_ascii_lowercase())?;
        for (name, value) in &node.attrs {
            write!(f, " {name}=\"{value}\"")?;
        }
        write!(f, ">")
    }
}

impl Element for MemoryElement {
    fn tag_name(&self) -> String {
        self.0.borrow().tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        let node = self.0.borrow();
        if name.eq_ignore_ascii_case("style") {
            return if node.style.is_empty() {
                None
            } else {
                Some(serialize_style(&node.style))
            };
        }
        node.attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), DomError> {
        self.set_attr(name, value);
        Ok(())
    }

    fn remove_attribute(&self, name: &str) -> Result<(), DomError> {
        let mut node = self.0.borrow_mut();
        node.tree.touch();
        if name.eq_ignore_ascii_case("style") {
            node.style.clear();
        } else {
            node.attrs.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        }
        Ok(())
    }

    fn bounding_rect(&self) -> Rect {
        self.0.borrow().rect
    }

    fn closest(&self, selector: &str) -> Result<Option<Self>, DomError> {
        let selector = parse(selector)?;
        let matches = self.tree().parsed(&self.top()).select(&selector);
        let mut current = Some(self.clone());
        while let Some(element) = current {
            if matches.contains(&element) {
                return Ok(Some(element));
            }
            current = element.parent();
        }
        Ok(None)
    }

    fn children(&self) -> Vec<Self> {
        self.0.borrow().children.clone()
    }

    fn style_property(&self, property: &str) -> String {
        self.0
            .borrow()
            .style
            .iter()
            .find(|decl| decl.property == property)
            .map(|decl| decl.value.clone())
            .unwrap_or_default()
    }

    fn set_style_property(
        &self,
        property: &str,
        value: &str,
        priority: StylePriority,
    ) -> Result<(), DomError> {
        let important = priority == StylePriority::Important;
        let mut node = self.0.borrow_mut();
        node.tree.touch();
        match node.style.iter_mut().find(|decl| decl.property == property) {
            Some(decl) => {
                decl.value = value.to_string();
                decl.important = important;
            }
            None => node.style.push(StyleDecl {
                property: property.to_string(),
                value: value.to_string(),
                important,
            }),
        }
        Ok(())
    }

    fn remove(&self) {
        let parent = self.0.borrow().parent.upgrade();
        if let Some(parent) = parent {
            let mut parent = parent.borrow_mut();
            parent.tree.touch();
            parent.children.retain(|child| !Rc::ptr_eq(&child.0, &self.0));
        }
        self.0.borrow_mut().parent = Weak::new();
    }
}

// =============================================================================
// Parsed Markup
// =============================================================================

/// Shared by every element of one document: a revision bumped on each
/// change, and the markup parsed at the latest revision.
#[derive(Default)]
struct TreeState {
    revision: Cell<u64>,
    parsed: RefCell<Option<Rc<ParsedTree>>>,
}

impl TreeState {
    fn touch(&self) {
        self.revision.set(self.revision.get() + 1);
    }

    fn parsed(&self, top: &MemoryElement) -> Rc<ParsedTree> {
        let revision = self.revision.get();
        if let Some(parsed) = self.parsed.borrow().as_ref() {
            if parsed.revision == revision && parsed.nodes.first() == Some(top) {
                return Rc::clone(parsed);
            }
        }
        let parsed = Rc::new(ParsedTree::build(top, revision));
        *self.parsed.borrow_mut() = Some(Rc::clone(&parsed));
        parsed
    }
}

/// The subtree under `nodes[0]`, serialized and parsed by `scraper`. Every
/// element carries its index in `nodes` under [`NODE_INDEX_ATTRIBUTE`].
struct ParsedTree {
    revision: u64,
    html: Html,
    nodes: Vec<MemoryElement>,
}

impl ParsedTree {
    fn build(top: &MemoryElement, revision: u64) -> Self {
        let mut markup = String::from("<!DOCTYPE html>");
        let mut nodes = Vec::new();
        top.write_markup(&mut markup, &mut nodes);
        let html = if top.tag_name() == "HTML" {
            Html::parse_document(&markup)
        } else {
            Html::parse_fragment(&markup)
        };
        Self { revision, html, nodes }
    }

    /// Elements matching `selector`, in document order.
    fn select(&self, selector: &Selector) -> Vec<MemoryElement> {
        self.html
            .select(selector)
            .filter_map(|found| found.value().attr(NODE_INDEX_ATTRIBUTE))
            .filter_map(|index| index.parse::<usize>().ok())
            .filter_map(|index| self.nodes.get(index).cloned())
            .collect()
    }
}

// =============================================================================
// Document
// =============================================================================

/// An in-memory page: `<html><body></body></html>` plus host state.
#[derive(Clone)]
pub struct MemoryDocument {
    inner: Rc<DocumentState>,
}

struct DocumentState {
    hostname: String,
    tree: Rc<TreeState>,
    root: MemoryElement,
    body: MemoryElement,
    viewport: Cell<Viewport>,
    reloads: Cell<usize>,
    queries: Cell<usize>,
    rejected: RefCell<HashSet<String>>,
}

impl MemoryDocument {
    pub fn new(hostname: &str) -> Self {
        let tree = Rc::new(TreeState::default());
        let root = MemoryElement::new("html", Rc::clone(&tree));
        let body = MemoryElement::new("body", Rc::clone(&tree));
        root.append(&body);
        let viewport = Viewport::default();
        root.set_size(viewport.width, viewport.height);
        body.set_size(viewport.width, viewport.height);

        Self {
            inner: Rc::new(DocumentState {
                hostname: hostname.to_string(),
                tree,
                root,
                body,
                viewport: Cell::new(viewport),
                reloads: Cell::new(0),
                queries: Cell::new(0),
                rejected: RefCell::new(HashSet::new()),
            }),
        }
    }

    /// Create a detached element.
    pub fn create(&self, tag: &str) -> MemoryElement {
        MemoryElement::new(tag, Rc::clone(&self.inner.tree))
    }

    pub fn body_element(&self) -> MemoryElement {
        self.inner.body.clone()
    }

    pub fn root_element(&self) -> MemoryElement {
        self.inner.root.clone()
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.inner.viewport.set(viewport);
    }

    /// Make `query_all` reject `selector` the way a browser rejects syntax it
    /// does not support.
    pub fn reject_selector(&self, selector: &str) {
        self.inner.rejected.borrow_mut().insert(selector.to_string());
    }

    /// Number of times [`Document::reload`] was called.
    pub fn reload_count(&self) -> usize {
        self.inner.reloads.get()
    }

    /// Number of `query_all` calls served.
    pub fn query_count(&self) -> usize {
        self.inner.queries.get()
    }

    /// Every element in document order, root first.
    pub fn all_elements(&self) -> Vec<MemoryElement> {
        let mut out = vec![self.inner.root.clone()];
        self.inner.root.descendants_into(&mut out);
        out
    }
}

impl Document for MemoryDocument {
    type Element = MemoryElement;

    fn query_all(&self, selector: &str) -> Result<Vec<MemoryElement>, DomError> {
        self.inner.queries.set(self.inner.queries.get() + 1);
        if self.inner.rejected.borrow().contains(selector) {
            return Err(DomError::RejectedSelector(selector.to_string()));
        }
        let selector = parse(selector)?;
        Ok(self.inner.tree.parsed(&self.inner.root).select(&selector))
    }

    fn viewport(&self) -> Viewport {
        self.inner.viewport.get()
    }

    fn body(&self) -> Option<MemoryElement> {
        Some(self.inner.body.clone())
    }

    fn root(&self) -> Option<MemoryElement> {
        Some(self.inner.root.clone())
    }

    fn hostname(&self) -> String {
        self.inner.hostname.clone()
    }

    fn reload(&self) {
        self.inner.reloads.set(self.inner.reloads.get() + 1);
    }
}

// =============================================================================
// Window
// =============================================================================

/// In-memory window: an interception layer for [`PopupGuard`] plus a record
/// of the windows that actually got opened.
#[derive(Clone, Default)]
pub struct MemoryWindow {
    inner: Rc<WindowState>,
}

#[derive(Default)]
struct WindowState {
    guard: RefCell<Option<Rc<PopupGuard>>>,
    installs: Cell<usize>,
    opened: RefCell<Vec<String>>,
}

impl MemoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page script calls window-open. Returns whether a window was created.
    pub fn open(&self, url: &str) -> bool {
        let verdict = match self.inner.guard.borrow().as_ref() {
            Some(guard) => guard.on_window_open(Some(url)),
            None => OpenVerdict::Forward,
        };
        if verdict == OpenVerdict::Block {
            return false;
        }
        self.inner.opened.borrow_mut().push(url.to_string());
        true
    }

    pub fn pointer_down(&self, now_ms: f64) {
        if let Some(guard) = self.inner.guard.borrow().as_ref() {
            guard.on_pointer_down(now_ms);
        }
    }

    pub fn click(&self, now_ms: f64) -> ClickVerdict {
        self.inner
            .guard
            .borrow()
            .as_ref()
            .map_or(ClickVerdict::Allow, |guard| guard.on_click(now_ms))
    }

    pub fn before_unload(&self) -> UnloadVerdict {
        self.inner
            .guard
            .borrow()
            .as_ref()
            .map_or(UnloadVerdict::Allow, |guard| guard.on_before_unload())
    }

    pub fn opened(&self) -> Vec<String> {
        self.inner.opened.borrow().clone()
    }

    pub fn install_count(&self) -> usize {
        self.inner.installs.get()
    }
}

impl PageInterceptor for MemoryWindow {
    fn install(&self, guard: Rc<PopupGuard>) -> Result<(), DomError> {
        self.inner.installs.set(self.inner.installs.get() + 1);
        *self.inner.guard.borrow_mut() = Some(guard);
        Ok(())
    }
}

// =============================================================================
// Synthetic Pages
// =============================================================================

/// Deterministic news-style page with `blocks` content sections, an ad slot in
/// every fifth section, and a tracking frame in every seventh. Used by the
/// benchmarks and the CLI.
pub fn synthetic_page(hostname: &str, blocks: usize) -> MemoryDocument {
    let doc = MemoryDocument::new(hostname);
    let body = doc.body_element();

    let header = doc.create("header");
    header.set_attr("class", "site-header");
    header.set_size(1280.0, 80.0);
    body.append(&header);

    for i in 0..blocks {
        let section = doc.create("section");
        section.set_attr("class", "story-block");
        section.set_attr("id", &format!("story-{i}"));
        section.set_size(800.0, 400.0);

        let heading = doc.create("h2");
        heading.set_attr("class", "headline");
        heading.set_size(800.0, 40.0);
        section.append(&heading);

        let text = doc.create("p");
        text.set_attr("class", "thread-body");
        text.set_size(800.0, 300.0);
        section.append(&text);

        if i % 5 == 0 {
            let slot = doc.create("div");
            slot.set_attr("class", "ad-container");
            slot.set_size(728.0, 90.0);
            let unit = doc.create("ins");
            unit.set_attr("class", "adsbygoogle");
            unit.set_attr("data-ad", &format!("slot-{i}"));
            unit.set_size(728.0, 90.0);
            slot.append(&unit);
            section.append(&slot);
        }
        if i % 7 == 0 {
            let frame = doc.create("iframe");
            frame.set_attr("src", "https://securepubads.g.doubleclick.net/tag");
            frame.set_attr("id", &format!("google_ads_iframe_{i}"));
            frame.set_size(300.0, 250.0);
            section.append(&frame);
        }
        body.append(&section);
    }
    doc
}

/// Check that `selector` parses, without running it.
pub fn check_selector(selector: &str) -> Result<(), DomError> {
    parse(selector).map(|_| ())
}

fn parse(selector: &str) -> Result<Selector, DomError> {
    Selector::parse(selector).map_err(|err| DomError::InvalidSelector {
        selector: selector.to_string(),
        reason: err.to_string(),
    })
}

fn parse_style(text: &str) -> Vec<StyleDecl> {
    text.split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let mut value = value.trim();
            let mut important = false;
            if let Some(stripped) = value.strip_suffix("!important") {
                value = stripped.trim_end();
                important = true;
            }
            if property.is_empty() {
                return None;
            }
            Some(StyleDecl {
                property,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

fn serialize_style(decls: &[StyleDecl]) -> String {
    let mut out = String::new();
    for decl in decls {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&decl.property);
        out.push_str(": ");
        out.push_str(&decl.value);
        if decl.important {
            out.push_str(" !important");
        }
        out.push(';');
    }
    out
}
