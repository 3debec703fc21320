//! Periodic sanitizer
//!
//! Low-frequency pass that catches what the change observer missed: overlays
//! that were restyled rather than added, handlers attached after the first
//! strip, ad containers emptied by the sweep, and injected ad resources.

use log::debug;

use crate::catalog::AD_CONTAINER_PATTERNS;
use crate::dom::{is_inline_hidden, Document, Element};
use crate::guard::{is_inside, PopupGuard};
use crate::overlay::OverlayRemover;
use crate::profile::SiteProfile;
use crate::types::StylePriority;

/// Tags whose `src` the resource purge inspects.
const PURGED_TAGS: &[&str] = &["script", "iframe"];

/// What one sanitizer pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub overlays: usize,
    pub handlers: usize,
    pub containers: usize,
    pub resources: usize,
}

impl SanitizeReport {
    pub fn total(&self) -> usize {
        self.overlays + self.handlers + self.containers + self.resources
    }
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    content_exemption: Option<String>,
    resource_patterns: &'static [&'static str],
}

impl Sanitizer {
    pub fn new(profile: &SiteProfile) -> Self {
        Self {
            content_exemption: profile.content_exemption_selector(),
            resource_patterns: profile.resource_patterns,
        }
    }

    pub fn content_exemption(&self) -> Option<&str> {
        self.content_exemption.as_deref()
    }

    /// One full pass.
    pub fn run<D: Document>(
        &self,
        doc: &D,
        overlays: &OverlayRemover,
        guard: &PopupGuard,
    ) -> SanitizeReport {
        let report = SanitizeReport {
            overlays: overlays.remove_overlays(doc),
            handlers: guard.strip_popup_handlers(doc, self.content_exemption()),
            containers: cleanup_empty_containers(doc),
            resources: self.purge_resources(doc),
        };
        if report.total() > 0 {
            debug!("Sanitizer pass: {report:?}");
        }
        report
    }

    /// Remove scripts and frames loaded from a known ad host.
    pub fn purge_resources<D: Document>(&self, doc: &D) -> usize {
        if self.resource_patterns.is_empty() {
            return 0;
        }
        let mut removed = 0usize;
        for tag in PURGED_TAGS {
            let elements = match doc.query_all(tag) {
                Ok(elements) => elements,
                Err(err) => {
                    debug!("Skipping resource purge of {tag}: {err}");
                    continue;
                }
            };
            for element in elements {
                let src = element.source_url();
                if src.is_empty() || !self.resource_patterns.iter().any(|p| src.contains(p)) {
                    continue;
                }
                if is_inside(&element, self.content_exemption()) {
                    continue;
                }
                debug!("Removed ad resource: {src}");
                element.remove();
                removed += 1;
            }
        }
        removed
    }
}

/// Hide ad containers that have nothing visible left in them.
pub fn cleanup_empty_containers<D: Document>(doc: &D) -> usize {
    let mut hidden = 0usize;
    for pattern in AD_CONTAINER_PATTERNS {
        let containers = match doc.query_all(pattern) {
            Ok(containers) => containers,
            Err(err) => {
                debug!("Skipping container selector {pattern}: {err}");
                continue;
            }
        };
        for container in containers {
            if container.style_property("display") == "none" {
                continue;
            }
            let children = container.children();
            if !children.iter().all(is_inline_hidden) {
                continue;
            }
            match container.set_style_property("display", "none", StylePriority::Normal) {
                Ok(()) => hidden += 1,
                Err(err) => debug!("Failed to hide empty container: {err}"),
            }
        }
    }
    hidden
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{MemoryDocument, MemoryElement};
    use crate::profile::{GENERIC, STREAMING_MIRROR};
    use crate::types::GuardFeatures;

    fn add(doc: &MemoryDocument, parent: &MemoryElement, tag: &str, attrs: &[(&str, &str)]) -> MemoryElement {
        let el = doc.create(tag);
        for (name, value) in attrs {
            el.set_attr(name, value);
        }
        parent.append(&el);
        el
    }

    #[test]
    fn test_empty_containers_hidden() {
        let doc = MemoryDocument::new("example.com");
        let body = doc.body_element();
        let empty = add(&doc, &body, "div", &[("class", "ad-container")]);
        let drained = add(&doc, &body, "div", &[("class", "sidebar-ad-slot")]);
        add(&doc, &drained, "div", &[("style", "display: none !important")]);
        add(&doc, &drained, "div", &[("style", "visibility: hidden")]);
        let live = add(&doc, &body, "div", &[("class", "ad-wrapper")]);
        add(&doc, &live, "img", &[("src", "/banner.png")]);

        assert_eq!(cleanup_empty_containers(&doc), 2);
        assert_eq!(empty.style_property("display"), "none");
        assert_eq!(drained.style_property("display"), "none");
        assert_eq!(live.style_property("display"), "");
        assert_eq!(cleanup_empty_containers(&doc), 0);
    }

    #[test]
    fn test_resource_purge_respects_content_exemptions() {
        let doc = MemoryDocument::new("movies2watch.tv");
        let body = doc.body_element();
        let injected = add(&doc, &body, "script", &[("src", "https://cdn.jscdn.pw/pop.js")]);
        let frame = add(&doc, &body, "iframe", &[("src", "https://ahcdn.com/embed")]);
        let player = add(&doc, &body, "div", &[("class", "player-container")]);
        let stream = add(&doc, &player, "iframe", &[("src", "https://ahcdn.com/stream")]);
        add(&doc, &body, "script", &[("src", "/app.js")]);

        let sanitizer = Sanitizer::new(&STREAMING_MIRROR);
        assert_eq!(sanitizer.purge_resources(&doc), 2);
        assert!(injected.parent().is_none());
        assert!(frame.parent().is_none());
        assert_eq!(stream.parent(), Some(player));
        assert_eq!(doc.query_all("script").unwrap().len(), 1);
    }

    #[test]
    fn test_generic_profile_purges_nothing() {
        let doc = MemoryDocument::new("example.com");
        add(&doc, &doc.body_element(), "script", &[("src", "https://jscdn.pw/x.js")]);
        assert_eq!(Sanitizer::new(&GENERIC).purge_resources(&doc), 0);
    }

    #[test]
    fn test_full_pass() {
        let doc = MemoryDocument::new("movies2watch.tv");
        let body = doc.body_element();
        let overlay = add(&doc, &body, "div", &[("class", "popup-bg")]);
        overlay.set_size(1280.0, 720.0);
        add(&doc, &body, "a", &[("onclick", "window.open('x')")]);
        add(&doc, &body, "div", &[("class", "ads-wrapper")]);
        add(&doc, &body, "script", &[("src", "https://ddacn.biz/a.js")]);

        let guard = PopupGuard::new(GuardFeatures::ALL, 100.0);
        guard.arm();
        let report = Sanitizer::new(&STREAMING_MIRROR).run(
            &doc,
            &OverlayRemover::new(&STREAMING_MIRROR, 0.8),
            &guard,
        );
        assert_eq!(
            report,
            SanitizeReport {
                overlays: 1,
                handlers: 1,
                containers: 1,
                resources: 1,
            }
        );
        assert_eq!(report.total(), 4);
    }
}
