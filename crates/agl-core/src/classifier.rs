//! Heuristic ad classifier
//!
//! Pure, read-only decision over an element's attributes, class/id text,
//! geometry, and frame source. Nothing is cached: asking twice evaluates
//! twice.

use crate::dom::{class_and_id, Element};

/// Attributes whose presence alone marks an ad slot.
pub const AD_ATTRIBUTES: &[&str] = &["data-ad", "data-ads", "data-advertisement", "data-google-query-id"];

/// Keywords searched for in the lower-cased `class + " " + id` text.
pub const AD_KEYWORDS: &[&str] = &["ad", "ads", "banner", "sponsor", "promo", "popup", "overlay", "interstitial"];

/// Words that contain an ad keyword without being ads ("thread", "header").
pub const FALSE_POSITIVES: &[&str] = &["load", "read", "thread", "spread", "bread", "head", "lead"];

/// Always an ad, even though it contains "head".
pub const FALSE_POSITIVE_OVERRIDE: &str = "header-ad";

/// Source fragments of known ad networks.
pub const AD_FRAME_SOURCES: &[&str] = &["doubleclick", "googlesyndication", "facebook.com/tr", "amazon-adsystem"];

/// Default minimum rendered width/height of an ad, in pixels.
pub const MIN_AD_SIZE_PX: f64 = 10.0;

/// Classifier with a configurable geometry gate.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    min_size: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(MIN_AD_SIZE_PX)
    }
}

impl Classifier {
    pub fn new(min_size: f64) -> Self {
        Self { min_size }
    }

    /// Is `element` likely an advertisement?
    pub fn classify<E: Element>(&self, element: &E) -> bool {
        let rect = element.bounding_rect();
        if rect.width < self.min_size || rect.height < self.min_size {
            return false;
        }

        if AD_ATTRIBUTES.iter().any(|attr| element.has_attribute(attr)) {
            return true;
        }

        if matches_keywords(&class_and_id(element)) {
            return true;
        }

        element.tag_name().eq_ignore_ascii_case("iframe") && is_ad_frame_source(&element.source_url())
    }
}

/// Classify with the default geometry gate.
pub fn classify<E: Element>(element: &E) -> bool {
    Classifier::default().classify(element)
}

/// Keyword check over lower-cased class/id text.
pub fn matches_keywords(text: &str) -> bool {
    if !AD_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        return false;
    }
    if text.contains(FALSE_POSITIVE_OVERRIDE) {
        return true;
    }
    !FALSE_POSITIVES.iter().any(|word| text.contains(word))
}

/// Empty and `about:blank` frames count as ad frames.
pub fn is_ad_frame_source(src: &str) -> bool {
    src.is_empty() || src == "about:blank" || AD_FRAME_SOURCES.iter().any(|fragment| src.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{MemoryDocument, MemoryElement};

    fn element(doc: &MemoryDocument, tag: &str, attrs: &[(&str, &str)], size: (f64, f64)) -> MemoryElement {
        let el = doc.create(tag);
        for (name, value) in attrs {
            el.set_attr(name, value);
        }
        el.set_size(size.0, size.1);
        doc.body_element().append(&el);
        el
    }

    #[test]
    fn test_small_elements_never_classified() {
        let doc = MemoryDocument::new("example.com");
        let cases = [(9.0, 300.0), (300.0, 9.0), (0.0, 0.0), (9.99, 9.99)];
        for size in cases {
            let el = element(
                &doc,
                "iframe",
                &[("data-ad", ""), ("class", "ad banner"), ("src", "https://doubleclick.net/x")],
                size,
            );
            assert!(!classify(&el), "{size:?} should be under the geometry gate");
        }

        let edge = element(&doc, "div", &[("data-ad", "")], (10.0, 10.0));
        assert!(classify(&edge));
    }

    #[test]
    fn test_ad_attributes() {
        let doc = MemoryDocument::new("example.com");
        for attr in AD_ATTRIBUTES {
            // A class that would otherwise be suppressed as a false positive.
            let el = element(&doc, "div", &[(attr, "1"), ("class", "thread")], (300.0, 250.0));
            assert!(classify(&el), "{attr} should classify as ad");
        }
    }

    #[test]
    fn test_keyword_false_positives() {
        let doc = MemoryDocument::new("example.com");
        let thread = element(&doc, "div", &[("class", "thread")], (300.0, 250.0));
        assert!(!classify(&thread));

        let header = element(&doc, "div", &[("class", "site-header")], (300.0, 250.0));
        assert!(!classify(&header));

        let header_ad = element(&doc, "div", &[("class", "header-ad")], (300.0, 250.0));
        assert!(classify(&header_ad));

        let sponsor = element(&doc, "div", &[("id", "Sponsored-Links")], (300.0, 250.0));
        assert!(classify(&sponsor));

        let plain = element(&doc, "div", &[("class", "content"), ("id", "main")], (300.0, 250.0));
        assert!(!classify(&plain));
    }

    #[test]
    fn test_iframe_sources() {
        let doc = MemoryDocument::new("example.com");
        let ad_frame = element(
            &doc,
            "iframe",
            &[("src", "https://tpc.googlesyndication.com/safeframe/1-0-40/html/container.html")],
            (728.0, 90.0),
        );
        assert!(classify(&ad_frame));

        let blank = element(&doc, "iframe", &[("src", "about:blank")], (728.0, 90.0));
        assert!(classify(&blank));

        let empty = element(&doc, "iframe", &[], (728.0, 90.0));
        assert!(classify(&empty));

        let video = element(&doc, "iframe", &[("src", "https://player.vimeo.com/video/1")], (640.0, 360.0));
        assert!(!classify(&video));

        // Only frames get the source heuristic.
        let div = element(&doc, "div", &[("src", "about:blank")], (728.0, 90.0));
        assert!(!classify(&div));
    }

    #[test]
    fn test_matches_keywords_directly() {
        assert!(matches_keywords("promo-box "));
        assert!(!matches_keywords("download-button "));
        assert!(matches_keywords("header-ad leaderboard"));
        assert!(!matches_keywords("nav "));
    }

    #[test]
    fn test_custom_geometry_gate() {
        let doc = MemoryDocument::new("example.com");
        let el = element(&doc, "div", &[("data-ad", "")], (20.0, 20.0));
        assert!(Classifier::new(10.0).classify(&el));
        assert!(!Classifier::new(50.0).classify(&el));
    }
}
