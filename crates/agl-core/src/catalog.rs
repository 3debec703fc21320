//! Static selector catalogs
//!
//! Patterns are non-exclusive: several may match the same element, and every
//! match still goes through the classifier before it is hidden.

use crate::types::Aggressiveness;

// =============================================================================
// Catalog Sections
// =============================================================================

/// A named sub-catalog of structural patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogSection {
    /// Generic ad containers by class/id
    GenericAds,
    /// Ad-marker attributes
    AttributeHints,
    /// Popups, overlays and interstitials
    PopupOverlay,
    /// Ads inside third-party video players
    VideoPlayer,
    /// Push notification prompts
    PushPrompts,
    /// Native ad widgets and sponsored social embeds
    NativeWidgets,
    /// Sticky and floating ads
    Floating,
    /// High z-index wrapper heuristics
    StyleHeuristics,
    /// Ad slots of the video hosting platform
    VideoPlatform,
    /// Ad frames and scripts of the streaming mirror site
    StreamingMirror,
}

impl CatalogSection {
    pub const ALL: [CatalogSection; 10] = [
        Self::GenericAds,
        Self::AttributeHints,
        Self::PopupOverlay,
        Self::VideoPlayer,
        Self::PushPrompts,
        Self::NativeWidgets,
        Self::Floating,
        Self::StyleHeuristics,
        Self::VideoPlatform,
        Self::StreamingMirror,
    ];

    /// Sections every profile starts from.
    pub const GENERIC: [CatalogSection; 8] = [
        Self::GenericAds,
        Self::AttributeHints,
        Self::PopupOverlay,
        Self::VideoPlayer,
        Self::PushPrompts,
        Self::NativeWidgets,
        Self::Floating,
        Self::StyleHeuristics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::GenericAds => "generic-ads",
            Self::AttributeHints => "attribute-hints",
            Self::PopupOverlay => "popup-overlay",
            Self::VideoPlayer => "video-player",
            Self::PushPrompts => "push-prompts",
            Self::NativeWidgets => "native-widgets",
            Self::Floating => "floating",
            Self::StyleHeuristics => "style-heuristics",
            Self::VideoPlatform => "video-platform",
            Self::StreamingMirror => "streaming-mirror",
        }
    }

    /// Lowest aggressiveness level that includes this section.
    pub fn min_level(self) -> Aggressiveness {
        match self {
            Self::PopupOverlay | Self::PushPrompts | Self::Floating => Aggressiveness::Standard,
            Self::StyleHeuristics => Aggressiveness::Aggressive,
            _ => Aggressiveness::Conservative,
        }
    }

    pub fn selectors(self) -> &'static [&'static str] {
        match self {
            Self::GenericAds => GENERIC_ADS,
            Self::AttributeHints => ATTRIBUTE_HINTS,
            Self::PopupOverlay => POPUP_OVERLAY,
            Self::VideoPlayer => VIDEO_PLAYER,
            Self::PushPrompts => PUSH_PROMPTS,
            Self::NativeWidgets => NATIVE_WIDGETS,
            Self::Floating => FLOATING,
            Self::StyleHeuristics => STYLE_HEURISTICS,
            Self::VideoPlatform => VIDEO_PLATFORM,
            Self::StreamingMirror => STREAMING_MIRROR,
        }
    }
}

const GENERIC_ADS: &[&str] = &[
    "[class*=\"ad-\"]",
    "[class*=\"ads-\"]",
    "[class*=\"advertisement\"]",
    "[id*=\"ad-\"]",
    "[id*=\"ads-\"]",
    "[id*=\"advertisement\"]",
    "[id*=\"google_ads\"]",
    "[id*=\"googleads\"]",
    ".ad",
    ".ads",
    ".advert",
    ".advertisement",
    ".ad-container",
    ".ad-wrapper",
    ".ad-banner",
    ".ad-block",
    ".ad-unit",
    ".adsbygoogle",
    ".sponsored",
    ".sponsored-content",
    ".banner-ad",
    ".banner_ad",
    ".bannerAd",
    ".banner-ads",
    ".header-banner",
    ".footer-banner",
];

const ATTRIBUTE_HINTS: &[&str] = &[
    "[data-ad]",
    "[data-ads]",
    "[data-advertisement]",
    "[data-testid=\"placementTracking\"]",
];

const POPUP_OVERLAY: &[&str] = &[
    "[class*=\"popup\"]",
    "[class*=\"pop-up\"]",
    "[class*=\"overlay\"]",
    "[class*=\"modal\"][class*=\"ad\"]",
    "[id*=\"popup\"]",
    "[id*=\"pop-up\"]",
    "[id*=\"overlay\"]",
    ".popup-ad",
    ".popup_ad",
    ".popupAd",
    ".overlay-ad",
    ".modal-ad",
    ".interstitial",
    ".interstitial-ad",
];

const VIDEO_PLAYER: &[&str] = &[
    ".video-ads",
    ".videoAdUi",
    ".vid-ad",
    ".video-ad",
    ".player-ads",
    ".player-ad-container",
    ".vjs-ad-playing",
    ".jw-ad",
    ".jw-ad-container",
    ".flowplayer-ad",
    ".videojs-ad-playing",
];

const PUSH_PROMPTS: &[&str] = &[
    "[class*=\"push-notification\"]",
    "[class*=\"notification-prompt\"]",
    "[class*=\"subscribe-push\"]",
    ".push-prompt",
    ".notification-prompt",
    ".subscribe-bell",
];

const NATIVE_WIDGETS: &[&str] = &[
    ".fb-ad",
    ".twitter-ad",
    ".afs_ads",
    ".trc_rbox",
    ".OUTBRAIN",
    ".ob-widget",
    ".nativo-ad",
    ".native-ad",
];

const FLOATING: &[&str] = &[
    ".sticky-ad",
    ".float-ad",
    ".floating-ad",
    ".fixed-ad",
    "[style*=\"position: fixed\"][class*=\"ad\"]",
    "[style*=\"position: sticky\"][class*=\"ad\"]",
];

const STYLE_HEURISTICS: &[&str] = &[
    "div[style*=\"z-index: 9999\"]",
    "div[style*=\"z-index: 99999\"]",
];

const VIDEO_PLATFORM: &[&str] = &[
    ".ytp-ad-module",
    ".ytp-ad-player-overlay",
    ".ytp-ad-image-overlay",
    ".ytp-ad-overlay-container",
    ".ytp-ad-text-overlay",
    ".ytp-ad-skip-button-container",
    ".ytp-ad-preview-container",
    ".video-ads__container",
    ".ytd-player-legacy-desktop-watch-ads-renderer",
    ".ytd-ad-slot-renderer",
    "ytd-display-ad-renderer",
    "ytd-banner-promo-renderer",
    "ytd-statement-banner-renderer",
    "ytd-masthead-ad-v3-renderer",
    "ytd-masthead-prime-renderer",
    "ytd-primetime-promo-renderer",
    "ytd-inline-survey-renderer",
    "ytd-brand-video-shelf-renderer",
    "ytd-promoted-sparkles-web-renderer",
    "ytd-rich-item-renderer:has(ytd-display-ad-renderer)",
    "ytd-companion-slot-renderer",
    "ytd-action-companion-ad-renderer",
    "ytd-promoted-video-renderer",
    "ytd-ad-slot-renderer",
    "ytd-rich-section-renderer:has(ytd-statement-banner-renderer)",
    "ytd-search-pyv-renderer",
    "ytd-promoted-sparkles-text-search-renderer",
    "ytd-reel-video-renderer:has([is-ads])",
    "ytd-ad-preview-renderer",
];

const STREAMING_MIRROR: &[&str] = &[
    "[src*=\"hoptreeperrie\"]",
    "[src*=\"ddacn\"]",
    "[src*=\"ahcdn\"]",
    "[src*=\"jscdn\"]",
    "[src*=\"/gd/\"]",
    "[src*=\"apu.php\"]",
    "iframe[src*=\"hoptreeperrie\"]",
    "iframe[src*=\"ddacn\"]",
    "iframe[src*=\"ahcdn\"]",
    "iframe[src*=\"jscdn\"]",
    "iframe[src*=\"/gd/\"]",
    ".ad-overlay",
    "#ad-container",
];

// =============================================================================
// Auxiliary Pattern Sets
// =============================================================================

/// Full-screen overlay candidates for the overlay remover.
pub const OVERLAY_PATTERNS: &[&str] = &[
    "[class*=\"overlay\"]",
    "[class*=\"modal-backdrop\"]",
    "[class*=\"modal-bg\"]",
    "[class*=\"popup-bg\"]",
    "[class*=\"lightbox\"]",
    ".fancybox-overlay",
    "[style*=\"position: fixed\"][style*=\"z-index\"][style*=\"background\"]",
];

/// Ad containers hidden once they are empty.
pub const AD_CONTAINER_PATTERNS: &[&str] = &[
    ".ad-container",
    ".ad-wrapper",
    ".ads-wrapper",
    ".advertisement-container",
    "[class*=\"ad-slot\"]",
    "[class*=\"ad-space\"]",
];

/// Elements whose inline click handler opens popups.
pub const POPUP_HANDLER_PATTERNS: &[&str] = &[
    "[onclick*=\"window.open\"]",
    "[onclick*=\"popup\"]",
    "[onclick*=\"pop\"]",
];

/// Class/id words of added nodes that warrant a fast overlay sweep.
pub const OVERLAY_KEYWORDS: &[&str] = &["overlay", "modal", "popup"];

// =============================================================================
// Selector Catalog
// =============================================================================

/// Ordered, immutable list of patterns a sweep walks through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorCatalog {
    sections: Vec<CatalogSection>,
}

impl SelectorCatalog {
    /// Catalog of `sections` restricted to those enabled at `level`.
    pub fn build(sections: &[CatalogSection], level: Aggressiveness) -> Self {
        let mut included = Vec::with_capacity(sections.len());
        for &section in sections {
            if section.min_level() <= level && !included.contains(&section) {
                included.push(section);
            }
        }
        Self { sections: included }
    }

    pub fn sections(&self) -> &[CatalogSection] {
        &self.sections
    }

    /// Every pattern, in catalog order.
    pub fn patterns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sections.iter().flat_map(|section| section.selectors().iter().copied())
    }

    pub fn len(&self) -> usize {
        self.sections.iter().map(|section| section.selectors().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::check_selector;

    #[test]
    fn test_build_respects_levels() {
        let conservative = SelectorCatalog::build(&CatalogSection::GENERIC, Aggressiveness::Conservative);
        assert!(conservative.sections().contains(&CatalogSection::GenericAds));
        assert!(!conservative.sections().contains(&CatalogSection::PopupOverlay));
        assert!(!conservative.sections().contains(&CatalogSection::StyleHeuristics));
        // Ad-container substrings are part of the base level.
        assert!(conservative.patterns().any(|pattern| pattern == "[class*=\"ad-\"]"));
        assert!(!conservative.patterns().any(|pattern| pattern == "[class*=\"overlay\"]"));

        let standard = SelectorCatalog::build(&CatalogSection::GENERIC, Aggressiveness::Standard);
        assert!(standard.sections().contains(&CatalogSection::PopupOverlay));
        assert!(!standard.sections().contains(&CatalogSection::StyleHeuristics));

        let aggressive = SelectorCatalog::build(&CatalogSection::GENERIC, Aggressiveness::Aggressive);
        assert_eq!(aggressive.sections(), &CatalogSection::GENERIC);
        assert!(aggressive.len() > standard.len());
    }

    #[test]
    fn test_every_pattern_parses() {
        let auxiliary = OVERLAY_PATTERNS
            .iter()
            .chain(AD_CONTAINER_PATTERNS)
            .chain(POPUP_HANDLER_PATTERNS);
        let patterns = CatalogSection::ALL
            .iter()
            .flat_map(|section| section.selectors())
            .chain(auxiliary);
        for pattern in patterns {
            assert!(check_selector(pattern).is_ok(), "pattern failed to parse: {pattern}");
        }
    }

    #[test]
    fn test_build_keeps_order_and_dedupes() {
        let catalog = SelectorCatalog::build(
            &[CatalogSection::VideoPlatform, CatalogSection::GenericAds, CatalogSection::VideoPlatform],
            Aggressiveness::Standard,
        );
        assert_eq!(catalog.sections(), &[CatalogSection::VideoPlatform, CatalogSection::GenericAds]);
        assert_eq!(catalog.patterns().next(), Some(".ytp-ad-module"));
    }
}
