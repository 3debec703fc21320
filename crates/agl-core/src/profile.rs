//! Per-site profiles
//!
//! One filtering pipeline, parameterized by the profile selected for the
//! page's hostname: which catalog sections to sweep, which containers are
//! exempt, how aggressive to be, and which guard behaviors apply.

use crate::catalog::{CatalogSection, SelectorCatalog};
use crate::types::{Aggressiveness, GuardFeatures};

/// Built-in site kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    Generic,
    /// Video hosting platform with a native player that must not break
    VideoPlatform,
    /// Streaming mirror with injected ad frames and scripts
    StreamingMirror,
}

/// Filtering parameters for one kind of site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub kind: SiteKind,
    pub name: &'static str,
    /// Domains the profile applies to (subdomains included)
    pub domains: &'static [&'static str],
    /// Extra catalog sections on top of the generic ones
    pub sections: &'static [CatalogSection],
    pub aggressiveness: Aggressiveness,
    /// Containers whose descendants the overlay remover leaves alone
    pub overlay_exemptions: &'static [&'static str],
    /// Containers whose descendants handler stripping and resource purging
    /// leave alone
    pub content_exemptions: &'static [&'static str],
    /// Source fragments of scripts and frames purged by the sanitizer
    pub resource_patterns: &'static [&'static str],
    pub guard: GuardFeatures,
}

pub const GENERIC: SiteProfile = SiteProfile {
    kind: SiteKind::Generic,
    name: "generic",
    domains: &[],
    sections: &[],
    aggressiveness: Aggressiveness::Standard,
    overlay_exemptions: &[],
    content_exemptions: &[],
    resource_patterns: &[],
    guard: GuardFeatures::ALL,
};

pub const VIDEO_PLATFORM: SiteProfile = SiteProfile {
    kind: SiteKind::VideoPlatform,
    name: "video-platform",
    domains: &["youtube.com"],
    sections: &[CatalogSection::VideoPlatform],
    aggressiveness: Aggressiveness::Standard,
    overlay_exemptions: &[".html5-video-player"],
    content_exemptions: &[],
    resource_patterns: &[],
    guard: GuardFeatures::WINDOW_OPEN
        .union(GuardFeatures::SYNTHETIC_CLICK)
        .union(GuardFeatures::INLINE_HANDLERS),
};

pub const STREAMING_MIRROR: SiteProfile = SiteProfile {
    kind: SiteKind::StreamingMirror,
    name: "streaming-mirror",
    domains: &["movies2watch.tv"],
    sections: &[CatalogSection::StreamingMirror],
    aggressiveness: Aggressiveness::Aggressive,
    overlay_exemptions: &[],
    content_exemptions: &[".video-player", ".main-video", ".player-container", ".content", ".main-content"],
    resource_patterns: &["hoptreeperrie.shop", "ddacn.biz", "ahcdn.com", "jscdn.pw"],
    guard: GuardFeatures::ALL,
};

/// Site-specific profiles, checked in order before falling back to
/// [`GENERIC`].
pub const SITE_PROFILES: &[&SiteProfile] = &[&VIDEO_PLATFORM, &STREAMING_MIRROR];

impl SiteProfile {
    /// Profile for `hostname`.
    pub fn for_hostname(hostname: &str) -> &'static SiteProfile {
        let host = hostname.trim_end_matches('.').to_ascii_lowercase();
        SITE_PROFILES
            .iter()
            .copied()
            .find(|profile| profile.domains.iter().any(|domain| host_matches(&host, domain)))
            .unwrap_or(&GENERIC)
    }

    /// Catalog for this profile, at `level` or the profile's own level.
    pub fn catalog(&self, level: Option<Aggressiveness>) -> SelectorCatalog {
        let mut sections: Vec<CatalogSection> = self.sections.to_vec();
        sections.extend_from_slice(&CatalogSection::GENERIC);
        SelectorCatalog::build(&sections, level.unwrap_or(self.aggressiveness))
    }

    /// Selector list matching any overlay-exempt container, if any.
    pub fn overlay_exemption_selector(&self) -> Option<String> {
        join_selectors(self.overlay_exemptions)
    }

    /// Selector list matching any content-exempt container, if any.
    pub fn content_exemption_selector(&self) -> Option<String> {
        join_selectors(self.content_exemptions)
    }
}

/// `host` is `domain` or one of its subdomains.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

fn join_selectors(selectors: &[&str]) -> Option<String> {
    if selectors.is_empty() {
        None
    } else {
        Some(selectors.join(", "))
    }
}
