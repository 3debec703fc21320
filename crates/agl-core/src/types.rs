//! Core type definitions for AdGuard Lite
//!
//! These types are shared by the DOM host traits, the filtering components,
//! and the page session.

use serde::{Deserialize, Serialize};

// =============================================================================
// Geometry
// =============================================================================

/// Rendered bounding box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Box of the given size anchored at the origin.
    pub const fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// Size of the layout viewport (`innerWidth` x `innerHeight`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Does `rect` cover at least `coverage` of both viewport dimensions?
    pub fn is_covered_by(&self, rect: &Rect, coverage: f64) -> bool {
        rect.width >= self.width * coverage && rect.height >= self.height * coverage
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

// =============================================================================
// Element Marker & Hiding Style
// =============================================================================

/// Sticky attribute set on every element the sweep has hidden.
pub const MARKER_ATTRIBUTE: &str = "data-adblock-hidden";

/// Value written to [`MARKER_ATTRIBUTE`].
pub const MARKER_VALUE: &str = "true";

/// Inline declarations applied (with `!important`) to hide an element.
pub const HIDING_STYLE: &[(&str, &str)] = &[
    ("display", "none"),
    ("visibility", "hidden"),
    ("opacity", "0"),
    ("pointer-events", "none"),
];

/// Priority of an inline style declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StylePriority {
    Normal,
    Important,
}

impl StylePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "",
            Self::Important => "important",
        }
    }
}

// =============================================================================
// Timers
// =============================================================================

/// Kinds of timers a page session schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Debounced re-sweep after added nodes
    AdSweep,
    /// Debounced overlay removal after overlay-like nodes were added
    OverlaySweep,
    /// Low-frequency periodic sanitizer tick
    SanitizerTick,
    /// One-shot pass after the window `load` event
    PostLoad,
}

/// Opaque handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

// =============================================================================
// Guard Features
// =============================================================================

bitflags::bitflags! {
    /// Behaviors of the popup/navigation guard enabled for a site.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GuardFeatures: u8 {
        /// Replace window-open with a null-returning hook
        const WINDOW_OPEN = 1 << 0;
        /// Suppress clicks that do not follow a real pointer-down
        const SYNTHETIC_CLICK = 1 << 1;
        /// Clear before-unload confirmation prompts
        const BEFORE_UNLOAD = 1 << 2;
        /// Strip inline onclick handlers that open popups
        const INLINE_HANDLERS = 1 << 3;

        const ALL = Self::WINDOW_OPEN.bits()
            | Self::SYNTHETIC_CLICK.bits()
            | Self::BEFORE_UNLOAD.bits()
            | Self::INLINE_HANDLERS.bits();
    }
}

// =============================================================================
// Aggressiveness
// =============================================================================

/// How broad a site's selector catalog is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggressiveness {
    /// Ad-container and ad-marker patterns, no overlay or style heuristics
    Conservative,
    /// Adds substring heuristics for popups, overlays and floating ads
    Standard,
    /// Adds inline-style heuristics (high z-index wrappers)
    Aggressive,
}

impl Aggressiveness {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "conservative" => Some(Self::Conservative),
            "standard" => Some(Self::Standard),
            "aggressive" => Some(Self::Aggressive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Standard => "standard",
            Self::Aggressive => "aggressive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_coverage() {
        let viewport = Viewport::new(1000.0, 800.0);
        assert!(viewport.is_covered_by(&Rect::sized(800.0, 640.0), 0.8));
        assert!(viewport.is_covered_by(&Rect::sized(1000.0, 800.0), 0.8));
        assert!(!viewport.is_covered_by(&Rect::sized(500.0, 800.0), 0.8));
        assert!(!viewport.is_covered_by(&Rect::sized(1000.0, 600.0), 0.8));
    }

    #[test]
    fn test_aggressiveness_ordering() {
        assert!(Aggressiveness::Conservative < Aggressiveness::Standard);
        assert!(Aggressiveness::Standard < Aggressiveness::Aggressive);
        assert_eq!(Aggressiveness::from_str("standard"), Some(Aggressiveness::Standard));
        assert_eq!(Aggressiveness::from_str("loud"), None);
    }
}
