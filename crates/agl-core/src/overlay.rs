//! Overlay remover
//!
//! Hides full-viewport overlays (paywalls, interstitials, modal backdrops) and
//! undoes the scroll lock they put on the page.

use log::{debug, info};

use crate::catalog::OVERLAY_PATTERNS;
use crate::dom::{Document, Element};
use crate::error::DomError;
use crate::profile::SiteProfile;
use crate::types::StylePriority;

/// Overlay removal for one site profile.
#[derive(Debug, Clone)]
pub struct OverlayRemover {
    coverage: f64,
    exemption: Option<String>,
}

impl OverlayRemover {
    pub fn new(profile: &SiteProfile, coverage: f64) -> Self {
        Self {
            coverage,
            exemption: profile.overlay_exemption_selector(),
        }
    }

    /// Hide every overlay covering at least the configured fraction of both
    /// viewport dimensions. Returns how many were newly hidden.
    pub fn remove_overlays<D: Document>(&self, doc: &D) -> usize {
        let viewport = doc.viewport();
        let mut removed = 0usize;

        for pattern in OVERLAY_PATTERNS {
            let candidates = match doc.query_all(pattern) {
                Ok(candidates) => candidates,
                Err(err) => {
                    debug!("Skipping overlay selector {pattern}: {err}");
                    continue;
                }
            };

            for overlay in candidates {
                if self.is_exempt(&overlay) {
                    continue;
                }
                if !viewport.is_covered_by(&overlay.bounding_rect(), self.coverage) {
                    continue;
                }
                if overlay.style_property("display") == "none" {
                    continue;
                }
                match suppress(doc, &overlay) {
                    Ok(()) => removed += 1,
                    Err(err) => debug!("Failed to remove overlay: {err}"),
                }
            }
        }

        if removed > 0 {
            info!("Removed {removed} full-screen overlays");
        }
        removed
    }

    fn is_exempt<E: Element>(&self, overlay: &E) -> bool {
        let Some(exemption) = &self.exemption else {
            return false;
        };
        match overlay.closest(exemption) {
            Ok(found) => found.is_some(),
            // An exemption we cannot evaluate protects the element.
            Err(_) => true,
        }
    }
}

fn suppress<D: Document>(doc: &D, overlay: &D::Element) -> Result<(), DomError> {
    overlay.set_style_property("display", "none", StylePriority::Normal)?;
    restore_scroll(doc)
}

/// Reset `overflow` on body and root so scroll-locked pages scroll again.
pub fn restore_scroll<D: Document>(doc: &D) -> Result<(), DomError> {
    if let Some(body) = doc.body() {
        body.set_style_property("overflow", "auto", StylePriority::Normal)?;
    }
    if let Some(root) = doc.root() {
        root.set_style_property("overflow", "auto", StylePriority::Normal)?;
    }
    Ok(())
}
