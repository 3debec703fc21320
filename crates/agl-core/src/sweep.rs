//! Selector sweep
//!
//! One pass of the catalog over the current document. Matches are classified
//! and hidden, then tagged with the sticky marker so later sweeps skip them.

use log::{debug, warn};

use crate::catalog::SelectorCatalog;
use crate::classifier::Classifier;
use crate::dom::{Document, Element};
use crate::error::DomError;
use crate::scheduler::Scheduler;
use crate::types::{StylePriority, HIDING_STYLE, MARKER_ATTRIBUTE, MARKER_VALUE};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Elements hidden by this pass
    pub hidden: usize,
    /// Unmarked matches handed to the classifier
    pub classified: usize,
    /// Patterns the host rejected
    pub skipped_patterns: usize,
    pub elapsed_ms: f64,
}

/// Runs the catalog against a document.
#[derive(Debug, Clone)]
pub struct Sweeper {
    catalog: SelectorCatalog,
    classifier: Classifier,
    slow_sweep_ms: f64,
}

impl Sweeper {
    pub fn new(catalog: SelectorCatalog, classifier: Classifier, slow_sweep_ms: f64) -> Self {
        Self {
            catalog,
            classifier,
            slow_sweep_ms,
        }
    }

    pub fn catalog(&self) -> &SelectorCatalog {
        &self.catalog
    }

    /// Sweep `doc`. Never fails: a bad pattern is logged and skipped.
    pub fn run<D: Document, S: Scheduler>(&self, doc: &D, clock: &S) -> SweepReport {
        let start = clock.now_ms();
        let mut report = SweepReport::default();

        for pattern in self.catalog.patterns() {
            let matches = match doc.query_all(pattern) {
                Ok(matches) => matches,
                Err(err) => {
                    debug!("Skipping selector {pattern}: {err}");
                    report.skipped_patterns += 1;
                    continue;
                }
            };

            for element in matches {
                if element.has_attribute(MARKER_ATTRIBUTE) {
                    continue;
                }
                report.classified += 1;
                if !self.classifier.classify(&element) {
                    continue;
                }
                match hide(&element) {
                    Ok(()) => report.hidden += 1,
                    Err(err) => debug!("Failed to hide element matched by {pattern}: {err}"),
                }
            }
        }

        report.elapsed_ms = clock.now_ms() - start;
        if report.elapsed_ms > self.slow_sweep_ms {
            warn!("Cosmetic filtering took {:.2}ms", report.elapsed_ms);
        }
        if report.hidden > 0 {
            debug!("Hidden {} ad elements", report.hidden);
        }

        report
    }
}

/// Apply the hiding style and the sticky marker.
pub fn hide<E: Element>(element: &E) -> Result<(), DomError> {
    for (property, value) in HIDING_STYLE {
        element.set_style_property(property, value, StylePriority::Important)?;
    }
    element.set_attribute(MARKER_ATTRIBUTE, MARKER_VALUE)
}
