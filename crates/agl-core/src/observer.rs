//! Change observer
//!
//! Turns mutation batches into debounced sweeps. Ad sweeps and overlay sweeps
//! are debounced independently; each has at most one pending timer, and a new
//! batch restarts it instead of stacking another.

use crate::catalog::OVERLAY_KEYWORDS;
use crate::dom::{class_and_id, Element};
use crate::error::DomError;
use crate::scheduler::Scheduler;
use crate::types::{TimerId, TimerKind};

/// Child-list mutations delivered together by the host.
#[derive(Debug, Clone)]
pub struct MutationBatch<E> {
    /// Added nodes of any type, text nodes included
    pub added_nodes: usize,
    /// The added nodes that are elements
    pub added_elements: Vec<E>,
}

impl<E> MutationBatch<E> {
    pub fn new(added_nodes: usize, added_elements: Vec<E>) -> Self {
        Self {
            added_nodes,
            added_elements,
        }
    }

    /// Batch of element additions only.
    pub fn elements(added_elements: Vec<E>) -> Self {
        Self::new(added_elements.len(), added_elements)
    }
}

/// Pending debounce timers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverSchedule {
    pub ad_sweep: Option<TimerId>,
    pub overlay_sweep: Option<TimerId>,
}

/// Which debounce timers a batch (re)started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    pub ad_sweep: bool,
    pub overlay_sweep: bool,
}

#[derive(Debug, Clone)]
pub struct ChangeObserver {
    sweep_debounce_ms: u32,
    overlay_debounce_ms: u32,
    schedule: ObserverSchedule,
}

impl ChangeObserver {
    pub fn new(sweep_debounce_ms: u32, overlay_debounce_ms: u32) -> Self {
        Self {
            sweep_debounce_ms,
            overlay_debounce_ms,
            schedule: ObserverSchedule::default(),
        }
    }

    pub fn schedule(&self) -> ObserverSchedule {
        self.schedule
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::AdSweep => self.schedule.ad_sweep.is_some(),
            TimerKind::OverlaySweep => self.schedule.overlay_sweep.is_some(),
            _ => false,
        }
    }

    /// Debounce the sweeps `batch` calls for.
    pub fn on_mutations<E: Element, S: Scheduler>(
        &mut self,
        batch: &MutationBatch<E>,
        scheduler: &S,
    ) -> Result<MutationOutcome, DomError> {
        let mut outcome = MutationOutcome::default();
        if batch.added_nodes == 0 && batch.added_elements.is_empty() {
            return Ok(outcome);
        }

        restart(&mut self.schedule.ad_sweep, scheduler, TimerKind::AdSweep, self.sweep_debounce_ms)?;
        outcome.ad_sweep = true;

        if batch.added_elements.iter().any(is_overlay_like) {
            restart(
                &mut self.schedule.overlay_sweep,
                scheduler,
                TimerKind::OverlaySweep,
                self.overlay_debounce_ms,
            )?;
            outcome.overlay_sweep = true;
        }

        Ok(outcome)
    }

    /// Clear the handle of a timer that just fired. Returns whether it was
    /// pending; a stale fire returns `false`.
    pub fn on_fired(&mut self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::AdSweep => self.schedule.ad_sweep.take().is_some(),
            TimerKind::OverlaySweep => self.schedule.overlay_sweep.take().is_some(),
            _ => false,
        }
    }
}

fn restart<S: Scheduler>(
    slot: &mut Option<TimerId>,
    scheduler: &S,
    kind: TimerKind,
    delay_ms: u32,
) -> Result<(), DomError> {
    if let Some(previous) = slot.take() {
        scheduler.cancel(previous);
    }
    *slot = Some(scheduler.schedule(kind, delay_ms)?);
    Ok(())
}

/// Does an added element announce itself as an overlay, modal or popup?
pub fn is_overlay_like<E: Element>(element: &E) -> bool {
    let text = class_and_id(element);
    OVERLAY_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{MemoryDocument, MemoryElement};
    use crate::scheduler::ManualScheduler;

    fn element(doc: &MemoryDocument, class: &str) -> MemoryElement {
        let el = doc.create("div");
        el.set_attr("class", class);
        el
    }

    #[test]
    fn test_batches_coalesce_into_one_timer() {
        let doc = MemoryDocument::new("example.com");
        let scheduler = ManualScheduler::new();
        let mut observer = ChangeObserver::new(250, 100);

        for _ in 0..5 {
            let batch = MutationBatch::elements(vec![element(&doc, "card")]);
            let outcome = observer.on_mutations(&batch, &scheduler).unwrap();
            assert!(outcome.ad_sweep);
            assert!(!outcome.overlay_sweep);
            scheduler.advance(50.0, |_| panic!("debounce fired early"));
        }
        assert_eq!(scheduler.pending(TimerKind::AdSweep), 1);
        assert_eq!(scheduler.cancelled(), 4);

        let mut fired = Vec::new();
        scheduler.advance(250.0, |kind| fired.push(kind));
        assert_eq!(fired, vec![TimerKind::AdSweep]);
        assert!(observer.on_fired(TimerKind::AdSweep));
        assert!(!observer.is_pending(TimerKind::AdSweep));
        assert!(!observer.on_fired(TimerKind::AdSweep));
    }

    #[test]
    fn test_overlay_additions_use_the_short_timer() {
        let doc = MemoryDocument::new("example.com");
        let scheduler = ManualScheduler::new();
        let mut observer = ChangeObserver::new(250, 100);

        let modal = element(&doc, "Modal-Dialog");
        let batch = MutationBatch::elements(vec![element(&doc, "card"), modal]);
        let outcome = observer.on_mutations(&batch, &scheduler).unwrap();
        assert!(outcome.ad_sweep && outcome.overlay_sweep);

        let mut fired = Vec::new();
        scheduler.advance(100.0, |kind| fired.push(kind));
        assert_eq!(fired, vec![TimerKind::OverlaySweep]);
        scheduler.advance(150.0, |kind| fired.push(kind));
        assert_eq!(fired, vec![TimerKind::OverlaySweep, TimerKind::AdSweep]);
    }

    #[test]
    fn test_text_only_batches_still_schedule_a_sweep() {
        let scheduler = ManualScheduler::new();
        let mut observer = ChangeObserver::new(250, 100);
        let batch: MutationBatch<MemoryElement> = MutationBatch::new(3, Vec::new());
        let outcome = observer.on_mutations(&batch, &scheduler).unwrap();
        assert!(outcome.ad_sweep);

        let empty: MutationBatch<MemoryElement> = MutationBatch::new(0, Vec::new());
        assert_eq!(observer.on_mutations(&empty, &scheduler).unwrap(), MutationOutcome::default());
        assert_eq!(scheduler.pending(TimerKind::AdSweep), 1);
    }

    #[test]
    fn test_overlay_detection_by_id() {
        let doc = MemoryDocument::new("example.com");
        let el = doc.create("section");
        el.set_attr("id", "newsletterPopup");
        assert!(is_overlay_like(&el));
        assert!(!is_overlay_like(&element(&doc, "sidebar")));
    }
}
