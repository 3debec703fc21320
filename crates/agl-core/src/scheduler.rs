//! Timer scheduling
//!
//! The host owns the event loop. The engine asks it for one-shot timers and
//! gets told (through `PageSession::on_timer`) when one fires.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::DomError;
use crate::types::{TimerId, TimerKind};

/// One-shot timers and a monotonic clock.
pub trait Scheduler {
    /// Milliseconds on a monotonic clock.
    fn now_ms(&self) -> f64;

    /// Fire `kind` after `delay_ms`.
    fn schedule(&self, kind: TimerKind, delay_ms: u32) -> Result<TimerId, DomError>;

    /// Cancel a pending timer. Unknown or fired ids are ignored.
    fn cancel(&self, id: TimerId);
}

// =============================================================================
// Manual Scheduler
// =============================================================================

/// Virtual-clock scheduler. Time only moves through [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    now: f64,
    next_id: u64,
    pending: Vec<PendingTimer>,
    cancelled: usize,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    id: TimerId,
    kind: TimerKind,
    due: f64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `ms`, firing due timers in order. `fire` may
    /// schedule further timers; those fire too if they fall inside the window.
    pub fn advance(&self, ms: f64, mut fire: impl FnMut(TimerKind)) {
        let target = self.inner.borrow().now + ms;
        loop {
            let next = {
                let mut state = self.inner.borrow_mut();
                let earliest = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due <= target)
                    .min_by(|(_, a), (_, b)| {
                        a.due
                            .partial_cmp(&b.due)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(a.id.0.cmp(&b.id.0))
                    })
                    .map(|(idx, _)| idx);
                earliest.map(|idx| {
                    let timer = state.pending.remove(idx);
                    state.now = timer.due;
                    timer.kind
                })
            };
            match next {
                Some(kind) => fire(kind),
                None => break,
            }
        }
        self.inner.borrow_mut().now = target;
    }

    /// Number of pending timers of `kind`.
    pub fn pending(&self, kind: TimerKind) -> usize {
        self.inner.borrow().pending.iter().filter(|timer| timer.kind == kind).count()
    }

    /// Number of successful cancellations so far.
    pub fn cancelled(&self) -> usize {
        self.inner.borrow().cancelled
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> f64 {
        self.inner.borrow().now
    }

    fn schedule(&self, kind: TimerKind, delay_ms: u32) -> Result<TimerId, DomError> {
        let mut state = self.inner.borrow_mut();
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let due = state.now + f64::from(delay_ms);
        state.pending.push(PendingTimer { id, kind, due });
        Ok(id)
    }

    fn cancel(&self, id: TimerId) {
        let mut state = self.inner.borrow_mut();
        let before = state.pending.len();
        state.pending.retain(|timer| timer.id != id);
        if state.pending.len() < before {
            state.cancelled += 1;
        }
    }
}
