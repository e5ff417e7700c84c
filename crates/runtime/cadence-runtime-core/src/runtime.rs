//! Shared runtime context: the clock, the dependency tracker, node ids and
//! the registry of signals that `seek` resets.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use cadence_tween_core::Tween;

use crate::computed::Computed;
use crate::ids::{IdAllocator, NodeId};
use crate::signal::Signal;
use crate::tracker::Tracker;

/// Monotonic virtual time in seconds. Only the scheduler moves it.
#[derive(Debug, Default)]
pub struct Clock {
    now: Cell<f64>,
}

impl Clock {
    #[inline]
    pub fn now(&self) -> f64 {
        self.now.get()
    }

    pub(crate) fn set(&self, time: f64) {
        self.now.set(time);
    }
}

pub(crate) trait Resettable {
    fn reset(&self);
}

struct RuntimeInner {
    clock: Clock,
    tracker: Tracker,
    ids: RefCell<IdAllocator>,
    signals: RefCell<Vec<Weak<dyn Resettable>>>,
}

/// Cheap, cloneable handle shared by every signal, computed value and task
/// of one session. Not `Send`.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("now", &self.now())
            .field("signals", &self.inner.signals.borrow().len())
            .finish()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                clock: Clock::default(),
                tracker: Tracker::default(),
                ids: RefCell::new(IdAllocator::new()),
                signals: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Current clock time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.inner.clock.now()
    }

    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Create a signal holding `initial`.
    pub fn signal<T: Tween + 'static>(&self, initial: T) -> Signal<T> {
        Signal::new(self, initial)
    }

    /// Create a computed value from an infallible producer.
    pub fn computed<T: Clone + 'static>(&self, f: impl Fn() -> T + 'static) -> Computed<T> {
        Computed::new(self, f)
    }

    /// Whether `other` is a handle to the same runtime.
    pub fn same(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Restore every live signal to its initial value.
    pub fn reset_signals(&self) {
        let live: Vec<Rc<dyn Resettable>> = {
            let mut signals = self.inner.signals.borrow_mut();
            signals.retain(|w| w.strong_count() > 0);
            signals.iter().filter_map(Weak::upgrade).collect()
        };
        for signal in live {
            signal.reset();
        }
    }

    pub(crate) fn tracker(&self) -> &Tracker {
        &self.inner.tracker
    }

    pub(crate) fn alloc_node(&self) -> NodeId {
        self.inner.ids.borrow_mut().alloc_node()
    }

    pub(crate) fn register(&self, signal: Weak<dyn Resettable>) {
        self.inner.signals.borrow_mut().push(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_share_state() {
        let rt = Runtime::new();
        let other = rt.clone();
        rt.clock().set(1.5);
        assert_eq!(other.now(), 1.5);
        assert!(rt.same(&other));
        assert!(!rt.same(&Runtime::new()));
    }

    #[test]
    fn reset_restores_live_signals_and_prunes_dropped_ones() {
        let rt = Runtime::new();
        let kept = rt.signal(1.0f32);
        let dropped = rt.signal(2.0f32);
        kept.set(5.0).unwrap();
        drop(dropped);
        rt.reset_signals();
        assert_eq!(kept.get(), 1.0);
        assert_eq!(rt.inner.signals.borrow().len(), 1);
    }
}
