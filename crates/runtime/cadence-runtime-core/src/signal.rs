//! Mutable reactive values with an optional in-flight animation.
//!
//! A signal's observable value is a pure function of its state and the
//! runtime clock: with an animation installed, `get()` samples it at
//! `now`; once `now` passes the animation's end the exact target is folded
//! into the base value. Every change of the observable value bumps the
//! signal's version, which is what computed values compare against.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use cadence_tween_core::{Easing, Tween};
use log::trace;

use crate::animate::Animate;
use crate::computed::Computed;
use crate::error::{check_duration, RuntimeError};
use crate::ids::NodeId;
use crate::runtime::{Resettable, Runtime};
use crate::tracker::{Dependent, Source};

/// Interpolator used while an animation runs: `(from, to, eased_progress)`.
pub type Interpolator<T> = Rc<dyn Fn(&T, &T, f32) -> T>;

struct Animation<T> {
    from: T,
    to: T,
    start: f64,
    duration: f64,
    easing: Easing,
    interpolator: Interpolator<T>,
    token: u64,
}

impl<T> Animation<T> {
    fn end(&self) -> f64 {
        self.start + self.duration
    }
}

impl<T: Clone> Animation<T> {
    fn sample_at(&self, at: f64) -> Sample<T> {
        if at >= self.end() {
            return Sample::Settled(self.to.clone());
        }
        let progress = ((at - self.start) / self.duration) as f32;
        Sample::Moving {
            from: self.from.clone(),
            to: self.to.clone(),
            progress: self.easing.apply(progress),
            interpolator: self.interpolator.clone(),
        }
    }
}

/// Everything needed to produce a value, detached from the signal's state so
/// the interpolator runs without holding a borrow.
enum Sample<T> {
    Settled(T),
    Moving {
        from: T,
        to: T,
        progress: f32,
        interpolator: Interpolator<T>,
    },
}

impl<T> Sample<T> {
    fn value(self) -> T {
        match self {
            Sample::Settled(value) => value,
            Sample::Moving {
                from,
                to,
                progress,
                interpolator,
            } => interpolator(&from, &to, progress),
        }
    }
}

struct SignalState<T> {
    value: T,
    initial: T,
    animation: Option<Animation<T>>,
    version: u64,
    sampled_at: f64,
    next_token: u64,
    disposed: bool,
}

impl<T: Clone> SignalState<T> {
    /// Fold a finished animation and bump the version when the sampling time
    /// moved under an active one.
    fn sync(&mut self, now: f64) {
        let Some(anim) = &self.animation else {
            return;
        };
        let finished = now >= anim.end();
        if finished {
            self.value = anim.to.clone();
            self.animation = None;
        }
        if self.sampled_at != now {
            self.sampled_at = now;
            self.version += 1;
        }
    }

    fn sample_at(&self, at: f64) -> Sample<T> {
        match &self.animation {
            Some(anim) => anim.sample_at(at),
            None => Sample::Settled(self.value.clone()),
        }
    }
}

pub(crate) struct SignalInner<T> {
    id: NodeId,
    label: String,
    runtime: Runtime,
    state: RefCell<SignalState<T>>,
    dependents: RefCell<Vec<(NodeId, Weak<dyn Dependent>)>>,
}

impl<T> SignalInner<T> {
    fn notify(&self) {
        let handles: Vec<Weak<dyn Dependent>> = {
            let mut deps = self.dependents.borrow_mut();
            deps.retain(|(_, w)| w.strong_count() > 0);
            deps.iter().map(|(_, w)| w.clone()).collect()
        };
        for handle in handles {
            if let Some(dep) = handle.upgrade() {
                dep.mark_dirty();
            }
        }
    }
}

impl<T: Clone + 'static> Source for SignalInner<T> {
    fn node(&self) -> NodeId {
        self.id
    }

    fn refresh(&self) -> u64 {
        let now = self.runtime.now();
        let mut state = self.state.borrow_mut();
        state.sync(now);
        state.version
    }

    fn subscribe(&self, dependent: NodeId, handle: Weak<dyn Dependent>) {
        let mut deps = self.dependents.borrow_mut();
        if !deps.iter().any(|(id, _)| *id == dependent) {
            deps.push((dependent, handle));
        }
    }

    fn unsubscribe(&self, dependent: NodeId) {
        self.dependents.borrow_mut().retain(|(id, _)| *id != dependent);
    }
}

impl<T: Clone + 'static> Resettable for SignalInner<T> {
    fn reset(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.value = state.initial.clone();
            state.animation = None;
            state.sampled_at = self.runtime.now();
            state.version += 1;
        }
        self.notify();
    }
}

/// A mutable reactive value. Clones share the same underlying cell.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish()
    }
}

impl<T: Clone + 'static> Signal<T> {
    pub fn new(runtime: &Runtime, initial: T) -> Self {
        Self::named(runtime, "signal", initial)
    }

    /// Create a signal with a label used in logs and errors.
    pub fn named(runtime: &Runtime, label: impl Into<String>, initial: T) -> Self {
        let inner = Rc::new(SignalInner {
            id: runtime.alloc_node(),
            label: label.into(),
            runtime: runtime.clone(),
            state: RefCell::new(SignalState {
                value: initial.clone(),
                initial,
                animation: None,
                version: 0,
                sampled_at: runtime.now(),
                next_token: 0,
                disposed: false,
            }),
            dependents: RefCell::new(Vec::new()),
        });
        let weak: Weak<SignalInner<T>> = Rc::downgrade(&inner);
        let weak: Weak<dyn Resettable> = weak;
        runtime.register(weak);
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Current value at the runtime clock. Inside a computed evaluation the
    /// read is recorded as a dependency.
    pub fn get(&self) -> T {
        let (value, version) = self.read();
        let source: Rc<dyn Source> = self.inner.clone();
        self.inner.runtime.tracker().record(source, version);
        value
    }

    /// Like [`get`](Self::get) but never recorded as a dependency.
    pub fn peek(&self) -> T {
        self.read().0
    }

    fn read(&self) -> (T, u64) {
        let now = self.inner.runtime.now();
        let (sample, version) = {
            let mut state = self.inner.state.borrow_mut();
            state.sync(now);
            (state.sample_at(now), state.version)
        };
        (sample.value(), version)
    }

    pub fn version(&self) -> u64 {
        self.inner.refresh()
    }

    pub fn is_animating(&self) -> bool {
        let now = self.inner.runtime.now();
        let mut state = self.inner.state.borrow_mut();
        state.sync(now);
        state.animation.is_some()
    }

    /// Replace the value, cancelling any running animation.
    pub fn set(&self, value: T) -> Result<(), RuntimeError> {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.disposed {
                return Err(self.disposed_error());
            }
            state.animation = None;
            state.value = value;
            state.sampled_at = self.inner.runtime.now();
            state.version += 1;
        }
        self.inner.notify();
        Ok(())
    }

    /// Set the value computed from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), RuntimeError> {
        let next = f(&self.peek());
        self.set(next)
    }

    /// Freeze a running animation at its current value.
    pub fn stop(&self) {
        self.stop_animation(None);
    }

    /// Restore the declared initial value.
    pub fn reset(&self) {
        Resettable::reset(&*self.inner);
    }

    /// Reject further writes and drop any running animation. Reads keep
    /// returning the last value.
    pub fn dispose(&self) {
        let last = self.peek();
        let mut state = self.inner.state.borrow_mut();
        state.value = last;
        state.animation = None;
        state.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Derived computed value over this signal.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(&T) -> U + 'static) -> Computed<U> {
        let source = self.clone();
        Computed::new(&self.inner.runtime, move || f(&source.get()))
    }

    /// Animate with an explicit interpolator, for value types without a
    /// [`Tween`] implementation.
    pub fn animate_with(
        &self,
        target: T,
        duration: f64,
        easing: Easing,
        interpolator: impl Fn(&T, &T, f32) -> T + 'static,
    ) -> Result<Animate<T>, RuntimeError> {
        check_duration("animate_to", duration)?;
        Ok(Animate::new(
            self.clone(),
            target,
            duration,
            easing,
            Rc::new(interpolator),
        ))
    }

    fn disposed_error(&self) -> RuntimeError {
        RuntimeError::UnresolvedWrite {
            signal: self.inner.id,
            label: self.inner.label.clone(),
        }
    }

    /// Install an animation starting at `start`. `from` defaults to the value
    /// the signal resolves to at `start` (or at the clock, if that is
    /// earlier), so a replaced animation hands over without a jump in task
    /// time. Returns a token identifying the animation, or `None` when the
    /// target was applied immediately.
    pub(crate) fn install(
        &self,
        from: Option<T>,
        to: T,
        start: f64,
        duration: f64,
        easing: Easing,
        interpolator: Interpolator<T>,
    ) -> Result<Option<u64>, RuntimeError> {
        let now = self.inner.runtime.now();
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let from = match from {
            Some(v) => v,
            None => {
                let handover = self.inner.state.borrow().sample_at(start.min(now));
                handover.value()
            }
        };
        let token = {
            let mut state = self.inner.state.borrow_mut();
            state.sync(now);
            state.sampled_at = now;
            state.version += 1;
            if duration <= 0.0 || start + duration <= now {
                state.animation = None;
                state.value = to;
                None
            } else {
                let token = state.next_token;
                state.next_token += 1;
                state.value = from.clone();
                state.animation = Some(Animation {
                    from,
                    to,
                    start,
                    duration,
                    easing,
                    interpolator,
                    token,
                });
                Some(token)
            }
        };
        trace!(
            "{} ({}) animating from t={start} for {duration}s",
            self.inner.label,
            self.inner.id
        );
        self.inner.notify();
        Ok(token)
    }

    /// Freeze the running animation if it matches `token` (any when `None`).
    pub(crate) fn stop_animation(&self, token: Option<u64>) {
        let now = self.inner.runtime.now();
        let frozen = {
            let mut state = self.inner.state.borrow_mut();
            state.sync(now);
            let matches = match (&state.animation, token) {
                (Some(anim), Some(token)) => anim.token == token,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if !matches {
                return;
            }
            state.sample_at(now)
        };
        let value = frozen.value();
        {
            let mut state = self.inner.state.borrow_mut();
            state.value = value;
            state.animation = None;
            state.version += 1;
        }
        self.inner.notify();
    }
}

impl<T: Tween + 'static> Signal<T> {
    /// Build a task that animates this signal to `target` over `duration`
    /// seconds. Nothing happens until the task is spawned; the animation
    /// starts from whatever value the signal resolves to at that moment.
    pub fn animate_to(
        &self,
        target: T,
        duration: f64,
        easing: Easing,
    ) -> Result<Animate<T>, RuntimeError> {
        check_duration("animate_to", duration)?;
        Ok(Animate::new(
            self.clone(),
            target,
            duration,
            easing,
            T::tween_fn(),
        ))
    }
}
