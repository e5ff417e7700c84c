//! Task body that drives a signal through one or more animation segments.

use std::rc::Rc;

use cadence_tween_core::Easing;

use crate::context::TaskContext;
use crate::error::{check_duration, RuntimeError};
use crate::signal::{Interpolator, Signal};
use crate::task::{Routine, Step, Suspend};

struct Segment<T> {
    target: T,
    duration: f64,
    easing: Easing,
}

/// Returned by [`Signal::animate_to`]. Spawn it (or place it inside a
/// combinator) to run the animation.
///
/// Each segment starts at the task-local time the previous one ended, from
/// the previous segment's exact target, so chained segments never drift.
/// Cancelling the task freezes the signal at its current value, unless
/// another animation has replaced this one in the meantime.
pub struct Animate<T> {
    signal: Signal<T>,
    segments: Vec<Segment<T>>,
    interpolator: Interpolator<T>,
    next: usize,
    previous_target: Option<T>,
    token: Option<u64>,
}

impl<T: Clone + 'static> Animate<T> {
    pub(crate) fn new(
        signal: Signal<T>,
        target: T,
        duration: f64,
        easing: Easing,
        interpolator: Interpolator<T>,
    ) -> Self {
        Self {
            signal,
            segments: vec![Segment {
                target,
                duration,
                easing,
            }],
            interpolator,
            next: 0,
            previous_target: None,
            token: None,
        }
    }

    /// Append a segment using the previous segment's easing.
    pub fn to(self, target: T, duration: f64) -> Result<Self, RuntimeError> {
        let easing = self
            .segments
            .last()
            .map_or(Easing::default(), |s| s.easing);
        self.to_with(target, duration, easing)
    }

    pub fn to_with(
        mut self,
        target: T,
        duration: f64,
        easing: Easing,
    ) -> Result<Self, RuntimeError> {
        check_duration("animate_to", duration)?;
        self.segments.push(Segment {
            target,
            duration,
            easing,
        });
        Ok(self)
    }

    /// Replace the interpolation strategy for every segment.
    pub fn with_interpolator(mut self, f: impl Fn(&T, &T, f32) -> T + 'static) -> Self {
        self.interpolator = Rc::new(f);
        self
    }

    /// Sum of all segment durations.
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    pub fn signal(&self) -> &Signal<T> {
        &self.signal
    }
}

impl<T: Clone + 'static> Routine for Animate<T> {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        while let Some(segment) = self.segments.get(self.next) {
            let start = cx.now();
            self.token = self.signal.install(
                self.previous_target.take(),
                segment.target.clone(),
                start,
                segment.duration,
                segment.easing,
                self.interpolator.clone(),
            )?;
            self.previous_target = Some(segment.target.clone());
            self.next += 1;
            if segment.duration > 0.0 {
                return Ok(Step::Yield(Suspend::Until(start + segment.duration)));
            }
        }
        self.token = None;
        Ok(Step::done())
    }

    fn label(&self) -> &str {
        self.signal.label()
    }

    fn on_cancel(&mut self) {
        if let Some(token) = self.token.take() {
            self.signal.stop_animation(Some(token));
        }
    }
}
