//! Flow combinators: task bodies built from other task bodies.
//!
//! Combinators run their children as child tasks, so cancelling a
//! combinator cancels whatever it is currently running. A child that ends
//! cancelled counts as finished; its failure, if any, travels separately to
//! the nearest [`catch`] or to the host.

use std::collections::VecDeque;

use cadence_api_core::Value;

use crate::context::TaskContext;
use crate::error::{check_duration, RuntimeError};
use crate::ids::TaskId;
use crate::task::{from_fn, External, Routine, Step, Suspend};

/// Suspend for `seconds` of task-local time.
pub fn wait_for(seconds: f64) -> Result<WaitFor, RuntimeError> {
    check_duration("wait_for", seconds)?;
    Ok(WaitFor {
        seconds,
        started: false,
    })
}

pub struct WaitFor {
    seconds: f64,
    started: bool,
}

impl Routine for WaitFor {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        if self.started || self.seconds == 0.0 {
            return Ok(Step::done());
        }
        self.started = true;
        Ok(Step::sleep_until(cx.now() + self.seconds))
    }

    fn label(&self) -> &str {
        "wait_for"
    }
}

/// What [`wait_until`] waits on.
#[derive(Debug)]
pub enum WaitTarget {
    Event(String),
    /// Absolute clock time.
    Time(f64),
    External(External),
}

impl From<&str> for WaitTarget {
    fn from(name: &str) -> Self {
        WaitTarget::Event(name.to_string())
    }
}

impl From<String> for WaitTarget {
    fn from(name: String) -> Self {
        WaitTarget::Event(name)
    }
}

impl From<f64> for WaitTarget {
    fn from(time: f64) -> Self {
        WaitTarget::Time(time)
    }
}

impl From<External> for WaitTarget {
    fn from(handle: External) -> Self {
        WaitTarget::External(handle)
    }
}

/// Suspend until an event is dispatched, an absolute time is reached, or an
/// external completion settles. Completes with the event payload or the
/// external result. A time that is not finite fails the task with
/// [`RuntimeError::InvalidDuration`].
pub fn wait_until(target: impl Into<WaitTarget>) -> WaitUntil {
    WaitUntil {
        target: Some(target.into()),
    }
}

pub struct WaitUntil {
    target: Option<WaitTarget>,
}

impl Routine for WaitUntil {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        let suspend = match self.target.take() {
            None => return Ok(Step::Complete(cx.take_resume_value())),
            Some(WaitTarget::Time(t)) if !t.is_finite() => {
                return Err(RuntimeError::invalid_duration("wait_until", t).into());
            }
            Some(WaitTarget::Time(t)) if t <= cx.now() => return Ok(Step::done()),
            Some(WaitTarget::Time(t)) => Suspend::Until(t),
            Some(WaitTarget::Event(name)) => Suspend::Event(name),
            Some(WaitTarget::External(handle)) => Suspend::External(handle),
        };
        Ok(Step::Yield(suspend))
    }

    fn label(&self) -> &str {
        "wait_until"
    }
}

/// Start every task at once; complete when all of them have finished.
pub fn all(tasks: impl IntoIterator<Item = Box<dyn Routine>>) -> All {
    All {
        pending: tasks.into_iter().collect(),
        children: Vec::new(),
    }
}

pub struct All {
    pending: Vec<Box<dyn Routine>>,
    children: Vec<TaskId>,
}

impl Routine for All {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        for routine in self.pending.drain(..) {
            self.children.push(cx.spawn_boxed(routine));
        }
        if let Some(&running) = self.children.iter().find(|id| !cx.is_finished(**id)) {
            return Ok(Step::wait_task(running));
        }
        for id in self.children.drain(..) {
            cx.take_outcome(id);
        }
        Ok(Step::done())
    }

    fn label(&self) -> &str {
        "all"
    }
}

enum Phase {
    Start,
    Running(TaskId),
    Gap,
}

/// Run tasks one after another with `gap` seconds between consecutive ones.
/// Completes with the last task's result.
pub fn sequence(
    gap: f64,
    tasks: impl IntoIterator<Item = Box<dyn Routine>>,
) -> Result<Sequence, RuntimeError> {
    check_duration("sequence gap", gap)?;
    Ok(Sequence {
        gap,
        queue: tasks.into_iter().collect(),
        phase: Phase::Start,
        last: None,
    })
}

/// `sequence` without gaps.
pub fn chain(tasks: impl IntoIterator<Item = Box<dyn Routine>>) -> Sequence {
    Sequence {
        gap: 0.0,
        queue: tasks.into_iter().collect(),
        phase: Phase::Start,
        last: None,
    }
}

pub struct Sequence {
    gap: f64,
    queue: VecDeque<Box<dyn Routine>>,
    phase: Phase,
    last: Option<Value>,
}

impl Routine for Sequence {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        loop {
            match self.phase {
                Phase::Start => {
                    let Some(next) = self.queue.pop_front() else {
                        return Ok(Step::Complete(self.last.take()));
                    };
                    let id = cx.spawn_boxed(next);
                    self.phase = Phase::Running(id);
                    return Ok(Step::wait_task(id));
                }
                Phase::Running(id) => {
                    if !cx.is_finished(id) {
                        return Ok(Step::wait_task(id));
                    }
                    self.last = cx.take_outcome(id).and_then(|o| o.result);
                    if self.queue.is_empty() {
                        return Ok(Step::Complete(self.last.take()));
                    }
                    if self.gap > 0.0 {
                        self.phase = Phase::Gap;
                        return Ok(Step::sleep_until(cx.now() + self.gap));
                    }
                    self.phase = Phase::Start;
                }
                Phase::Gap => self.phase = Phase::Start,
            }
        }
    }

    fn label(&self) -> &str {
        "sequence"
    }
}

/// How many iterations a [`repeat`] runs.
pub enum Repeat {
    Times(usize),
    /// Checked with the iteration index before each iteration.
    While(Box<dyn FnMut(usize) -> bool>),
    Forever,
}

impl From<usize> for Repeat {
    fn from(count: usize) -> Self {
        Repeat::Times(count)
    }
}

impl Repeat {
    pub fn predicate(pred: impl FnMut(usize) -> bool + 'static) -> Self {
        Repeat::While(Box::new(pred))
    }

    fn should_continue(&mut self, index: usize) -> bool {
        match self {
            Repeat::Times(n) => index < *n,
            Repeat::While(pred) => pred(index),
            Repeat::Forever => true,
        }
    }
}

/// Loop: build a task with `factory(i)` and run it to completion, for each
/// iteration the condition allows.
pub fn repeat<R, F>(count: impl Into<Repeat>, mut factory: F) -> Loop
where
    R: Routine + 'static,
    F: FnMut(usize) -> R + 'static,
{
    Loop {
        condition: count.into(),
        factory: Box::new(move |i| Box::new(factory(i)) as Box<dyn Routine>),
        index: 0,
        current: None,
    }
}

pub struct Loop {
    condition: Repeat,
    factory: Box<dyn FnMut(usize) -> Box<dyn Routine>>,
    index: usize,
    current: Option<TaskId>,
}

impl Loop {
    /// Iterations started so far.
    pub fn iterations(&self) -> usize {
        self.index + usize::from(self.current.is_some())
    }
}

impl Routine for Loop {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        if let Some(id) = self.current {
            if !cx.is_finished(id) {
                return Ok(Step::wait_task(id));
            }
            cx.take_outcome(id);
            self.current = None;
            self.index += 1;
        }
        if !self.condition.should_continue(self.index) {
            return Ok(Step::done());
        }
        let routine = (self.factory)(self.index);
        let id = cx.spawn_boxed(routine);
        self.current = Some(id);
        Ok(Step::wait_task(id))
    }

    fn label(&self) -> &str {
        "loop"
    }
}

/// Start `routine` as a detached task and complete immediately. The spawned
/// task is adopted by the enclosing scope and cancelled with it.
pub fn spawn(routine: impl Routine + 'static) -> Spawn {
    Spawn {
        routine: Some(routine.boxed()),
        spawned: None,
    }
}

pub struct Spawn {
    routine: Option<Box<dyn Routine>>,
    spawned: Option<TaskId>,
}

impl Spawn {
    pub fn spawned(&self) -> Option<TaskId> {
        self.spawned
    }
}

impl Routine for Spawn {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        if let Some(routine) = self.routine.take() {
            self.spawned = Some(cx.spawn_boxed(routine));
        }
        Ok(Step::done())
    }

    fn label(&self) -> &str {
        "spawn"
    }
}

/// Run a closure as a single synchronous step.
pub fn call<F>(f: F) -> Call<F>
where
    F: FnMut(&mut TaskContext<'_>) -> anyhow::Result<()>,
{
    Call { f }
}

pub struct Call<F> {
    f: F,
}

impl<F> Routine for Call<F>
where
    F: FnMut(&mut TaskContext<'_>) -> anyhow::Result<()>,
{
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        (self.f)(cx)?;
        Ok(Step::done())
    }

    fn label(&self) -> &str {
        "call"
    }
}

/// Wait `seconds`, then run `routine`.
pub fn delay(seconds: f64, routine: impl Routine + 'static) -> Result<Sequence, RuntimeError> {
    Ok(chain([wait_for(seconds)?.boxed(), routine.boxed()]))
}

/// Run `routine` but cancel it if it has not finished after `limit` seconds.
/// Completes with `Bool(true)` if the routine finished in time.
///
/// Work finishing exactly at the limit counts as in time: when the limit is
/// reached the routine still gets the rest of that tick's passes, as long as
/// something in its subtree is runnable.
pub fn timeout(limit: f64, routine: impl Routine + 'static) -> Result<Timeout, RuntimeError> {
    check_duration("timeout", limit)?;
    Ok(Timeout {
        limit,
        routine: Some(routine.boxed()),
        target: None,
        watchdog: None,
    })
}

pub struct Timeout {
    limit: f64,
    routine: Option<Box<dyn Routine>>,
    target: Option<TaskId>,
    watchdog: Option<TaskId>,
}

impl Routine for Timeout {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        if let Some(routine) = self.routine.take() {
            let target = cx.spawn_boxed(routine);
            let limit = self.limit;
            let mut armed = false;
            let mut fired_at: Option<f64> = None;
            let watchdog = cx.spawn(from_fn(move |cx| {
                if !armed {
                    armed = true;
                    return Ok(Step::sleep_until(cx.now() + limit));
                }
                let clock = cx.clock_now();
                let first = *fired_at.get_or_insert(clock);
                if first == clock && cx.has_runnable_work(target) {
                    return Ok(Step::sleep_until(cx.now()));
                }
                cx.cancel(target);
                Ok(Step::done())
            }));
            self.target = Some(target);
            self.watchdog = Some(watchdog);
        }
        let Some(target) = self.target else {
            return Ok(Step::done());
        };
        if !cx.is_finished(target) {
            return Ok(Step::wait_task(target));
        }
        if let Some(watchdog) = self.watchdog.take() {
            cx.cancel(watchdog);
            cx.take_outcome(watchdog);
        }
        let in_time = cx
            .take_outcome(target)
            .map_or(false, |outcome| outcome.completed());
        Ok(Step::Complete(Some(Value::Bool(in_time))))
    }

    fn label(&self) -> &str {
        "timeout"
    }
}

/// Run `routine` and hand every failure raised in its subtree to `handler`
/// instead of the host. Completes with the routine's result.
pub fn catch<F>(routine: impl Routine + 'static, handler: F) -> Catch<F>
where
    F: FnMut(&RuntimeError),
{
    Catch {
        routine: Some(routine.boxed()),
        child: None,
        handler,
    }
}

pub struct Catch<F> {
    routine: Option<Box<dyn Routine>>,
    child: Option<TaskId>,
    handler: F,
}

impl<F> Routine for Catch<F>
where
    F: FnMut(&RuntimeError),
{
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        if let Some(routine) = self.routine.take() {
            self.child = Some(cx.spawn_boxed(routine));
        }
        if let Some(child) = self.child {
            if !cx.is_finished(child) {
                return Ok(Step::wait_task(child));
            }
        }
        for failure in cx.take_failures() {
            (self.handler)(&failure);
        }
        let result = self
            .child
            .take()
            .and_then(|id| cx.take_outcome(id))
            .and_then(|o| o.result);
        Ok(Step::Complete(result))
    }

    fn label(&self) -> &str {
        "catch"
    }

    fn observes_failures(&self) -> bool {
        true
    }
}
