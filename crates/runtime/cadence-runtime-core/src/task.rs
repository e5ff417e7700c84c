//! Task bodies and their suspension protocol.
//!
//! A task body is a [`Routine`]: an explicit resumable state machine. Each
//! call to `resume` runs synchronous code and then either yields a
//! [`Suspend`] describing what the task waits on, or completes with an
//! optional result value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use cadence_api_core::Value;
use serde::{Deserialize, Serialize};

use crate::context::TaskContext;
use crate::error::RuntimeError;
use crate::ids::TaskId;

pub trait Routine {
    /// Run until the next suspension point.
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step>;

    fn label(&self) -> &str {
        "task"
    }

    /// Called once when the task is cancelled, including cancellation caused
    /// by its own failure.
    fn on_cancel(&mut self) {}

    /// Failures in this task's subtree are delivered to it instead of the
    /// host. See [`TaskContext::take_failures`].
    fn observes_failures(&self) -> bool {
        false
    }

    fn boxed(self) -> Box<dyn Routine>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl<R: Routine + ?Sized> Routine for Box<R> {
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        (**self).resume(cx)
    }

    fn label(&self) -> &str {
        (**self).label()
    }

    fn on_cancel(&mut self) {
        (**self).on_cancel()
    }

    fn observes_failures(&self) -> bool {
        (**self).observes_failures()
    }
}

/// Outcome of one `resume` call.
#[derive(Debug)]
pub enum Step {
    Yield(Suspend),
    Complete(Option<Value>),
}

impl Step {
    pub fn done() -> Self {
        Step::Complete(None)
    }

    pub fn sleep_until(deadline: f64) -> Self {
        Step::Yield(Suspend::Until(deadline))
    }

    pub fn wait_event(name: impl Into<String>) -> Self {
        Step::Yield(Suspend::Event(name.into()))
    }

    pub fn wait_task(task: TaskId) -> Self {
        Step::Yield(Suspend::Task(task))
    }
}

/// What a suspended task waits on.
#[derive(Debug)]
pub enum Suspend {
    /// Absolute clock time.
    Until(f64),
    Event(String),
    /// Any terminal state of another task.
    Task(TaskId),
    External(External),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TaskState {
    Runnable,
    SuspendedUntilTime(f64),
    SuspendedUntilEvent(String),
    SuspendedUntilTask(TaskId),
    SuspendedUntilExternal,
    Completed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }

    pub fn is_suspended(&self) -> bool {
        matches!(
            self,
            TaskState::SuspendedUntilTime(_)
                | TaskState::SuspendedUntilEvent(_)
                | TaskState::SuspendedUntilTask(_)
                | TaskState::SuspendedUntilExternal
        )
    }
}

/// Terminal record of a finished task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub state: TaskState,
    pub result: Option<Value>,
    /// Set when the task was cancelled because its own step failed.
    pub failure: Option<RuntimeError>,
    /// Task-local time at which it finished.
    pub finished_at: f64,
}

impl TaskOutcome {
    pub fn completed(&self) -> bool {
        self.state == TaskState::Completed
    }
}

/// Routine backed by a closure.
pub struct FnRoutine<F> {
    label: String,
    f: F,
}

impl<F> Routine for FnRoutine<F>
where
    F: FnMut(&mut TaskContext<'_>) -> anyhow::Result<Step>,
{
    fn resume(&mut self, cx: &mut TaskContext<'_>) -> anyhow::Result<Step> {
        (self.f)(cx)
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Wrap a closure as a task body. The closure is called on every resume and
/// keeps its own state between calls.
pub fn from_fn<F>(f: F) -> FnRoutine<F>
where
    F: FnMut(&mut TaskContext<'_>) -> anyhow::Result<Step>,
{
    named_fn("fn", f)
}

pub fn named_fn<F>(label: impl Into<String>, f: F) -> FnRoutine<F>
where
    F: FnMut(&mut TaskContext<'_>) -> anyhow::Result<Step>,
{
    FnRoutine {
        label: label.into(),
        f,
    }
}

pub(crate) type Settlement = Result<Option<Value>, String>;

/// Waiting side of a one-shot completion resolved outside the scheduler.
#[derive(Clone)]
pub struct External {
    slot: Rc<RefCell<Option<Settlement>>>,
}

/// Resolving side of an [`External`]. Only the first settlement counts.
#[derive(Clone)]
pub struct Resolver {
    slot: Rc<RefCell<Option<Settlement>>>,
}

/// Create a connected completion pair.
pub fn external() -> (External, Resolver) {
    let slot = Rc::new(RefCell::new(None));
    (External { slot: slot.clone() }, Resolver { slot })
}

impl External {
    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_some()
    }

    pub(crate) fn settlement(&self) -> Option<Settlement> {
        self.slot.borrow().clone()
    }
}

impl fmt::Debug for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("External")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl Resolver {
    /// Returns `false` if the pair was already settled.
    pub fn resolve(&self, value: Option<Value>) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with an error; the waiting task fails with `message`.
    pub fn reject(&self, message: impl Into<String>) -> bool {
        self.settle(Err(message.into()))
    }

    fn settle(&self, outcome: Settlement) -> bool {
        let mut slot = self.slot.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        true
    }
}
