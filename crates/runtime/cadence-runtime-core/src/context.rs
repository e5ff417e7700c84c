use cadence_api_core::Value;

use crate::error::{check_duration, RuntimeError};
use crate::ids::TaskId;
use crate::runtime::Runtime;
use crate::scheduler::Core;
use crate::task::{Routine, Step, Suspend, TaskOutcome, TaskState};

/// Handle passed to a [`Routine`] while it runs one step.
///
/// `now()` is the task's local time: the exact deadline it woke at, or the
/// finish time of the task it waited on, rather than the clock reading of the
/// tick that happened to resume it. Scheduling relative to it keeps timing
/// free of per-tick drift.
pub struct TaskContext<'a> {
    core: &'a mut Core,
    task: TaskId,
    now: f64,
    resume: Option<Value>,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(core: &'a mut Core, task: TaskId, now: f64, resume: Option<Value>) -> Self {
        Self {
            core,
            task,
            now,
            resume,
        }
    }

    pub fn id(&self) -> TaskId {
        self.task
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Clock reading of the tick currently running.
    pub fn clock_now(&self) -> f64 {
        self.core.runtime.now()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.core.runtime
    }

    /// Event payload, external result or finished task result this step was
    /// woken with.
    pub fn resume_value(&self) -> Option<&Value> {
        self.resume.as_ref()
    }

    pub fn take_resume_value(&mut self) -> Option<Value> {
        self.resume.take()
    }

    /// Start a child task without suspending. It runs later in the same tick.
    pub fn spawn(&mut self, routine: impl Routine + 'static) -> TaskId {
        self.spawn_boxed(Box::new(routine))
    }

    pub fn spawn_boxed(&mut self, routine: Box<dyn Routine>) -> TaskId {
        self.core.spawn_task(Some(self.task), routine, self.now)
    }

    /// Wake every task waiting on `name`; they resume within this tick.
    /// Returns how many were woken.
    pub fn dispatch(&mut self, name: &str, payload: Option<Value>) -> usize {
        self.core.dispatch(name, payload, self.now)
    }

    /// Cancel a task and its descendants. Returns `false` if it was not live.
    pub fn cancel(&mut self, task: TaskId) -> bool {
        self.core.cancel(task, self.now)
    }

    pub fn state(&self, task: TaskId) -> Option<TaskState> {
        self.core.state(task)
    }

    /// Whether `task` or one of its descendants will run on a later pass of
    /// this tick.
    pub fn has_runnable_work(&self, task: TaskId) -> bool {
        self.core.has_runnable_work(task)
    }

    pub fn is_finished(&self, task: TaskId) -> bool {
        self.core
            .state(task)
            .map_or(true, |state| state.is_terminal())
    }

    pub fn outcome(&self, task: TaskId) -> Option<&TaskOutcome> {
        self.core.outcomes.get(&task)
    }

    /// Remove and return a finished task's outcome.
    pub fn take_outcome(&mut self, task: TaskId) -> Option<TaskOutcome> {
        self.core.outcomes.remove(&task)
    }

    /// Failures from this task's subtree, if it observes failures.
    pub fn take_failures(&mut self) -> Vec<RuntimeError> {
        self.core
            .tasks
            .get_mut(&self.task)
            .map(|node| std::mem::take(&mut node.failures))
            .unwrap_or_default()
    }

    /// Suspend for `seconds` of task-local time.
    pub fn sleep(&self, seconds: f64) -> Result<Step, RuntimeError> {
        check_duration("sleep", seconds)?;
        Ok(Step::Yield(Suspend::Until(self.now + seconds)))
    }
}
