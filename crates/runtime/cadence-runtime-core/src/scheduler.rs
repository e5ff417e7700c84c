//! Cooperative task scheduler.
//!
//! Tasks form a tree. Each tick advances the clock, wakes tasks whose
//! deadlines passed and settled external completions, then runs resumption
//! passes over the tree in pre-order (parent before children, creation order)
//! until a pass resumes nothing or `Config::max_passes_per_tick` is reached.
//! Everything is single threaded and deterministic: the same spawns, events
//! and `dt` sequence produce the same history.

use std::collections::{BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};

use cadence_api_core::Value;
use hashbrown::HashMap;
use log::{debug, error, trace, warn};

use crate::config::Config;
use crate::context::TaskContext;
use crate::diagnostics::{TickReport, TickStats};
use crate::error::{check_duration, RuntimeError};
use crate::ids::{IdAllocator, TaskId};
use crate::runtime::Runtime;
use crate::task::{External, Routine, Step, Suspend, TaskOutcome, TaskState};

/// Timer key ordered by `f64::total_cmp`.
#[derive(Copy, Clone, Debug)]
struct Deadline(f64);

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0).is_eq()
    }
}

impl Eq for Deadline {}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

pub(crate) struct TaskNode {
    label: String,
    parent: Option<TaskId>,
    children: Vec<TaskId>,
    state: TaskState,
    routine: Option<Box<dyn Routine>>,
    local_time: f64,
    resume: Option<Value>,
    pub(crate) failures: Vec<RuntimeError>,
    observes_failures: bool,
}

/// Task tree and wait registrations, shared with [`TaskContext`].
pub(crate) struct Core {
    pub(crate) runtime: Runtime,
    ids: IdAllocator,
    pub(crate) tasks: HashMap<TaskId, TaskNode>,
    roots: Vec<TaskId>,
    timers: BTreeSet<(Deadline, TaskId)>,
    event_waiters: HashMap<String, Vec<TaskId>>,
    task_waiters: HashMap<TaskId, Vec<TaskId>>,
    external_waiters: Vec<(TaskId, External)>,
    pub(crate) outcomes: HashMap<TaskId, TaskOutcome>,
    outcome_order: VecDeque<TaskId>,
    max_outcomes: usize,
    failures: VecDeque<RuntimeError>,
    max_failures: usize,
    stats: TickStats,
}

impl Core {
    fn new(runtime: Runtime, config: &Config) -> Self {
        Self {
            runtime,
            ids: IdAllocator::new(),
            tasks: HashMap::new(),
            roots: Vec::new(),
            timers: BTreeSet::new(),
            event_waiters: HashMap::new(),
            task_waiters: HashMap::new(),
            external_waiters: Vec::new(),
            outcomes: HashMap::new(),
            outcome_order: VecDeque::new(),
            max_outcomes: config.max_outcomes_retained,
            failures: VecDeque::new(),
            max_failures: config.max_failures_retained,
            stats: TickStats::default(),
        }
    }

    pub(crate) fn spawn_task(
        &mut self,
        parent: Option<TaskId>,
        routine: Box<dyn Routine>,
        at: f64,
    ) -> TaskId {
        let id = self.ids.alloc_task();
        let label = routine.label().to_string();
        let observes_failures = routine.observes_failures();
        let parent = parent.filter(|p| self.tasks.contains_key(p));
        match parent.and_then(|p| self.tasks.get_mut(&p)) {
            Some(node) => node.children.push(id),
            None => self.roots.push(id),
        }
        debug!("spawned {label} ({id}) at t={at}");
        self.tasks.insert(
            id,
            TaskNode {
                label,
                parent,
                children: Vec::new(),
                state: TaskState::Runnable,
                routine: Some(routine),
                local_time: at,
                resume: None,
                failures: Vec::new(),
                observes_failures,
            },
        );
        self.stats.spawned += 1;
        id
    }

    pub(crate) fn state(&self, id: TaskId) -> Option<TaskState> {
        match self.tasks.get(&id) {
            Some(node) => Some(node.state.clone()),
            None => self.outcomes.get(&id).map(|o| o.state.clone()),
        }
    }

    fn wake(&mut self, id: TaskId, at: f64, resume: Option<Value>) {
        if let Some(node) = self.tasks.get_mut(&id) {
            node.state = TaskState::Runnable;
            node.local_time = node.local_time.max(at);
            node.resume = resume;
        }
    }

    fn release_wait(&mut self, id: TaskId, state: &TaskState) {
        match state {
            TaskState::SuspendedUntilTime(deadline) => {
                self.timers.remove(&(Deadline(*deadline), id));
            }
            TaskState::SuspendedUntilEvent(name) => {
                if let Some(waiters) = self.event_waiters.get_mut(name) {
                    waiters.retain(|t| *t != id);
                    if waiters.is_empty() {
                        self.event_waiters.remove(name);
                    }
                }
            }
            TaskState::SuspendedUntilTask(target) => {
                if let Some(waiters) = self.task_waiters.get_mut(target) {
                    waiters.retain(|t| *t != id);
                    if waiters.is_empty() {
                        self.task_waiters.remove(target);
                    }
                }
            }
            TaskState::SuspendedUntilExternal => {
                self.external_waiters.retain(|(t, _)| *t != id);
            }
            _ => {}
        }
    }

    fn suspend(&mut self, id: TaskId, suspend: Suspend) {
        let Some(local) = self.tasks.get(&id).map(|n| n.local_time) else {
            return;
        };
        let state = match suspend {
            Suspend::Until(deadline) if deadline.is_nan() => {
                let err = RuntimeError::invalid_duration("sleep_until", deadline);
                self.fail(id, err.to_string());
                return;
            }
            Suspend::Until(deadline) => {
                self.timers.insert((Deadline(deadline), id));
                TaskState::SuspendedUntilTime(deadline)
            }
            Suspend::Event(name) => {
                self.event_waiters.entry(name.clone()).or_default().push(id);
                TaskState::SuspendedUntilEvent(name)
            }
            Suspend::Task(target) if self.tasks.contains_key(&target) => {
                self.task_waiters.entry(target).or_default().push(id);
                TaskState::SuspendedUntilTask(target)
            }
            Suspend::Task(target) => {
                // Already finished: resume on the next pass.
                let (at, result) = self
                    .outcomes
                    .get(&target)
                    .map_or((local, None), |o| (o.finished_at, o.result.clone()));
                self.wake(id, at, result);
                return;
            }
            Suspend::External(handle) => {
                self.external_waiters.push((id, handle));
                TaskState::SuspendedUntilExternal
            }
        };
        if let Some(node) = self.tasks.get_mut(&id) {
            node.state = state;
        }
    }

    fn detach(&mut self, id: TaskId, parent: Option<TaskId>) {
        match parent.and_then(|p| self.tasks.get_mut(&p)) {
            Some(node) => node.children.retain(|c| *c != id),
            None => self.roots.retain(|r| *r != id),
        }
    }

    fn wake_task_waiters(&mut self, id: TaskId, at: f64, result: Option<Value>) {
        let Some(waiters) = self.task_waiters.remove(&id) else {
            return;
        };
        for waiter in waiters {
            let waiting = matches!(
                self.tasks.get(&waiter).map(|n| &n.state),
                Some(TaskState::SuspendedUntilTask(t)) if *t == id
            );
            if waiting {
                self.wake(waiter, at, result.clone());
            }
        }
    }

    /// Finish a task normally. Its live children are adopted by its parent
    /// (or become roots) so they keep running in the enclosing scope.
    fn complete(&mut self, id: TaskId, result: Option<Value>) {
        let Some(node) = self.tasks.remove(&id) else {
            return;
        };
        self.detach(id, node.parent);
        let adopter = node.parent.filter(|p| self.tasks.contains_key(p));
        for child in &node.children {
            if let Some(c) = self.tasks.get_mut(child) {
                c.parent = adopter;
            }
        }
        match adopter.and_then(|p| self.tasks.get_mut(&p)) {
            Some(parent) => parent.children.extend(node.children.iter().copied()),
            None => self.roots.extend(node.children.iter().copied()),
        }

        let finished_at = node.local_time;
        debug!("completed {} ({id}) at t={finished_at}", node.label);
        self.record_outcome(
            id,
            TaskOutcome {
                state: TaskState::Completed,
                result: result.clone(),
                failure: None,
                finished_at,
            },
        );
        self.stats.completed += 1;
        self.wake_task_waiters(id, finished_at, result);
    }

    fn record_outcome(&mut self, id: TaskId, outcome: TaskOutcome) {
        self.outcomes.insert(id, outcome);
        self.outcome_order.push_back(id);
    }

    /// Drop the oldest unclaimed outcomes beyond the retention limit. Runs
    /// between ticks, once every woken waiter has had a chance to claim its
    /// child's outcome.
    fn prune_outcomes(&mut self) {
        let mut dropped = 0usize;
        while self.outcomes.len() > self.max_outcomes {
            let Some(oldest) = self.outcome_order.pop_front() else {
                break;
            };
            if self.outcomes.remove(&oldest).is_some() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("dropped {dropped} unclaimed task outcome(s)");
        }
        // Ids whose outcomes were already taken.
        if self.outcome_order.len() > self.outcomes.len().saturating_mul(2).max(64) {
            let outcomes = &self.outcomes;
            self.outcome_order.retain(|id| outcomes.contains_key(id));
        }
    }

    /// Whether `id` or any task below it will run again within the current
    /// tick: it is runnable, or its timer is already due.
    pub(crate) fn has_runnable_work(&self, id: TaskId) -> bool {
        let now = self.runtime.now();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.tasks.get(&id) else {
                continue;
            };
            match node.state {
                TaskState::Runnable => return true,
                TaskState::SuspendedUntilTime(deadline) if deadline <= now => return true,
                _ => stack.extend(node.children.iter().copied()),
            }
        }
        false
    }

    /// Cancel a live task and its subtree. Returns `false` if it was not live.
    pub(crate) fn cancel(&mut self, id: TaskId, at: f64) -> bool {
        if !self.tasks.contains_key(&id) {
            return false;
        }
        self.cancel_subtree(id, at, None);
        true
    }

    fn cancel_subtree(&mut self, id: TaskId, at: f64, failure: Option<RuntimeError>) {
        let children = match self.tasks.get(&id) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.cancel_subtree(child, at, None);
        }
        let Some(mut node) = self.tasks.remove(&id) else {
            return;
        };
        self.release_wait(id, &node.state);
        self.detach(id, node.parent);
        if let Some(routine) = node.routine.as_mut() {
            routine.on_cancel();
        }
        let finished_at = node.local_time.max(at);
        debug!("cancelled {} ({id}) at t={finished_at}", node.label);
        self.record_outcome(
            id,
            TaskOutcome {
                state: TaskState::Cancelled,
                result: None,
                failure,
                finished_at,
            },
        );
        self.stats.cancelled += 1;
        self.wake_task_waiters(id, finished_at, None);
    }

    /// Report a failed step and cancel the task's subtree. The failure goes to
    /// the nearest ancestor observing failures, otherwise to the host.
    fn fail(&mut self, id: TaskId, message: String) {
        let Some(node) = self.tasks.get(&id) else {
            return;
        };
        let err = RuntimeError::TaskFailure {
            task: id,
            label: node.label.clone(),
            message,
        };
        error!("{err}");
        let at = node.local_time;

        let mut cursor = node.parent;
        let mut observer = None;
        while let Some(p) = cursor {
            match self.tasks.get(&p) {
                Some(n) if n.observes_failures => {
                    observer = Some(p);
                    break;
                }
                Some(n) => cursor = n.parent,
                None => break,
            }
        }
        match observer.and_then(|o| self.tasks.get_mut(&o)) {
            Some(node) => node.failures.push(err.clone()),
            None => {
                self.failures.push_back(err.clone());
                while self.failures.len() > self.max_failures {
                    if let Some(dropped) = self.failures.pop_front() {
                        warn!("failure buffer full, dropping: {dropped}");
                    }
                }
            }
        }
        self.stats.failures.push(err.clone());
        self.cancel_subtree(id, at, Some(err));
    }

    pub(crate) fn dispatch(&mut self, name: &str, payload: Option<Value>, at: f64) -> usize {
        let waiters = self.event_waiters.remove(name).unwrap_or_default();
        let mut woken = 0;
        for id in waiters {
            let waiting = matches!(
                self.tasks.get(&id).map(|n| &n.state),
                Some(TaskState::SuspendedUntilEvent(n)) if n == name
            );
            if waiting {
                self.wake(id, at, payload.clone());
                woken += 1;
            }
        }
        trace!("event '{name}' woke {woken} task(s)");
        woken
    }

    fn wake_due_timers(&mut self, now: f64) {
        while let Some(&(Deadline(deadline), id)) = self.timers.first() {
            if deadline > now {
                break;
            }
            self.timers.pop_first();
            if matches!(
                self.tasks.get(&id).map(|n| &n.state),
                Some(TaskState::SuspendedUntilTime(_))
            ) {
                self.wake(id, deadline, None);
            }
        }
    }

    fn poll_externals(&mut self, now: f64) {
        if self.external_waiters.is_empty() {
            return;
        }
        let mut rejected = Vec::new();
        for (id, handle) in std::mem::take(&mut self.external_waiters) {
            match handle.settlement() {
                None => self.external_waiters.push((id, handle)),
                Some(Ok(value)) => self.wake(id, now, value),
                Some(Err(message)) => rejected.push((id, message)),
            }
        }
        for (id, message) in rejected {
            self.fail(id, format!("external completion rejected: {message}"));
        }
    }

    fn preorder(&self) -> Vec<TaskId> {
        let mut out = Vec::with_capacity(self.tasks.len());
        let mut stack: Vec<TaskId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.tasks.get(&id) {
                out.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

type SceneFactory = Box<dyn Fn() -> Box<dyn Routine>>;

/// Owns the clock and the task tree of one session.
pub struct Scheduler {
    core: Core,
    config: Config,
    scene: Option<SceneFactory>,
    epoch: u64,
    last_report: TickReport,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Scheduler {
    pub fn new(config: Config) -> Self {
        Self::with_runtime(Runtime::new(), config)
    }

    /// Drive an existing runtime, e.g. one whose signals were created first.
    pub fn with_runtime(runtime: Runtime, config: Config) -> Self {
        Self {
            core: Core::new(runtime, &config),
            config,
            scene: None,
            epoch: 0,
            last_report: TickReport::default(),
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.core.runtime.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> f64 {
        self.core.runtime.now()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a root task. Its first step runs immediately at the current
    /// clock time, together with anything else that became runnable.
    pub fn spawn(&mut self, routine: impl Routine + 'static) -> TaskId {
        self.spawn_boxed(Box::new(routine))
    }

    pub fn spawn_boxed(&mut self, routine: Box<dyn Routine>) -> TaskId {
        let now = self.now();
        let id = self.core.spawn_task(None, routine, now);
        self.settle();
        id
    }

    /// Advance the clock by `dt` seconds and run tasks until none can make
    /// progress. Returns whether any task is still live.
    pub fn tick(&mut self, dt: f64) -> bool {
        let dt = if dt >= 0.0 && dt.is_finite() {
            dt
        } else {
            warn!("ignoring invalid tick dt {dt}");
            0.0
        };
        let target = self.now() + dt;
        self.advance_to(target, dt)
    }

    fn advance_to(&mut self, time: f64, dt: f64) -> bool {
        self.epoch = self.epoch.wrapping_add(1);
        self.core.runtime.clock().set(time);
        trace!("tick {}: dt={dt} now={time}", self.epoch);
        self.settle();
        self.core.prune_outcomes();
        let pending = self.core.tasks.len();
        self.last_report = self
            .core
            .stats
            .take_report(self.epoch, dt, time, pending);
        pending > 0
    }

    fn settle(&mut self) {
        let limit = self.config.pass_limit();
        for _ in 0..limit {
            let now = self.now();
            self.core.wake_due_timers(now);
            self.core.poll_externals(now);
            self.core.stats.passes += 1;
            if self.run_pass() == 0 {
                return;
            }
        }
        self.core.stats.pass_limit_hit = true;
        warn!(
            "pass limit of {limit} reached at t={}; remaining work deferred to the next tick",
            self.now()
        );
    }

    fn run_pass(&mut self) -> usize {
        let mut resumed = 0;
        let mut stack: Vec<TaskId> = self.core.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let runnable = matches!(
                self.core.tasks.get(&id).map(|n| &n.state),
                Some(TaskState::Runnable)
            );
            if runnable {
                self.step(id);
                resumed += 1;
            }
            if let Some(node) = self.core.tasks.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        trace!("pass resumed {resumed} task(s)");
        self.core.stats.resumed += resumed;
        resumed
    }

    fn step(&mut self, id: TaskId) {
        let Some(node) = self.core.tasks.get_mut(&id) else {
            return;
        };
        let Some(mut routine) = node.routine.take() else {
            return;
        };
        let local = node.local_time;
        let resume = node.resume.take();

        let result = {
            let mut cx = TaskContext::new(&mut self.core, id, local, resume);
            panic::catch_unwind(AssertUnwindSafe(|| routine.resume(&mut cx)))
        };

        if !self.core.tasks.contains_key(&id) {
            // Cancelled from inside its own step.
            routine.on_cancel();
            return;
        }
        match result {
            Ok(Ok(Step::Complete(value))) => self.core.complete(id, value),
            Ok(Ok(Step::Yield(suspend))) => {
                if let Some(node) = self.core.tasks.get_mut(&id) {
                    node.routine = Some(routine);
                }
                self.core.suspend(id, suspend);
            }
            Ok(Err(err)) => {
                self.core.fail(id, format!("{err:#}"));
                routine.on_cancel();
            }
            Err(payload) => {
                self.core.fail(id, panic_message(payload));
                routine.on_cancel();
            }
        }
    }

    /// Wake tasks waiting on `name` and let them run at the current time.
    /// Events nobody waits on are dropped.
    pub fn dispatch(&mut self, name: &str, payload: Option<Value>) -> usize {
        let now = self.now();
        let woken = self.core.dispatch(name, payload, now);
        if woken > 0 {
            self.settle();
        }
        woken
    }

    pub fn cancel(&mut self, task: TaskId) -> Result<(), RuntimeError> {
        let now = self.now();
        if !self.core.cancel(task, now) {
            return Err(RuntimeError::UnknownTask { task });
        }
        self.settle();
        Ok(())
    }

    pub fn cancel_all(&mut self) {
        let now = self.now();
        for root in self.core.roots.clone() {
            self.core.cancel(root, now);
        }
    }

    /// Live state, or the terminal state of a finished task whose outcome has
    /// not been consumed.
    pub fn state(&self, task: TaskId) -> Option<TaskState> {
        self.core.state(task)
    }

    pub fn outcome(&self, task: TaskId) -> Option<&TaskOutcome> {
        self.core.outcomes.get(&task)
    }

    /// Number of finished-task outcomes held for `state`, `outcome` and
    /// `take_result`. Bounded by `Config::max_outcomes_retained` at the end of
    /// every tick.
    pub fn retained_outcomes(&self) -> usize {
        self.core.outcomes.len()
    }

    /// Consume a finished task's outcome and return its result value.
    pub fn take_result(&mut self, task: TaskId) -> Option<Value> {
        self.core.outcomes.remove(&task).and_then(|o| o.result)
    }

    /// Number of live tasks.
    pub fn pending(&self) -> usize {
        self.core.tasks.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.core.tasks.is_empty()
    }

    /// Live tasks in resumption order.
    pub fn live_tasks(&self) -> Vec<TaskId> {
        self.core.preorder()
    }

    /// Drain failures no ancestor task observed.
    pub fn take_failures(&mut self) -> Vec<RuntimeError> {
        self.core.failures.drain(..).collect()
    }

    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    /// Register the factory that builds the root task for `reset` and `seek`.
    pub fn set_scene<R, F>(&mut self, factory: F)
    where
        R: Routine + 'static,
        F: Fn() -> R + 'static,
    {
        self.scene = Some(Box::new(move || Box::new(factory()) as Box<dyn Routine>));
    }

    /// Cancel everything, restore signals, rewind the clock to zero and
    /// respawn the scene if one is set.
    pub fn reset(&mut self) {
        self.cancel_all();
        self.core.outcomes.clear();
        self.core.outcome_order.clear();
        self.core.failures.clear();
        self.core.timers.clear();
        self.core.event_waiters.clear();
        self.core.task_waiters.clear();
        self.core.external_waiters.clear();
        self.core.stats = TickStats::default();
        self.core.runtime.clock().set(0.0);
        self.core.runtime.reset_signals();
        self.epoch = 0;
        self.last_report = TickReport::default();
        debug!("scheduler reset");
        let scene = self.scene.as_ref().map(|factory| factory());
        if let Some(routine) = scene {
            self.spawn_boxed(routine);
        }
    }

    /// Replay the scene from zero up to exactly `time`, in `Config::seek_step`
    /// increments. Host events dispatched earlier are not replayed.
    pub fn seek(&mut self, time: f64) -> Result<(), RuntimeError> {
        check_duration("seek", time)?;
        if !time.is_finite() {
            return Err(RuntimeError::invalid_duration("seek", time));
        }
        self.reset();
        let step = self.config.effective_seek_step();
        while self.now() < time {
            let from = self.now();
            let next = (from + step).min(time);
            self.advance_to(next, next - from);
        }
        debug!("seeked to t={time} in {} tick(s)", self.epoch);
        Ok(())
    }

    /// Tear down the session. Tasks still waiting on an event or an external
    /// completion are reported as dangling, then everything is cancelled.
    pub fn dispose(mut self) -> Vec<RuntimeError> {
        let mut warnings = Vec::new();
        for id in self.core.preorder() {
            let Some(node) = self.core.tasks.get(&id) else {
                continue;
            };
            let waiting_on = match &node.state {
                TaskState::SuspendedUntilEvent(name) => format!("event '{name}'"),
                TaskState::SuspendedUntilExternal => "an external completion".to_string(),
                _ => continue,
            };
            let err = RuntimeError::DanglingSuspension {
                task: id,
                label: node.label.clone(),
                waiting_on,
            };
            warn!("{err}");
            warnings.push(err);
        }
        self.cancel_all();
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{external, from_fn};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn log_step(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> impl Routine {
        let log = log.clone();
        from_fn(move |_cx| {
            log.borrow_mut().push(name.to_string());
            Ok(Step::done())
        })
    }

    #[test]
    fn host_spawn_runs_first_step_immediately() {
        let mut sched = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = sched.spawn(log_step(&log, "a"));
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(sched.state(id), Some(TaskState::Completed));
        assert!(!sched.has_pending());
    }

    #[test]
    fn parents_resume_before_children_in_creation_order() {
        let mut sched = Scheduler::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = log.clone();
        let mut started = false;
        sched.spawn(from_fn(move |cx| {
            inner.borrow_mut().push(format!("parent@{}", cx.now()));
            if !started {
                started = true;
                cx.spawn(log_step(&inner, "first"));
                cx.spawn(log_step(&inner, "second"));
                return Ok(Step::sleep_until(1.0));
            }
            Ok(Step::done())
        }));
        sched.tick(1.0);
        assert_eq!(
            *log.borrow(),
            vec!["parent@0", "first", "second", "parent@1"]
        );
    }

    #[test]
    fn timer_wakes_at_exact_deadline() {
        let mut sched = Scheduler::default();
        let woke = Rc::new(RefCell::new(None));
        let w = woke.clone();
        let mut first = true;
        sched.spawn(from_fn(move |cx| {
            if first {
                first = false;
                return Ok(Step::sleep_until(0.5));
            }
            *w.borrow_mut() = Some((cx.now(), cx.clock_now()));
            Ok(Step::done())
        }));
        sched.tick(0.3);
        assert!(woke.borrow().is_none());
        sched.tick(0.3);
        assert_eq!(*woke.borrow(), Some((0.5, 0.6)));
    }

    #[test]
    fn step_errors_and_panics_become_failures() {
        let mut sched = Scheduler::default();
        let bad = sched.spawn(from_fn(|_cx| anyhow::bail!("bad input")));
        let boom = sched.spawn(from_fn(|_cx| -> anyhow::Result<Step> { panic!("boom") }));
        assert_eq!(sched.state(bad), Some(TaskState::Cancelled));
        assert_eq!(sched.state(boom), Some(TaskState::Cancelled));
        let failures = sched.take_failures();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].to_string().contains("bad input"));
        assert!(failures[1].to_string().contains("boom"));
        assert!(sched.take_failures().is_empty());
    }

    #[test]
    fn unknown_task_cancel_is_an_error() {
        let mut sched = Scheduler::default();
        assert_eq!(
            sched.cancel(TaskId(42)),
            Err(RuntimeError::UnknownTask { task: TaskId(42) })
        );
    }

    #[test]
    fn external_completion_resumes_with_value() {
        let mut sched = Scheduler::default();
        let (handle, resolver) = external();
        let mut handle = Some(handle);
        let id = sched.spawn(from_fn(move |cx| match handle.take() {
            Some(h) => Ok(Step::Yield(Suspend::External(h))),
            None => Ok(Step::Complete(cx.take_resume_value())),
        }));
        sched.tick(0.1);
        assert_eq!(sched.state(id), Some(TaskState::SuspendedUntilExternal));
        resolver.resolve(Some(Value::text("loaded")));
        sched.tick(0.1);
        assert_eq!(sched.take_result(id), Some(Value::text("loaded")));
    }

    #[test]
    fn pass_limit_defers_runaway_work() {
        let mut sched = Scheduler::new(Config {
            max_passes_per_tick: 5,
            ..Config::default()
        });
        sched.spawn(from_fn(|cx| Ok(Step::sleep_until(cx.now()))));
        assert!(sched.tick(0.0));
        assert!(sched.last_report().pass_limit_hit);
    }

    #[test]
    fn dispose_reports_dangling_waits() {
        let mut sched = Scheduler::default();
        sched.spawn(from_fn(|_cx| Ok(Step::wait_event("never"))));
        sched.spawn(from_fn(|cx| Ok(Step::sleep_until(cx.now() + 10.0))));
        let warnings = sched.dispose();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            RuntimeError::DanglingSuspension { waiting_on, .. } if waiting_on == "event 'never'"
        ));
    }
}
