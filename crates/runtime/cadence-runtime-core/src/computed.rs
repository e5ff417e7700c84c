//! Derived values with automatic dependency tracking.
//!
//! A computed value re-runs its producer only when it is stale: never
//! evaluated, pushed dirty by an upstream `set`, or one of its recorded
//! sources reports a version different from the one read last time (this is
//! how animations, which change with the clock rather than through `set`,
//! invalidate downstream values). The dependency list is rebuilt on every
//! evaluation, so conditional reads are handled.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use log::debug;

use crate::error::RuntimeError;
use crate::ids::NodeId;
use crate::runtime::Runtime;
use crate::tracker::{Dependency, Dependent, Source};

type Producer<T> = Box<dyn Fn() -> Result<T, RuntimeError>>;

pub(crate) struct ComputedInner<T> {
    id: NodeId,
    label: String,
    runtime: Runtime,
    producer: Producer<T>,
    cached: RefCell<Option<T>>,
    deps: RefCell<Vec<Dependency>>,
    dirty: Cell<bool>,
    version: Cell<u64>,
    evaluations: Cell<u64>,
    invalidations: Cell<u64>,
    dependents: RefCell<Vec<(NodeId, Weak<dyn Dependent>)>>,
    self_weak: Weak<ComputedInner<T>>,
}

impl<T: Clone + 'static> ComputedInner<T> {
    fn is_stale(&self) -> bool {
        if self.dirty.get() || self.cached.borrow().is_none() {
            return true;
        }
        let deps = self.deps.borrow().clone();
        deps.iter().any(|d| d.source.refresh() != d.version)
    }

    fn ensure_fresh(&self) -> Result<T, RuntimeError> {
        if !self.is_stale() {
            if let Some(value) = self.cached.borrow().as_ref() {
                return Ok(value.clone());
            }
        }

        let tracker = self.runtime.tracker();
        if tracker.is_evaluating(self.id) {
            return Err(RuntimeError::CyclicDependency {
                node: self.id,
                label: self.label.clone(),
            });
        }

        let scope = tracker.enter(self.id);
        let produced = (self.producer)();
        let (deps, failure) = scope.finish();
        if let Some(err) = failure {
            return Err(err);
        }
        let value = produced?;

        self.commit_deps(deps);
        *self.cached.borrow_mut() = Some(value.clone());
        self.dirty.set(false);
        self.version.set(self.version.get() + 1);
        self.evaluations.set(self.evaluations.get() + 1);
        debug!(
            "recomputed {} ({}), evaluation #{}",
            self.label,
            self.id,
            self.evaluations.get()
        );
        Ok(value)
    }

    fn commit_deps(&self, fresh: Vec<Dependency>) {
        let old = std::mem::replace(&mut *self.deps.borrow_mut(), fresh.clone());
        for dep in old {
            let node = dep.source.node();
            if !fresh.iter().any(|d| d.source.node() == node) {
                dep.source.unsubscribe(self.id);
            }
        }
        for dep in &fresh {
            let handle: Weak<dyn Dependent> = self.self_weak.clone();
            dep.source.subscribe(self.id, handle);
        }
    }

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

impl<T: Clone + 'static> Source for ComputedInner<T> {
    fn node(&self) -> NodeId {
        self.id
    }

    fn refresh(&self) -> u64 {
        if self.ensure_fresh().is_err() {
            // Force dependents to re-run and observe the failure themselves.
            self.version.set(self.version.get() + 1);
        }
        self.version.get()
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

impl<T: Clone + 'static> Dependent for ComputedInner<T> {
    fn mark_dirty(&self) {
        if self.dirty.get() {
            return;
        }
        self.dirty.set(true);
        self.invalidations.set(self.invalidations.get() + 1);
        self.notify();
    }
}

/// A read-only value derived from signals and other computed values.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new(runtime: &Runtime, f: impl Fn() -> T + 'static) -> Self {
        Self::try_named(runtime, "computed", move || Ok(f()))
    }

    pub fn named(runtime: &Runtime, label: impl Into<String>, f: impl Fn() -> T + 'static) -> Self {
        Self::try_named(runtime, label, move || Ok(f()))
    }

    /// Computed value whose producer may fail. Errors are returned from
    /// [`get`](Self::get) and the value stays dirty.
    pub fn try_new(
        runtime: &Runtime,
        f: impl Fn() -> Result<T, RuntimeError> + 'static,
    ) -> Self {
        Self::try_named(runtime, "computed", f)
    }

    pub fn try_named(
        runtime: &Runtime,
        label: impl Into<String>,
        f: impl Fn() -> Result<T, RuntimeError> + 'static,
    ) -> Self {
        let id = runtime.alloc_node();
        let label = label.into();
        let inner = Rc::new_cyclic(|weak| ComputedInner {
            id,
            label,
            runtime: runtime.clone(),
            producer: Box::new(f),
            cached: RefCell::new(None),
            deps: RefCell::new(Vec::new()),
            dirty: Cell::new(true),
            version: Cell::new(0),
            evaluations: Cell::new(0),
            invalidations: Cell::new(0),
            dependents: RefCell::new(Vec::new()),
            self_weak: weak.clone(),
        });
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Current value, recomputed only if stale.
    ///
    /// Any failure, including one raised by a nested read, is also recorded
    /// on the enclosing evaluation so it cannot be swallowed by an outer
    /// producer.
    pub fn get(&self) -> Result<T, RuntimeError> {
        let tracker = self.inner.runtime.tracker();
        match self.inner.ensure_fresh() {
            Ok(value) => {
                let source: Rc<dyn Source> = self.inner.clone();
                tracker.record(source, self.inner.version.get());
                Ok(value)
            }
            Err(err) => {
                tracker.fail(err.clone());
                Err(err)
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.is_stale()
    }

    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of times the producer ran to completion.
    pub fn evaluations(&self) -> u64 {
        self.inner.evaluations.get()
    }

    /// Number of clean-to-dirty transitions pushed by upstream writes.
    pub fn invalidations(&self) -> u64 {
        self.inner.invalidations.get()
    }

    /// Number of sources recorded during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }
}
