//! Dependency tracking for computed values.
//!
//! The tracker is a stack of reader frames. A computed value pushes a frame
//! for the duration of its producer; every signal or computed read while the
//! stack is non-empty is recorded on the top frame together with the version
//! it was read at. Frames are popped by [`EvaluationScope`], on normal exit
//! and during unwinding alike.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use hashbrown::HashSet;

use crate::error::RuntimeError;
use crate::ids::NodeId;

/// Something a computed value can depend on.
pub(crate) trait Source {
    fn node(&self) -> NodeId;
    /// Bring the source up to date and return its current version.
    fn refresh(&self) -> u64;
    fn subscribe(&self, dependent: NodeId, handle: Weak<dyn Dependent>);
    fn unsubscribe(&self, dependent: NodeId);
}

/// Something that is invalidated when a source changes.
pub(crate) trait Dependent {
    fn mark_dirty(&self);
}

#[derive(Clone)]
pub(crate) struct Dependency {
    pub source: Rc<dyn Source>,
    pub version: u64,
}

struct ReaderFrame {
    deps: Vec<Dependency>,
    failure: Option<RuntimeError>,
}

#[derive(Default)]
pub(crate) struct Tracker {
    frames: RefCell<Vec<ReaderFrame>>,
    evaluating: RefCell<HashSet<NodeId>>,
}

impl Tracker {
    pub fn is_evaluating(&self, node: NodeId) -> bool {
        self.evaluating.borrow().contains(&node)
    }

    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Record a read on the innermost frame; no-op outside any evaluation.
    pub fn record(&self, source: Rc<dyn Source>, version: u64) {
        let mut frames = self.frames.borrow_mut();
        let Some(frame) = frames.last_mut() else {
            return;
        };
        let node = source.node();
        if frame.deps.iter().any(|d| d.source.node() == node) {
            return;
        }
        frame.deps.push(Dependency { source, version });
    }

    /// Mark the innermost evaluation as failed. The first failure wins.
    pub fn fail(&self, err: RuntimeError) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            if frame.failure.is_none() {
                frame.failure = Some(err);
            }
        }
    }

    pub fn enter(&self, reader: NodeId) -> EvaluationScope<'_> {
        self.evaluating.borrow_mut().insert(reader);
        self.frames.borrow_mut().push(ReaderFrame {
            deps: Vec::new(),
            failure: None,
        });
        EvaluationScope {
            tracker: self,
            reader,
            popped: false,
        }
    }
}

pub(crate) struct EvaluationScope<'a> {
    tracker: &'a Tracker,
    reader: NodeId,
    popped: bool,
}

impl EvaluationScope<'_> {
    /// Pop the frame and hand back what was recorded.
    pub fn finish(mut self) -> (Vec<Dependency>, Option<RuntimeError>) {
        self.popped = true;
        match self.tracker.frames.borrow_mut().pop() {
            Some(frame) => (frame.deps, frame.failure),
            None => (Vec::new(), None),
        }
    }
}

impl Drop for EvaluationScope<'_> {
    fn drop(&mut self) {
        if !self.popped {
            self.tracker.frames.borrow_mut().pop();
        }
        self.tracker.evaluating.borrow_mut().remove(&self.reader);
    }
}
