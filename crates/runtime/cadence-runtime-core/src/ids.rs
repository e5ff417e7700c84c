//! Identifiers and simple allocators for reactive nodes and tasks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a signal or computed value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Identity of a task. Never reused within a scheduler, even across seeks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TaskId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Monotonic allocator for NodeId and TaskId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_node: u32,
    next_task: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node = self.next_node.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_task(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task = self.next_task.wrapping_add(1);
        id
    }
}
