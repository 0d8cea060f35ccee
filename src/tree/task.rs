// src/tree/task.rs

use crate::tree::component::ComponentId;

/// Flat index into the root-owned task list.
pub type TaskId = usize;

/// Per-task state.
///
/// Ordering matters: everything past `Done` is a failure sink, and dependency
/// scanning uses `>= Aborted` to detect upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskState {
    /// Freshly created, not yet looked at.
    Pre,
    /// Waiting on task or component dependencies.
    Blocked,
    /// Dependencies satisfied; will execute on the next scheduler pass.
    Ready,
    /// Work is being dispatched.
    Executing,
    /// Work dispatched; waiting for cluster events or polls to confirm.
    Waiting,
    Done,
    Aborted,
    Failed,
    /// An upstream task sank; this task will never run.
    DependencyFailed,
}

impl TaskState {
    /// Terminal success.
    pub fn is_done(&self) -> bool {
        *self == TaskState::Done
    }

    /// Any terminal failure sink.
    pub fn is_failure(&self) -> bool {
        *self > TaskState::Done
    }

    /// Terminal in either direction.
    pub fn is_terminal(&self) -> bool {
        *self >= TaskState::Done
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pre => "PRE",
            TaskState::Blocked => "BLOCKED",
            TaskState::Ready => "READY",
            TaskState::Executing => "EXECUTING",
            TaskState::Waiting => "WAITING",
            TaskState::Done => "DONE",
            TaskState::Aborted => "ABORTED",
            TaskState::Failed => "FAILED",
            TaskState::DependencyFailed => "DEPENDENCY_FAILED",
        }
    }
}

/// Event-monitor state for workload tasks that complete by counting pod
/// creation events (a Deployment with `replicas = 2` is done after two
/// `reason=Created` pod events with its name prefix in its namespace).
#[derive(Debug, Clone)]
pub struct PodMonitor {
    pub name_prefix: String,
    pub namespace: String,
    pub target: usize,
    pub seen: usize,
}

impl PodMonitor {
    pub fn new(name_prefix: impl Into<String>, namespace: impl Into<String>, target: usize) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            namespace: namespace.into(),
            target: target.max(1),
            seen: 0,
        }
    }
}

/// The unit of executable work bound to a component.
///
/// Tasks live in a flat list owned by the tree root; dependencies are indices
/// into that list.
#[derive(Debug, Clone)]
pub struct Task {
    pub component: ComponentId,
    pub name: String,
    pub state: TaskState,
    pub depends_on: Vec<TaskId>,
    /// A one-shot poll timer is currently pending for this task.
    pub poll_armed: bool,
    pub monitor: Option<PodMonitor>,
}

impl Task {
    pub fn new(component: ComponentId, name: impl Into<String>, monitor: Option<PodMonitor>) -> Self {
        Self {
            component,
            name: name.into(),
            state: TaskState::Pre,
            depends_on: Vec::new(),
            poll_armed: false,
            monitor,
        }
    }
}
