// src/engine/core.rs

//! Pure per-cluster core state machine.
//!
//! The core consumes [`ClusterEvent`]s and produces:
//! - updated tree/task state
//! - a list of [`Command`]s describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::ClusterRuntime`) reads events from
//! channels, performs HTTP requests and timers, and feeds results back as
//! events. The core has no channels, no Tokio types, and does no IO, so the
//! whole orchestration can be unit tested synchronously.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::model::Kind;
use crate::k8s::client::{HttpOutcome, HttpRequest};
use crate::k8s::event::WatchedEvent;
use crate::resource::ObjectState;
use crate::tree::component::{ComponentState, ComponentTree, Mode};
use crate::tree::task::TaskId;

/// Cluster lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterPhase {
    Init,
    Executing,
    Done,
    Failed,
}

/// Events fed into a cluster's runtime: the initial kick, decoded watch
/// events, and completions of work the shell performed.
#[derive(Debug)]
pub enum ClusterEvent {
    RunTasks,
    Watch(Box<WatchedEvent>),
    HttpDone { task: TaskId, outcome: HttpOutcome },
    PollFired { task: TaskId },
    ProbeDone { task: TaskId, state: ObjectState },
    TimeoutFired { task: TaskId },
    WatchClosed { error: Option<String> },
}

/// Work the shell should perform on behalf of the core.
#[derive(Debug)]
pub enum Command {
    /// Perform the request and report `HttpDone`.
    Http { task: TaskId, request: HttpRequest },
    /// Sleep, then report `PollFired`.
    Poll { task: TaskId, delay: Duration },
    /// Probe the live object, interpret via the kind's driver, report
    /// `ProbeDone`.
    Probe {
        task: TaskId,
        kind: Kind,
        mode: Mode,
        request: HttpRequest,
    },
    /// Sleep, then report `TimeoutFired`.
    Timeout { task: TaskId, after: Duration },
}

/// Result of one core step.
#[derive(Debug)]
pub struct CoreStep {
    pub commands: Vec<Command>,
    /// `Some(success)` once the root component is terminal.
    pub finished: Option<bool>,
}

/// The pure core: the component tree plus the cluster phase.
#[derive(Debug)]
pub struct ClusterCore {
    tree: ComponentTree,
    phase: ClusterPhase,
}

impl ClusterCore {
    pub fn new(tree: ComponentTree) -> Self {
        Self {
            tree,
            phase: ClusterPhase::Init,
        }
    }

    pub fn phase(&self) -> ClusterPhase {
        self.phase
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.tree
    }

    /// Begin execution: enter EXECUTING and run the first scheduler pass.
    pub fn start(&mut self) -> CoreStep {
        info!(cluster = %self.tree.ctx.name, "cluster execution started");
        self.phase = ClusterPhase::Executing;

        let mut commands = Vec::new();
        self.tree.run_tasks(&mut commands);

        CoreStep {
            commands,
            finished: self.check_terminal(),
        }
    }

    /// Apply one event and re-run the scheduler loop.
    pub fn step(&mut self, event: ClusterEvent) -> CoreStep {
        if self.phase != ClusterPhase::Executing {
            debug!(phase = ?self.phase, "ignoring event outside EXECUTING");
            return CoreStep {
                commands: Vec::new(),
                finished: None,
            };
        }

        let mut commands = Vec::new();

        match event {
            ClusterEvent::RunTasks => {}
            ClusterEvent::Watch(event) => {
                self.tree.process_event(&event);
            }
            ClusterEvent::HttpDone { task, outcome } => {
                self.tree.on_http_outcome(task, &outcome, &mut commands);
            }
            ClusterEvent::PollFired { task } => {
                self.tree.on_poll_fired(task, &mut commands);
            }
            ClusterEvent::ProbeDone { task, state } => {
                self.tree.on_probe_result(task, state, &mut commands);
            }
            ClusterEvent::TimeoutFired { task } => {
                self.tree.on_timeout(task);
            }
            ClusterEvent::WatchClosed { error } => {
                // Tasks waiting on events may stall from here; polling and
                // timeouts still progress.
                warn!(
                    cluster = %self.tree.ctx.name,
                    error = ?error,
                    "cluster event watch closed"
                );
            }
        }

        self.tree.run_tasks(&mut commands);

        CoreStep {
            commands,
            finished: self.check_terminal(),
        }
    }

    fn check_terminal(&mut self) -> Option<bool> {
        match self.tree.component(self.tree.root()).state {
            ComponentState::Done => {
                self.phase = ClusterPhase::Done;
                Some(true)
            }
            ComponentState::Failed => {
                self.phase = ClusterPhase::Failed;
                Some(false)
            }
            _ => None,
        }
    }
}
