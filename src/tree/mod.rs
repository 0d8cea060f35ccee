// src/tree/mod.rs

//! The runtime component tree and its task list.
//!
//! - [`component`] owns the arena of components, the per-component state
//!   machine, dependency synthesis and the task scheduler loop.
//! - [`task`] holds the task state machine the scheduler drives.
//! - [`dot`] renders the dependency graphs for `show-dependencies` mode.

pub mod component;
pub mod dot;
pub mod task;

pub use component::{Component, ComponentId, ComponentState, ComponentTree, Mode};
pub use task::{PodMonitor, Task, TaskId, TaskState};
