// src/tree/component.rs

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, info, trace, warn};

use crate::config::model::{ComponentDefinition, EngineMode, Kind, ParentRelation};
use crate::config::validate::ComponentFilters;
use crate::engine::{ClusterContext, Command};
use crate::errors::{KdeployError, Result};
use crate::k8s::api::ResourceBody;
use crate::k8s::client::HttpOutcome;
use crate::k8s::event::WatchedEvent;
use crate::resource::{driver_for, CompletionPolicy, ObjectState};
use crate::tree::task::{Task, TaskId, TaskState};
use crate::vars::parse_bool;

/// Index into the root-owned component arena.
pub type ComponentId = usize;

/// Whether this tree creates or removes its resources; fixed at construction
/// from the engine mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Remove,
}

impl Mode {
    pub fn from_engine(mode: EngineMode) -> Self {
        match mode {
            EngineMode::Delete => Mode::Remove,
            EngineMode::Deploy | EngineMode::ShowDependencies => Mode::Create,
        }
    }
}

/// Component lifecycle. Ordering matters: `evaluate` compares states and
/// failure is the greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ComponentState {
    Creating,
    Running,
    Done,
    Failed,
}

impl ComponentState {
    pub fn is_terminal(&self) -> bool {
        *self >= ComponentState::Done
    }
}

/// One node of the runtime component tree.
///
/// Parents own children by id; `parent` and `depends_on` are back-references
/// into the same arena, so the graph stays cycle-free at the ownership level.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub kind: Kind,
    pub labels: BTreeMap<String, String>,
    pub args: BTreeMap<String, String>,
    pub default_args: BTreeMap<String, String>,
    pub depends: Vec<String>,
    pub relation: ParentRelation,

    pub parent: Option<ComponentId>,
    pub children: Vec<ComponentId>,
    pub depends_on: Vec<ComponentId>,

    pub mode: Mode,
    pub effective_args: BTreeMap<String, String>,
    pub state: ComponentState,
    pub started: Option<Instant>,
    pub elapsed: Option<Duration>,

    pub resource: ResourceBody,
}

/// The per-cluster component tree plus the flat task list the scheduler
/// operates on. The arena (`components`) is the single owner of every node.
#[derive(Debug, Clone)]
pub struct ComponentTree {
    pub ctx: ClusterContext,
    mode: Mode,
    components: Vec<Component>,
    tasks: Vec<Task>,
    root: ComponentId,
}

impl ComponentTree {
    /// Build the runtime tree from a definition: filter, construct, init.
    ///
    /// Returns `Ok(None)` when the root itself is filtered out.
    pub fn build(
        def: &ComponentDefinition,
        ctx: ClusterContext,
        filters: &ComponentFilters,
    ) -> Result<Option<Self>> {
        let mode = Mode::from_engine(ctx.config.mode);

        if !filters.matches(&def.name) {
            info!(component = %def.name, "excluding filtered root component");
            return Ok(None);
        }

        let mut tree = Self {
            ctx,
            mode,
            components: Vec::new(),
            tasks: Vec::new(),
            root: 0,
        };

        let root = tree.insert(def, None, filters)?;
        tree.root = root;
        tree.init(root)?;

        Ok(Some(tree))
    }

    fn insert(
        &mut self,
        def: &ComponentDefinition,
        parent: Option<ComponentId>,
        filters: &ComponentFilters,
    ) -> Result<ComponentId> {
        let kind: Kind = def.kind.parse()?;

        let id = self.components.len();
        self.components.push(Component {
            name: def.name.clone(),
            kind,
            labels: def.labels.clone(),
            args: def.args.clone(),
            default_args: def.default_args.clone(),
            depends: def.depends.clone(),
            relation: def.parent_relation,
            parent,
            children: Vec::new(),
            depends_on: Vec::new(),
            mode: self.mode,
            effective_args: BTreeMap::new(),
            state: ComponentState::Creating,
            started: None,
            elapsed: None,
            resource: crate::resource::empty_body(kind),
        });

        for child_def in &def.children {
            if !filters.matches(&child_def.name) {
                info!(component = %child_def.name, "excluding filtered component");
                continue;
            }
            let child = self.insert(child_def, Some(id), filters)?;
            self.components[id].children.push(child);
        }

        Ok(id)
    }

    /// Depth-first initialization: effective-args merge, namespace child
    /// synthesis at the root, kind validation.
    fn init(&mut self, id: ComponentId) -> Result<()> {
        self.components[id].state = ComponentState::Creating;
        self.components[id].effective_args = self.merge_args(id);

        if id == self.root && self.ctx.config.auto_maintain_namespace {
            let ns = self.namespace_of(id);
            let def = ComponentDefinition {
                name: format!("{ns}-ns"),
                kind: Kind::Namespace.as_str().to_string(),
                args: BTreeMap::from([("namespace.name".to_string(), ns)]),
                ..ComponentDefinition::default()
            };
            self.add_child(id, &def)?;
        }

        for child in self.components[id].children.clone() {
            self.init(child)?;
        }

        driver_for(self.components[id].kind).validate(self, id)?;
        Ok(())
    }

    /// Attach a synthesized child under `parent` and initialize it.
    ///
    /// Used for the auto-maintained namespace and for implicit children
    /// injected by resource drivers (a Deployment's Service or ConfigMap).
    pub fn add_child(&mut self, parent: ComponentId, def: &ComponentDefinition) -> Result<ComponentId> {
        let kind: Kind = def.kind.parse()?;

        let id = self.components.len();
        self.components.push(Component {
            name: def.name.clone(),
            kind,
            labels: def.labels.clone(),
            args: def.args.clone(),
            default_args: def.default_args.clone(),
            depends: def.depends.clone(),
            relation: def.parent_relation,
            parent: Some(parent),
            children: Vec::new(),
            depends_on: Vec::new(),
            mode: self.mode,
            effective_args: BTreeMap::new(),
            state: ComponentState::Creating,
            started: None,
            elapsed: None,
            resource: crate::resource::empty_body(kind),
        });

        self.components[parent].children.push(id);
        self.components[id].effective_args = self.merge_args(id);
        Ok(id)
    }

    /// Merge this node's `args` with the chain of ancestor `defaultArgs`.
    ///
    /// For `pod.args` and `pod.env` the values concatenate with a single
    /// space, descendant's value first; for all other keys the descendant
    /// wins and ancestors only fill missing keys.
    fn merge_args(&self, id: ComponentId) -> BTreeMap<String, String> {
        let mut merged = self.components[id].args.clone();

        let mut node = Some(id);
        while let Some(n) = node {
            for (k, v) in &self.components[n].default_args {
                if k == "pod.args" || k == "pod.env" {
                    let slot = merged.entry(k.clone()).or_default();
                    if !slot.is_empty() {
                        slot.push(' ');
                    }
                    slot.push_str(v);
                } else {
                    merged.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            node = self.components[n].parent;
        }

        merged
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn root(&self) -> ComponentId {
        self.root
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id]
    }

    pub fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.components[id]
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> {
        0..self.components.len()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.tasks[id]
    }

    /// Tasks owned by one component, in task-list order.
    pub fn tasks_of(&self, id: ComponentId) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.component == id)
            .map(|(i, _)| i)
    }

    /// `<cluster>/<Kind>/<name>` label used in logs and the DOT dump.
    pub fn log_name(&self, id: ComponentId) -> String {
        let c = &self.components[id];
        format!("{}/{}/{}", self.ctx.name, c.kind, c.name)
    }

    pub fn get_arg(&self, id: ComponentId, name: &str) -> Option<&str> {
        self.components[id].effective_args.get(name).map(String::as_str)
    }

    pub fn get_arg_or(&self, id: ComponentId, name: &str, default: &str) -> String {
        self.get_arg(id, name).unwrap_or(default).to_string()
    }

    pub fn get_bool_arg(&self, id: ComponentId, name: &str) -> Result<Option<bool>> {
        match self.get_arg(id, name) {
            None => Ok(None),
            Some(v) => parse_bool(name, v).map(Some),
        }
    }

    pub fn get_int_arg(&self, id: ComponentId, name: &str) -> Result<Option<i64>> {
        match self.get_arg(id, name) {
            None => Ok(None),
            Some(v) => v
                .parse::<i64>()
                .map(Some)
                .map_err(|_| KdeployError::Config(format!("argument '{name}' is not an integer: {v}"))),
        }
    }

    /// The namespace this component deploys into: the cluster variable
    /// `namespace` if present, else inherited from the parent, else the
    /// engine default.
    pub fn namespace_of(&self, id: ComponentId) -> String {
        if let Some(ns) = self.ctx.variables.get("namespace") {
            return ns.clone();
        }
        if let Some(parent) = self.components[id].parent {
            return self.namespace_of(parent);
        }
        self.ctx.config.namespace.clone()
    }

    /// The `app` selector for this component: the `app` label if set, else
    /// the component name.
    pub fn selector(&self, id: ComponentId) -> (String, String) {
        let c = &self.components[id];
        match c.labels.get("app") {
            Some(v) => ("app".to_string(), v.clone()),
            None => ("app".to_string(), c.name.clone()),
        }
    }

    pub fn has_kind_as_child(&self, id: ComponentId, kind: Kind) -> bool {
        self.components[id]
            .children
            .iter()
            .any(|&c| self.components[c].kind == kind)
    }

    /// `ignoreErrors` argument; malformed values count as unset.
    fn ignores_errors(&self, id: ComponentId) -> bool {
        self.get_bool_arg(id, "ignoreErrors")
            .ok()
            .flatten()
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Preparation: resource bodies, tasks, dependencies
    // ------------------------------------------------------------------

    /// Dispatch on engine mode: populate resource bodies, synthesize the
    /// task list, wire task dependencies, then wire component dependencies.
    pub fn prepare(&mut self) -> Result<()> {
        match self.ctx.config.mode {
            EngineMode::Deploy | EngineMode::ShowDependencies => {
                self.prepare_deploy(self.root)?;
                self.add_deployment_tasks(self.root);
                self.prepare_tasks(false)?;
                self.scan_dependencies()?;
            }
            EngineMode::Delete => {
                self.prepare_deploy(self.root)?;
                self.add_removal_tasks(self.root);
                self.prepare_tasks(true)?;
                self.scan_dependencies()?;
            }
        }
        Ok(())
    }

    /// Populate per-kind resource bodies and let drivers inject implicit
    /// children. Children synthesized by a driver are visited too.
    pub fn prepare_deploy(&mut self, id: ComponentId) -> Result<()> {
        driver_for(self.components[id].kind).prepare_deploy(self, id)?;

        for child in self.components[id].children.clone() {
            self.prepare_deploy(child)?;
        }

        Ok(())
    }

    pub fn add_deployment_tasks(&mut self, id: ComponentId) {
        self.add_tasks_from(id);
    }

    pub fn add_removal_tasks(&mut self, id: ComponentId) {
        self.add_tasks_from(id);
    }

    fn add_tasks_from(&mut self, id: ComponentId) {
        if let Some(spec) = driver_for(self.components[id].kind).task_spec(self, id) {
            self.tasks.push(Task::new(id, spec.name, spec.monitor));
        }

        for child in self.components[id].children.clone() {
            self.add_tasks_from(child);
        }
    }

    /// Wire task-level dependencies from each component's parent relation,
    /// then reject cycles in the task graph.
    ///
    /// `reverse` swaps BEFORE and AFTER. Under Delete the relation-based
    /// edges are suppressed entirely: the reversed component edges already
    /// encode teardown order.
    pub fn prepare_tasks(&mut self, reverse: bool) -> Result<()> {
        if self.ctx.config.mode != EngineMode::Delete {
            for tid in 0..self.tasks.len() {
                let comp = self.tasks[tid].component;
                let mut relation = self.components[comp].relation;
                if reverse {
                    relation = match relation {
                        ParentRelation::After => ParentRelation::Before,
                        ParentRelation::Before => ParentRelation::After,
                        ParentRelation::Independent => ParentRelation::Independent,
                    };
                }

                let Some(parent) = self.components[comp].parent else {
                    continue;
                };

                let parent_tasks: Vec<TaskId> = self.tasks_of(parent).collect();

                match relation {
                    ParentRelation::After => {
                        // This component's tasks wait for the parent's tasks.
                        for ptask in parent_tasks {
                            trace!(
                                component = %self.log_name(comp),
                                task = %self.tasks[tid].name,
                                parent_task = %self.tasks[ptask].name,
                                "task depends on parent task"
                            );
                            add_task_edge(&mut self.tasks, tid, ptask);
                        }
                    }
                    ParentRelation::Before => {
                        // The parent's tasks wait for this component's tasks.
                        for ptask in parent_tasks {
                            trace!(
                                component = %self.log_name(comp),
                                task = %self.tasks[ptask].name,
                                dependency = %self.tasks[tid].name,
                                "parent task depends on task"
                            );
                            add_task_edge(&mut self.tasks, ptask, tid);
                        }
                    }
                    ParentRelation::Independent => {}
                }
            }
        }

        self.check_task_graph()
    }

    fn check_task_graph(&self) -> Result<()> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for tid in 0..self.tasks.len() {
            graph.add_node(tid);
        }
        for (tid, task) in self.tasks.iter().enumerate() {
            for &dep in &task.depends_on {
                graph.add_edge(dep, tid, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let tid = cycle.node_id();
                Err(KdeployError::Cycle(format!(
                    "task graph cycle involving {}.{}",
                    self.log_name(self.tasks[tid].component),
                    self.tasks[tid].name
                )))
            }
        }
    }

    /// Assemble component-level dependency edges: namespace edges and
    /// declared `depends` edges, with endpoints swapped under Remove so the
    /// teardown order is the reverse of the build order.
    pub fn scan_dependencies(&mut self) -> Result<()> {
        let reverse = self.mode == Mode::Remove;

        // Components of kind Namespace, keyed by the namespace they manage.
        let mut ns_components: BTreeMap<String, ComponentId> = BTreeMap::new();
        for id in 0..self.components.len() {
            if self.components[id].kind == Kind::Namespace {
                ns_components.insert(self.managed_namespace(id), id);
            }
        }

        if !ns_components.is_empty() {
            for id in 0..self.components.len() {
                let ns = self.namespace_of(id);
                if let Some(&ns_id) = ns_components.get(&ns) {
                    // No edge to itself or across the parent chain; the
                    // child-before-parent completion rule already couples
                    // those pairs, and an edge on top would deadlock them.
                    if ns_id == id || self.is_ancestor(id, ns_id) || self.is_ancestor(ns_id, id) {
                        continue;
                    }
                    if reverse {
                        self.add_dependency(ns_id, id)?;
                    } else {
                        self.add_dependency(id, ns_id)?;
                    }
                }
            }
        }

        for id in 0..self.components.len() {
            for dep_name in self.components[id].depends.clone() {
                for other in 0..self.components.len() {
                    if self.components[other].name == dep_name {
                        if reverse {
                            self.add_dependency(other, id)?;
                        } else {
                            self.add_dependency(id, other)?;
                        }
                    }
                }
            }
        }

        self.check_component_graph()
    }

    /// The namespace a Namespace-kind component manages: its resource name
    /// when populated, else the `namespace.name` argument, else its own name.
    pub fn managed_namespace(&self, id: ComponentId) -> String {
        if let Some(meta) = self.components[id].resource.metadata() {
            if !meta.name.is_empty() {
                return meta.name.clone();
            }
        }
        if let Some(name) = self.get_arg(id, "namespace.name") {
            return name.to_string();
        }
        self.components[id].name.clone()
    }

    /// Add `from depends-on to`, refusing self-edges and edges that would
    /// close a cycle.
    pub fn add_dependency(&mut self, from: ComponentId, to: ComponentId) -> Result<()> {
        if from == to {
            return Err(KdeployError::Cycle(format!(
                "{} cannot depend on itself",
                self.log_name(from)
            )));
        }

        let mut transitive = BTreeSet::new();
        self.collect_dependencies(to, &mut transitive);
        if transitive.contains(&from) {
            return Err(KdeployError::Cycle(format!(
                "{} <-> {}",
                self.log_name(from),
                self.log_name(to)
            )));
        }

        if self.components[from].depends_on.contains(&to) {
            return Ok(());
        }

        debug!(
            component = %self.log_name(from),
            dependency = %self.log_name(to),
            "component dependency added"
        );
        self.components[from].depends_on.push(to);
        Ok(())
    }

    /// Is `a` an ancestor of `b`?
    fn is_ancestor(&self, a: ComponentId, b: ComponentId) -> bool {
        let mut node = self.components[b].parent;
        while let Some(n) = node {
            if n == a {
                return true;
            }
            node = self.components[n].parent;
        }
        false
    }

    fn collect_dependencies(&self, id: ComponentId, out: &mut BTreeSet<ComponentId>) {
        for &dep in &self.components[id].depends_on {
            if out.insert(dep) {
                self.collect_dependencies(dep, out);
            }
        }
    }

    fn check_component_graph(&self) -> Result<()> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for id in 0..self.components.len() {
            graph.add_node(id);
        }
        for (id, c) in self.components.iter().enumerate() {
            for &dep in &c.depends_on {
                graph.add_edge(dep, id, ());
            }
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(KdeployError::Cycle(format!(
                "component graph cycle involving {}",
                self.log_name(cycle.node_id())
            ))),
        }
    }

    /// Is this component still waiting on a declared or namespace
    /// dependency? Under Remove the edges are already reversed, so the same
    /// check yields teardown ordering.
    pub fn blocked_on_dependency(&self, id: ComponentId) -> bool {
        for &dep in &self.components[id].depends_on {
            if self.components[dep].state != ComponentState::Done {
                trace!(
                    component = %self.log_name(id),
                    dependency = %self.log_name(dep),
                    "still blocked on dependency"
                );
                return true;
            }
        }

        false
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// The scheduler loop: re-scan the flat task list as long as any task or
    /// component changes state, executing tasks as they become ready.
    pub fn run_tasks(&mut self, out: &mut Vec<Command>) {
        if self.components[self.root].state == ComponentState::Done {
            return;
        }

        loop {
            let mut progress = false;

            for tid in 0..self.tasks.len() {
                progress |= self.evaluate_task(tid);

                if self.tasks[tid].state == TaskState::Ready {
                    self.execute_task(tid, out);
                    progress = true;
                }
            }

            // Components whose tasks finished earlier may have been waiting
            // on a dependency that cleared during this pass.
            progress |= self.evaluate_all();

            if !progress {
                break;
            }
        }
    }

    /// Re-evaluate every unsettled component, children before parents.
    /// Returns true if any component changed state.
    fn evaluate_all(&mut self) -> bool {
        let before: Vec<ComponentState> = self.components.iter().map(|c| c.state).collect();

        for id in (0..self.components.len()).rev() {
            if !self.components[id].state.is_terminal() {
                self.evaluate(id);
            }
        }

        self.components
            .iter()
            .zip(before)
            .any(|(c, b)| c.state != b)
    }

    /// Advance a task out of PRE/BLOCKED when possible.
    ///
    /// From BLOCKED: stay while the owning component is blocked on a
    /// component-level dependency (Create mode), or while any task dependency
    /// is unfinished; sink to DEPENDENCY_FAILED when an upstream task failed.
    fn evaluate_task(&mut self, tid: TaskId) -> bool {
        let mut changed = false;

        if self.tasks[tid].state == TaskState::Pre {
            self.tasks[tid].state = TaskState::Blocked;
            changed = true;
        }

        if self.tasks[tid].state == TaskState::Blocked {
            let comp = self.tasks[tid].component;

            if self.components[comp].mode == Mode::Create {
                self.evaluate(comp);
                if self.blocked_on_dependency(comp) {
                    return changed;
                }
            }

            let mut blocked = false;
            for &dep in &self.tasks[tid].depends_on.clone() {
                let dep_state = self.tasks[dep].state;

                if dep_state >= TaskState::Aborted {
                    self.set_task_state(tid, TaskState::DependencyFailed);
                    return true;
                }

                if dep_state != TaskState::Done {
                    trace!(
                        task = %self.tasks[tid].name,
                        dependency = %self.tasks[dep].name,
                        "task blocked on dependency"
                    );
                    blocked = true;
                }
            }

            if !blocked {
                self.set_task_state(tid, TaskState::Ready);
                self.evaluate(comp);
                changed = true;
            }
        }

        changed
    }

    /// Dispatch a ready task's work: EXECUTING, emit the HTTP command, then
    /// WAITING for events/polls/response to conclude.
    fn execute_task(&mut self, tid: TaskId, out: &mut Vec<Command>) {
        let comp = self.tasks[tid].component;
        let driver = driver_for(self.components[comp].kind);

        self.set_task_state(tid, TaskState::Executing);

        let request = match self.mode {
            Mode::Create => driver.deploy_request(self, comp),
            Mode::Remove => driver.remove_request(self, comp),
        };

        match request {
            Some(request) => {
                debug!(
                    component = %self.log_name(comp),
                    url = %request.url,
                    "dispatching task work"
                );
                out.push(Command::Http { task: tid, request });
                self.set_task_state(tid, TaskState::Waiting);

                if let Some(after) = self.ctx.config.task_timeout {
                    out.push(Command::Timeout { task: tid, after });
                }
            }
            None => {
                // Nothing to send for this kind; the task is trivially done.
                self.set_task_state(tid, TaskState::Done);
            }
        }

        self.evaluate(comp);
    }

    /// Digest the response to a task's dispatched request.
    pub fn on_http_outcome(&mut self, tid: TaskId, outcome: &HttpOutcome, out: &mut Vec<Command>) {
        if !matches!(
            self.tasks[tid].state,
            TaskState::Executing | TaskState::Waiting
        ) {
            // Late response for an already-settled task.
            return;
        }

        let comp = self.tasks[tid].component;
        let driver = driver_for(self.components[comp].kind);

        match self.mode {
            Mode::Remove => match outcome {
                HttpOutcome::Status(s) if (200..300).contains(s) || *s == 404 => {
                    // 404 means the resource was already gone; idempotent
                    // teardown counts that as success.
                    self.set_task_state(tid, TaskState::Done);
                }
                HttpOutcome::Status(s) => {
                    self.fail_task(tid, &format!("DELETE returned HTTP {s}"));
                }
                HttpOutcome::Transport(e) => {
                    self.fail_task(tid, e);
                }
            },
            Mode::Create => match outcome {
                HttpOutcome::Status(s) if (200..300).contains(s) => match driver.completion() {
                    CompletionPolicy::OnResponse => {
                        self.set_task_state(tid, TaskState::Done);
                    }
                    CompletionPolicy::OnEvents => {
                        // Stay WAITING; the event monitor concludes this task.
                    }
                    CompletionPolicy::OnProbe => {
                        self.arm_poll(tid, out);
                    }
                },
                HttpOutcome::Status(s) => {
                    self.fail_task(tid, &format!("request returned HTTP {s}"));
                }
                HttpOutcome::Transport(e) => {
                    self.fail_task(tid, e);
                }
            },
        }

        self.evaluate(comp);
    }

    /// Fail a task; unless the component opts out with `ignoreErrors`, the
    /// component fails with it.
    fn fail_task(&mut self, tid: TaskId, why: &str) {
        let comp = self.tasks[tid].component;
        warn!(
            component = %self.log_name(comp),
            task = %self.tasks[tid].name,
            error = %why,
            "task work failed"
        );

        if self.ignores_errors(comp) {
            self.set_task_state(tid, TaskState::Done);
        } else {
            self.set_task_state(tid, TaskState::Failed);
            self.set_component_state(comp, ComponentState::Failed);
        }
    }

    /// Request a poll cycle unless one is already pending.
    fn arm_poll(&mut self, tid: TaskId, out: &mut Vec<Command>) {
        if !self.tasks[tid].poll_armed {
            self.tasks[tid].poll_armed = true;
            out.push(Command::Poll {
                task: tid,
                delay: Duration::from_secs(2),
            });
        }
    }

    /// A poll timer fired: ask the driver to probe the live object. Drivers
    /// without probe support end the polling here.
    pub fn on_poll_fired(&mut self, tid: TaskId, out: &mut Vec<Command>) {
        self.tasks[tid].poll_armed = false;

        if self.tasks[tid].state != TaskState::Waiting {
            return;
        }

        let comp = self.tasks[tid].component;
        let driver = driver_for(self.components[comp].kind);

        match driver.probe_request(self, comp) {
            Some(request) => out.push(Command::Probe {
                task: tid,
                kind: self.components[comp].kind,
                mode: self.mode,
                request,
            }),
            None => {
                debug!(component = %self.log_name(comp), "probes not available");
            }
        }
    }

    /// Map a probe result onto the task state machine.
    pub fn on_probe_result(&mut self, tid: TaskId, state: ObjectState, out: &mut Vec<Command>) {
        if self.tasks[tid].state != TaskState::Waiting {
            return;
        }

        let comp = self.tasks[tid].component;

        match self.mode {
            Mode::Remove => match state {
                ObjectState::DontExist | ObjectState::Done => {
                    self.set_task_state(tid, TaskState::Done);
                }
                ObjectState::Failed => {
                    self.fail_task(tid, "probe reported failure");
                }
                ObjectState::Init | ObjectState::Ready => {
                    self.arm_poll(tid, out);
                }
            },
            Mode::Create => match state {
                ObjectState::Ready | ObjectState::Done => {
                    self.set_task_state(tid, TaskState::Done);
                }
                ObjectState::Failed => {
                    self.fail_task(tid, "probe reported failure");
                }
                ObjectState::Init | ObjectState::DontExist => {
                    self.arm_poll(tid, out);
                }
            },
        }

        self.evaluate(comp);
    }

    /// A task's deadline expired while its work was still pending.
    pub fn on_timeout(&mut self, tid: TaskId) {
        if matches!(
            self.tasks[tid].state,
            TaskState::Executing | TaskState::Waiting
        ) {
            let comp = self.tasks[tid].component;
            warn!(
                component = %self.log_name(comp),
                task = %self.tasks[tid].name,
                "task deadline expired"
            );
            self.set_task_state(tid, TaskState::Aborted);
            self.evaluate(comp);
        }
    }

    /// Fan a cluster event out to every monitoring task. Returns true if any
    /// task changed state (the caller re-runs the scheduler loop then).
    pub fn process_event(&mut self, event: &WatchedEvent) -> bool {
        let mut changed = false;
        for tid in 0..self.tasks.len() {
            changed |= self.task_on_event(tid, event);
        }
        changed
    }

    fn task_on_event(&mut self, tid: TaskId, event: &WatchedEvent) -> bool {
        if self.tasks[tid].state != TaskState::Waiting {
            return false;
        }

        let concluded = {
            let Some(monitor) = self.tasks[tid].monitor.as_mut() else {
                return false;
            };

            let matches = event.involved_object.kind == "Pod"
                && event.reason == "Created"
                && event.involved_object.name.starts_with(&monitor.name_prefix)
                && event.metadata.name.starts_with(&monitor.name_prefix)
                && event.metadata.namespace_ == monitor.namespace;

            if !matches {
                return false;
            }

            monitor.seen += 1;
            monitor.seen >= monitor.target
        };

        let comp = self.tasks[tid].component;
        debug!(
            component = %self.log_name(comp),
            event = %event.metadata.name,
            "pod creation observed"
        );

        if concluded {
            self.set_task_state(tid, TaskState::Done);
            self.evaluate(comp);
            return true;
        }

        false
    }

    // ------------------------------------------------------------------
    // Component state machine
    // ------------------------------------------------------------------

    /// Re-derive this component's state from its tasks, children and
    /// dependencies. Called whenever a task or child changes state.
    pub fn evaluate(&mut self, id: ComponentId) {
        if self.components[id].state == ComponentState::Failed {
            return;
        }

        let mut new_state = ComponentState::Creating;
        let mut all_done = true;
        let mut num_tasks = 0usize;
        let mut task_failed = false;

        for task in &self.tasks {
            if task.component != id {
                continue;
            }

            num_tasks += 1;

            if task.state >= TaskState::Blocked && self.components[id].state == ComponentState::Creating
            {
                new_state = ComponentState::Running;
            }

            if !task.state.is_done() {
                all_done = false;
            }

            if task.state.is_failure() {
                task_failed = true;
                break;
            }
        }

        if task_failed {
            self.set_component_state(id, ComponentState::Failed);
            return;
        }

        if all_done {
            let mut blocked_on_child = false;

            for &child in &self.components[id].children.clone() {
                let child_state = self.components[child].state;
                if child_state != ComponentState::Done {
                    if child_state > ComponentState::Done {
                        debug!(
                            component = %self.log_name(id),
                            child = %self.log_name(child),
                            "failed because of child"
                        );
                        self.set_component_state(id, ComponentState::Failed);
                        return;
                    }
                    blocked_on_child = true;
                }
            }

            if self.blocked_on_dependency(id) {
                return;
            }

            if !blocked_on_child {
                self.set_component_state(id, ComponentState::Done);
                return;
            }
        }

        // A component does not start RUNNING while a dependency still gates
        // it; its namespace (or whatever it depends on) settles first.
        if num_tasks > 0
            && new_state > self.components[id].state
            && !self.blocked_on_dependency(id)
        {
            self.set_component_state(id, new_state);
        }
    }

    /// Commit a component transition. FAILED is sticky; DONE/FAILED compute
    /// elapsed time; anything at RUNNING or beyond notifies the parent.
    pub fn set_component_state(&mut self, id: ComponentId, state: ComponentState) {
        let current = self.components[id].state;
        if state == current || current == ComponentState::Failed {
            return;
        }

        match state {
            ComponentState::Done => {
                self.calculate_elapsed(id);
                let secs = self.components[id].elapsed.map(|e| e.as_secs_f64());
                info!(
                    component = %self.log_name(id),
                    elapsed_secs = secs.unwrap_or(0.0),
                    "done"
                );
            }
            ComponentState::Failed => {
                self.calculate_elapsed(id);
                let secs = self.components[id].elapsed.map(|e| e.as_secs_f64());
                warn!(
                    component = %self.log_name(id),
                    elapsed_secs = secs.unwrap_or(0.0),
                    "failed"
                );
            }
            _ => {}
        }

        self.components[id].state = state;

        if state >= ComponentState::Running {
            if let Some(parent) = self.components[id].parent {
                self.evaluate(parent);
            }
        }
    }

    fn set_task_state(&mut self, tid: TaskId, state: TaskState) {
        let current = self.tasks[tid].state;
        if current == state {
            return;
        }

        trace!(
            task = %self.tasks[tid].name,
            from = current.as_str(),
            to = state.as_str(),
            "task state change"
        );

        self.tasks[tid].state = state;

        if state == TaskState::Executing {
            let comp = self.tasks[tid].component;
            let started = &mut self.components[comp].started;
            if started.is_none() {
                *started = Some(Instant::now());
            }
        }
    }

    fn calculate_elapsed(&mut self, id: ComponentId) {
        if let Some(started) = self.components[id].started {
            self.components[id].elapsed = Some(started.elapsed());
        }
    }
}

fn add_task_edge(tasks: &mut [Task], from: TaskId, to: TaskId) {
    if from == to {
        return;
    }
    if !tasks[from].depends_on.contains(&to) {
        tasks[from].depends_on.push(to);
    }
}
