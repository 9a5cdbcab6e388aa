//! Deferred handler invocations
//!
//! The plan never awaits a handler while it walks the reasoning graph.
//! Instead it leaves a [`Task`] on the board; the caller drains the board
//! and hands the outcomes back to the plan.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{join_all, BoxFuture, FutureExt};
use tracing::debug;

use super::node::NodeId;
use crate::binding::BindingSet;
use crate::error::ReasonerResult;
use crate::rule::Rule;

/// One pending handler invocation
#[derive(Debug, Clone)]
pub struct Task {
    pub node: NodeId,
    pub rule: Arc<Rule>,
    pub bindings: BindingSet,
}

/// The result of running one task
#[derive(Debug)]
pub struct TaskOutcome {
    pub node: NodeId,
    pub result: ReasonerResult<BindingSet>,
    pub elapsed: Duration,
}

/// Queue of tasks waiting to be dispatched.
///
/// Tasks addressed to the same node are not coalesced.
#[derive(Debug, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, node: NodeId, rule: Arc<Rule>, bindings: BindingSet) {
        debug!(node = node.0, rule = %rule.display_name(), bindings = bindings.len(), "task scheduled");
        self.tasks.push(Task { node, rule, bindings });
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Take every queued task and run their handlers concurrently.
    ///
    /// The board is empty as soon as this returns; the returned future
    /// resolves once every handler has finished.
    pub fn execute_scheduled_tasks(&mut self) -> BoxFuture<'static, Vec<TaskOutcome>> {
        let tasks = std::mem::take(&mut self.tasks);
        debug!(count = tasks.len(), "dispatching tasks");

        let running = tasks.into_iter().map(|task| async move {
            let start = Instant::now();
            let result = task.rule.invoke(task.bindings).await;
            TaskOutcome {
                node: task.node,
                result,
                elapsed: start.elapsed(),
            }
        });
        join_all(running).boxed()
    }
}
