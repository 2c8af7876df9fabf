// src/task/flow.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::errors::{Result, TaskFlowError};
use crate::scope::{FlowFn, FlowScope};
use crate::task::leaf::{LeafTask, NamedMetric};
use crate::task::Task;
use crate::types::{child_prefix, join_path};

/// A composite task: named children wired together by a flow definition.
///
/// Children are declared explicitly at construction and kept in declaration
/// order. Flow definitions refer to them by name.
#[derive(Clone)]
pub struct TaskFlow {
    name: String,
    children: Vec<Task>,
    index: HashMap<String, usize>,
    flow: Option<FlowFn>,
}

impl TaskFlow {
    pub fn builder(name: impl Into<String>) -> TaskFlowBuilder {
        TaskFlowBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Task] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.children[i])
    }

    /// Look up a child, failing with [`TaskFlowError::UnknownTask`].
    pub fn require_child(&self, name: &str) -> Result<&Task> {
        self.child(name).ok_or_else(|| TaskFlowError::UnknownTask {
            flow: self.name.clone(),
            task: name.to_string(),
        })
    }

    pub fn has_flow(&self) -> bool {
        self.flow.is_some()
    }

    /// Run the flow definition against `scope`.
    pub fn run_flow(&self, scope: &mut dyn FlowScope) -> Result<()> {
        let flow = self
            .flow
            .as_ref()
            .ok_or_else(|| TaskFlowError::UnimplementedFlow(self.name.clone()))?;
        flow(scope)
    }

    /// Every leaf reachable from this flow, keyed by dotted path relative to
    /// this flow, in declaration order.
    pub fn all_children(&self) -> Vec<(String, &LeafTask)> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    pub(crate) fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a LeafTask)>) {
        for child in &self.children {
            match child {
                Task::Leaf(leaf) => out.push((join_path(prefix, leaf.name()), leaf)),
                Task::Flow(flow) => flow.collect_leaves(&child_prefix(prefix, flow.name()), out),
            }
        }
    }

    pub fn leaf_paths(&self) -> Vec<String> {
        self.all_children().into_iter().map(|(path, _)| path).collect()
    }

    /// Label columns of every leaf, flattened.
    pub fn labels(&self) -> Vec<String> {
        self.all_children()
            .into_iter()
            .map(|(_, leaf)| leaf.labels().to_string())
            .collect()
    }

    /// Input columns declared by any leaf, deduplicated, in first-seen order.
    pub fn inputs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (_, leaf) in self.all_children() {
            for col in leaf.inputs() {
                if !out.contains(col) {
                    out.push(col.clone());
                }
            }
        }
        out
    }

    /// Metrics of all leaves, keyed by the leaf's dotted path.
    pub fn metrics(&self) -> Vec<(String, NamedMetric)> {
        self.all_children()
            .into_iter()
            .flat_map(|(path, leaf)| {
                leaf.metrics()
                    .iter()
                    .cloned()
                    .map(move |m| (path.clone(), m))
            })
            .collect()
    }
}

impl fmt::Debug for TaskFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFlow")
            .field("name", &self.name)
            .field("children", &self.children)
            .field("has_flow", &self.flow.is_some())
            .finish()
    }
}

/// Builder for [`TaskFlow`].
pub struct TaskFlowBuilder {
    name: String,
    children: Vec<Task>,
    flow: Option<FlowFn>,
}

impl TaskFlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            flow: None,
        }
    }

    pub fn task(mut self, task: impl Into<Task>) -> Self {
        self.children.push(task.into());
        self
    }

    pub fn tasks<I, T>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        self.children.extend(tasks.into_iter().map(Into::into));
        self
    }

    pub fn flow<F>(mut self, flow: F) -> Self
    where
        F: Fn(&mut dyn FlowScope) -> Result<()> + Send + Sync + 'static,
    {
        self.flow = Some(Arc::new(flow));
        self
    }

    pub fn flow_fn(mut self, flow: FlowFn) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Fails with [`TaskFlowError::DuplicateChild`] if two children share a
    /// name.
    pub fn build(self) -> Result<TaskFlow> {
        let mut index = HashMap::with_capacity(self.children.len());
        for (i, child) in self.children.iter().enumerate() {
            if index.insert(child.name().to_string(), i).is_some() {
                return Err(TaskFlowError::DuplicateChild {
                    flow: self.name,
                    child: child.name().to_string(),
                });
            }
        }

        debug!(
            flow = %self.name,
            children = self.children.len(),
            "built task flow"
        );

        Ok(TaskFlow {
            name: self.name,
            children: self.children,
            index,
            flow: self.flow,
        })
    }
}
