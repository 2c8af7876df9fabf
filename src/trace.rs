// src/trace.rs

//! Data-free traversal of a flow definition.
//!
//! [`TaskFlow::trace`] runs the flow closure against a [`TraceScope`], which
//! only records dotted paths and gates. It catches structural mistakes
//! (unknown children, duplicate paths, gates on tasks that were never added,
//! decoded arguments that refer to later tasks) before any data is touched.

use tracing::debug;

use crate::errors::{Result, TaskFlowError};
use crate::forward::scope::ensure_flow_args;
use crate::precondition::{GateTable, Precondition};
use crate::scope::{Arg, FlowScope};
use crate::task::{Task, TaskFlow};
use crate::types::{child_prefix, join_path};

pub struct TraceScope<'a> {
    flow: &'a TaskFlow,
    prefix: String,
    gates: GateTable,
}

impl<'a> TraceScope<'a> {
    pub fn new(flow: &'a TaskFlow, prefix: &str) -> Self {
        Self {
            flow,
            prefix: prefix.to_string(),
            gates: GateTable::new(),
        }
    }

    pub fn into_gates(self) -> GateTable {
        self.gates
    }
}

impl FlowScope for TraceScope<'_> {
    fn add_with(&mut self, task: &str, args: &[Arg]) -> Result<&mut dyn FlowScope> {
        let flow = self.flow;
        match flow.require_child(task)? {
            Task::Leaf(leaf) => {
                for arg in args {
                    if let Arg::Decoded(source) = arg {
                        let key = join_path(&self.prefix, source);
                        if !self.gates.contains(&key) {
                            return Err(TaskFlowError::MissingField(key));
                        }
                    }
                }
                self.gates.register(&join_path(&self.prefix, leaf.name()), None)?;
            }
            Task::Flow(sub) => {
                ensure_flow_args(sub, args)?;
                let child = sub.trace_under(&child_prefix(&self.prefix, sub.name()))?;
                self.gates.merge(child)?;
            }
        }
        Ok(self)
    }

    fn gate(&mut self, precondition: Precondition) -> Result<()> {
        for source in precondition.sources() {
            if !self.gates.contains(source) {
                return Err(TaskFlowError::UnknownTask {
                    flow: self.flow.name().to_string(),
                    task: source.to_string(),
                });
            }
        }
        self.gates.attach(precondition)
    }

    fn precondition_for(&self, task: &str) -> Precondition {
        self.gates.resolve(&join_path(&self.prefix, task))
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl TaskFlow {
    /// Every leaf path this flow writes, with the precondition gating it.
    pub fn trace(&self) -> Result<GateTable> {
        let gates = self.trace_under("")?;
        debug!(
            flow = %self.name(),
            paths = gates.paths().count(),
            gated = gates.gated().count(),
            "traced flow"
        );
        Ok(gates)
    }

    pub(crate) fn trace_under(&self, prefix: &str) -> Result<GateTable> {
        let mut scope = TraceScope::new(self, prefix);
        self.run_flow(&mut scope)?;
        Ok(scope.into_gates())
    }
}
