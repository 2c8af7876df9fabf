// src/forward/scope.rs

use crate::errors::{Result, TaskFlowError};
use crate::forward::decorator::ModuleDecorator;
use crate::forward::inputs::FlowInputs;
use crate::forward::output::CompositeOutput;
use crate::precondition::Precondition;
use crate::scope::{Arg, FlowScope};
use crate::task::{LeafTask, Task, TaskFlow};
use crate::types::{child_prefix, join_path, Mode, Tensor};

/// [`FlowScope`] that runs predictors over a batch of tensors.
pub struct ForwardScope<'a> {
    flow: &'a TaskFlow,
    inputs: &'a FlowInputs,
    mode: Mode,
    out: CompositeOutput,
}

impl<'a> ForwardScope<'a> {
    pub fn new(flow: &'a TaskFlow, inputs: &'a FlowInputs, mode: Mode, prefix: &str) -> Self {
        Self {
            flow,
            inputs,
            mode,
            out: CompositeOutput::new(prefix),
        }
    }

    pub fn into_output(self) -> CompositeOutput {
        self.out
    }

    fn leaf_args(&self, leaf: &LeafTask, path: &str, args: &[Arg]) -> Result<Vec<&Tensor>> {
        let defaults: Vec<Arg>;
        let args = if args.is_empty() {
            defaults = leaf.inputs().iter().cloned().map(Arg::Input).collect();
            defaults.as_slice()
        } else {
            args
        };

        let mut tensors = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Input(name) => tensors.push(self.inputs.column(path, name)?),
                Arg::Inputs => tensors.extend(self.inputs.columns().values()),
                Arg::Decoded(task) => {
                    let key = join_path(self.out.prefix(), task);
                    let decoded = self
                        .out
                        .decoded()
                        .get(&key)
                        .ok_or(TaskFlowError::MissingField(key))?;
                    tensors.push(decoded);
                }
            }
        }
        Ok(tensors)
    }
}

impl FlowScope for ForwardScope<'_> {
    fn add_with(&mut self, task: &str, args: &[Arg]) -> Result<&mut dyn FlowScope> {
        let flow = self.flow;
        match flow.require_child(task)? {
            Task::Leaf(leaf) => {
                let decorator = ModuleDecorator::new(leaf, self.out.prefix());
                let output = {
                    let tensors = self.leaf_args(leaf, decorator.path(), args)?;
                    decorator.forward(&tensors, self.inputs.ground_truth(), self.mode)?
                };
                self.out.merge(output)?;
            }
            Task::Flow(sub) => {
                ensure_flow_args(sub, args)?;
                let prefix = child_prefix(self.out.prefix(), sub.name());
                let child = sub.evaluate(self.inputs, self.mode, &prefix)?;
                self.out.merge(child)?;
            }
        }
        Ok(self)
    }

    fn gate(&mut self, precondition: Precondition) -> Result<()> {
        self.out.attach(precondition)?;
        Ok(())
    }

    fn precondition_for(&self, task: &str) -> Precondition {
        self.out.precondition_for(task)
    }

    fn prefix(&self) -> &str {
        self.out.prefix()
    }
}

/// A nested flow always receives the whole input view.
pub(crate) fn ensure_flow_args(flow: &TaskFlow, args: &[Arg]) -> Result<()> {
    if args.iter().all(|a| *a == Arg::Inputs) {
        return Ok(());
    }
    Err(TaskFlowError::ConfigError(format!(
        "nested flow '{}' only accepts the whole input view as its argument",
        flow.name()
    )))
}
