// src/dataset/scope.rs

use ndarray::Axis;

use crate::dataset::label::{LabelOutput, LeafLabel};
use crate::errors::{Result, TaskFlowError};
use crate::forward::scope::ensure_flow_args;
use crate::precondition::Precondition;
use crate::scope::{Arg, FlowScope};
use crate::task::{Task, TaskFlow};
use crate::types::{child_prefix, join_path, Columns, Tensor};

/// [`FlowScope`] that looks up label rows of one sample instead of running
/// predictors. Leaf arguments are irrelevant here and ignored.
pub struct LabelScope<'a> {
    flow: &'a TaskFlow,
    labels: &'a Columns,
    index: usize,
    out: LabelOutput,
}

impl<'a> LabelScope<'a> {
    pub fn new(flow: &'a TaskFlow, labels: &'a Columns, index: usize, prefix: &str) -> Self {
        Self {
            flow,
            labels,
            index,
            out: LabelOutput::new(prefix),
        }
    }

    pub fn into_output(self) -> LabelOutput {
        self.out
    }
}

impl FlowScope for LabelScope<'_> {
    fn add_with(&mut self, task: &str, args: &[Arg]) -> Result<&mut dyn FlowScope> {
        let flow = self.flow;
        match flow.require_child(task)? {
            Task::Leaf(leaf) => {
                let path = join_path(self.out.prefix(), leaf.name());
                let column = self
                    .labels
                    .get(leaf.labels())
                    .ok_or_else(|| TaskFlowError::MissingLabel {
                        path: path.clone(),
                        column: leaf.labels().to_string(),
                    })?;
                let row = label_row(column, self.index)?;
                self.out.merge(LeafLabel { path, row })?;
            }
            Task::Flow(sub) => {
                ensure_flow_args(sub, args)?;
                let prefix = child_prefix(self.out.prefix(), sub.name());
                let child = sub.collect_labels(self.labels, self.index, &prefix)?;
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

/// Row `index` of a column, without its batch axis.
pub(crate) fn label_row(column: &Tensor, index: usize) -> Result<Tensor> {
    let len = column.shape().first().copied().ok_or_else(|| {
        TaskFlowError::ShapeMismatch("a column needs at least one axis".to_string())
    })?;
    if index >= len {
        return Err(TaskFlowError::IndexOutOfBounds { index, len });
    }
    Ok(column.index_axis(Axis(0), index).to_owned())
}
