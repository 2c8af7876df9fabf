// src/dataset/flow_dataset.rs

use std::collections::BTreeMap;

use ndarray::{stack, ArrayView, Axis, IxDyn};
use tracing::{debug, info};

use crate::dataset::scope::label_row;
use crate::errors::{Result, TaskFlowError};
use crate::forward::FlowInputs;
use crate::precondition::GroundTruth;
use crate::task::TaskFlow;
use crate::types::{Columns, Mask, Tensor};

/// One training example.
///
/// `inputs` and `gt` together are the `X` of the example; `targets` is `y`,
/// one label row per leaf keyed by dotted path. Labels are always present,
/// whatever the gates say: masking happens downstream.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub inputs: Columns,
    /// Ground-truth flag of every task used as a gate.
    pub gt: BTreeMap<String, bool>,
    pub targets: Columns,
    /// Resolved availability of every gated path.
    pub available: BTreeMap<String, bool>,
}

/// Several samples stacked along a new batch axis.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub inputs: Columns,
    pub gt: GroundTruth,
    pub targets: Columns,
    pub available: GroundTruth,
}

impl Batch {
    pub fn collate(samples: &[Sample]) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Ok(Self::default());
        };
        Ok(Self {
            inputs: stack_columns(samples, first.inputs.keys(), |s| &s.inputs)?,
            gt: stack_flags(samples, first.gt.keys(), |s| &s.gt)?,
            targets: stack_columns(samples, first.targets.keys(), |s| &s.targets)?,
            available: stack_flags(samples, first.available.keys(), |s| &s.available)?,
        })
    }

    pub fn len(&self) -> usize {
        self.targets
            .values()
            .next()
            .and_then(|t| t.shape().first().copied())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Input view for a forward pass, tagged with this batch's ground truth.
    pub fn flow_inputs(&self) -> FlowInputs {
        FlowInputs::new(self.inputs.clone()).with_ground_truth(self.gt.clone())
    }
}

fn stack_columns<'a, K, F>(samples: &[Sample], keys: K, field: F) -> Result<Columns>
where
    K: Iterator<Item = &'a String>,
    F: Fn(&Sample) -> &Columns,
{
    let mut out = Columns::new();
    for key in keys {
        let views = samples
            .iter()
            .map(|s| {
                field(s)
                    .get(key)
                    .map(|t| t.view())
                    .ok_or_else(|| TaskFlowError::MissingField(key.clone()))
            })
            .collect::<Result<Vec<ArrayView<f32, IxDyn>>>>()?;
        let stacked = stack(Axis(0), &views)
            .map_err(|e| TaskFlowError::ShapeMismatch(format!("cannot stack '{key}': {e}")))?;
        out.insert(key.clone(), stacked);
    }
    Ok(out)
}

fn stack_flags<'a, K, F>(samples: &[Sample], keys: K, field: F) -> Result<GroundTruth>
where
    K: Iterator<Item = &'a String>,
    F: Fn(&Sample) -> &BTreeMap<String, bool>,
{
    let mut out = GroundTruth::new();
    for key in keys {
        let mask = samples
            .iter()
            .map(|s| {
                field(s)
                    .get(key)
                    .copied()
                    .ok_or_else(|| TaskFlowError::MissingField(key.clone()))
            })
            .collect::<Result<Mask>>()?;
        out.insert(key.clone(), mask);
    }
    Ok(out)
}

/// Dataset view of a task flow: walks the same topology as the forward pass
/// but reads label rows instead of running predictors.
#[derive(Debug, Clone)]
pub struct FlowDataset {
    flow: TaskFlow,
    inputs: Columns,
    labels: Columns,
    len: usize,
}

impl FlowDataset {
    /// Bind a flow to its input and label columns.
    ///
    /// Every leaf's label column and declared input columns must exist and
    /// all columns must have the same length; the flow definition is traced
    /// once so structural errors surface here rather than on first access.
    pub fn new(flow: TaskFlow, inputs: Columns, labels: Columns) -> Result<Self> {
        let mut len: Option<(String, usize)> = None;
        let mut check_len = |column: &str, tensor: &Tensor| -> Result<()> {
            let rows = tensor.shape().first().copied().ok_or_else(|| {
                TaskFlowError::ShapeMismatch(format!("column '{column}' has no batch axis"))
            })?;
            match len {
                None => len = Some((column.to_string(), rows)),
                Some((_, expected)) if expected != rows => {
                    return Err(TaskFlowError::LengthMismatch {
                        column: column.to_string(),
                        expected,
                        actual: rows,
                    });
                }
                Some(_) => {}
            }
            Ok(())
        };

        let leaves = flow.all_children();
        for (path, leaf) in &leaves {
            let column = labels
                .get(leaf.labels())
                .ok_or_else(|| TaskFlowError::MissingLabel {
                    path: path.clone(),
                    column: leaf.labels().to_string(),
                })?;
            check_len(leaf.labels(), column)?;

            for input in leaf.inputs() {
                let tensor = inputs.get(input).ok_or_else(|| TaskFlowError::MissingInput {
                    path: path.clone(),
                    column: input.clone(),
                })?;
                check_len(input, tensor)?;
            }
        }
        for (name, tensor) in &inputs {
            check_len(name, tensor)?;
        }

        flow.trace()?;

        let len = len.map(|(_, n)| n).unwrap_or(0);
        info!(flow = %flow.name(), leaves = leaves.len(), len, "flow dataset ready");

        Ok(Self {
            flow,
            inputs,
            labels,
            len,
        })
    }

    pub fn flow(&self) -> &TaskFlow {
        &self.flow
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Example `index`: its input rows, gt flags and label rows.
    pub fn get(&self, index: usize) -> Result<Sample> {
        if index >= self.len {
            return Err(TaskFlowError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }

        let labels = self.flow.collect_labels(&self.labels, index, "")?;
        let (targets, gt, available) = labels.finish()?;

        let mut inputs = Columns::new();
        for (name, column) in &self.inputs {
            inputs.insert(name.clone(), label_row(column, index)?);
        }

        debug!(index, targets = targets.len(), gt = gt.len(), "dataset sample");
        Ok(Sample {
            inputs,
            gt,
            targets,
            available,
        })
    }

    /// Collate the given examples into one batch.
    pub fn batch(&self, indices: &[usize]) -> Result<Batch> {
        let samples = indices
            .iter()
            .map(|&i| self.get(i))
            .collect::<Result<Vec<_>>>()?;
        Batch::collate(&samples)
    }
}
