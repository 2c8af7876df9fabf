// src/loss.rs

//! Per-leaf losses and the composite, mask-aware flow loss.
//!
//! A [`Loss`] always produces one value per sample; the mean reduction is
//! derived from it. [`FlowLoss`] walks the supervised leaves of a flow,
//! multiplies each leaf's per-sample loss by its mask and reduces by the
//! requested [`Reduction`]:
//! - gated leaves use the `precondition|<path>` mask of the forward pass,
//! - ungated leaves use their availability predicate on the targets.

use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::{Array1, Array2, Axis, Zip};
use tracing::{debug, trace};

use crate::errors::{Result, TaskFlowError};
use crate::forward::ReducedOutput;
use crate::task::leaf::LeafTask;
use crate::task::policy::sigmoid;
use crate::types::{Columns, Mask, Reduction, Tensor};

pub trait Loss: Send + Sync {
    /// One loss value per sample.
    fn per_sample(&self, logits: &Tensor, targets: &Tensor) -> Result<Array1<f32>>;

    fn mean(&self, logits: &Tensor, targets: &Tensor) -> Result<f32> {
        Ok(self.per_sample(logits, targets)?.mean().unwrap_or(0.0))
    }
}

/// Binary cross-entropy on raw logits (numerically stable form).
#[derive(Debug, Clone, Copy, Default)]
pub struct BceWithLogits;

impl Loss for BceWithLogits {
    fn per_sample(&self, logits: &Tensor, targets: &Tensor) -> Result<Array1<f32>> {
        elementwise(logits, targets, |x, y| x.max(0.0) - x * y + (1.0 + (-x.abs()).exp()).ln())
    }
}

/// Mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mse;

impl Loss for Mse {
    fn per_sample(&self, logits: &Tensor, targets: &Tensor) -> Result<Array1<f32>> {
        elementwise(logits, targets, |x, y| (x - y).powi(2))
    }
}

/// Sigmoid on the raw outputs, then mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigmoidMse;

impl Loss for SigmoidMse {
    fn per_sample(&self, logits: &Tensor, targets: &Tensor) -> Result<Array1<f32>> {
        elementwise(logits, targets, |x, y| (sigmoid(x) - y).powi(2))
    }
}

/// Softmax cross-entropy. Targets hold one class index per sample; a
/// negative index marks a missing label and yields a loss of `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropy;

impl Loss for CrossEntropy {
    fn per_sample(&self, logits: &Tensor, targets: &Tensor) -> Result<Array1<f32>> {
        let logits = as_rows(logits)?;
        let targets = as_rows(targets)?;
        if targets.ncols() != 1 || targets.nrows() != logits.nrows() {
            return Err(TaskFlowError::ShapeMismatch(format!(
                "cross-entropy expects [{}] class indices, got {:?}",
                logits.nrows(),
                targets.shape()
            )));
        }

        let classes = logits.ncols();
        let mut out = Array1::zeros(logits.nrows());
        for (i, row) in logits.axis_iter(Axis(0)).enumerate() {
            let target = targets[[i, 0]];
            if target < 0.0 {
                continue;
            }
            let class = target as usize;
            if class >= classes {
                return Err(TaskFlowError::ShapeMismatch(format!(
                    "class index {class} out of range for {classes} classes"
                )));
            }
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
            out[i] = log_sum - row[class];
        }
        Ok(out)
    }
}

/// View a tensor as `[batch, features]`.
fn as_rows(t: &Tensor) -> Result<Array2<f32>> {
    let batch = t.shape().first().copied().unwrap_or(1);
    let width: usize = t.shape().iter().skip(1).product();
    let rows = t
        .to_shape((batch, width))
        .map_err(|e| TaskFlowError::ShapeMismatch(format!("cannot view {:?} as rows: {e}", t.shape())))?;
    Ok(rows.to_owned())
}

fn elementwise<F>(logits: &Tensor, targets: &Tensor, f: F) -> Result<Array1<f32>>
where
    F: Fn(f32, f32) -> f32,
{
    let x = as_rows(logits)?;
    let y = as_rows(targets)?;
    if x.shape() != y.shape() {
        return Err(TaskFlowError::ShapeMismatch(format!(
            "outputs {:?} and targets {:?} differ",
            logits.shape(),
            targets.shape()
        )));
    }
    let width = x.ncols().max(1) as f32;
    let mut out = Array1::zeros(x.nrows());
    Zip::from(&mut out)
        .and(x.rows())
        .and(y.rows())
        .for_each(|o, xr, yr| {
            *o = xr.iter().zip(yr.iter()).map(|(&a, &b)| f(a, b)).sum::<f32>() / width;
        });
    Ok(out)
}

/// Result of a [`FlowLoss`] evaluation.
#[derive(Debug, Clone)]
pub enum LossValue {
    Mean {
        /// Sum of the per-leaf means.
        total: f32,
        per_leaf: BTreeMap<String, f32>,
    },
    PerSample {
        /// Masked per-sample losses; excluded samples hold `0.0`.
        per_leaf: BTreeMap<String, Array1<f32>>,
    },
}

impl LossValue {
    pub fn total(&self) -> Option<f32> {
        match self {
            LossValue::Mean { total, .. } => Some(*total),
            LossValue::PerSample { .. } => None,
        }
    }

    pub fn mean(&self, path: &str) -> Option<f32> {
        match self {
            LossValue::Mean { per_leaf, .. } => per_leaf.get(path).copied(),
            LossValue::PerSample { .. } => None,
        }
    }

    pub fn per_sample(&self, path: &str) -> Option<&Array1<f32>> {
        match self {
            LossValue::Mean { .. } => None,
            LossValue::PerSample { per_leaf } => per_leaf.get(path),
        }
    }
}

/// Loss of a flow: one entry per supervised leaf.
pub struct FlowLoss<'a> {
    leaves: Vec<(String, &'a LeafTask)>,
    reduction: Reduction,
}

impl<'a> FlowLoss<'a> {
    pub fn new(leaves: Vec<(String, &'a LeafTask)>, reduction: Reduction) -> Self {
        Self { leaves, reduction }
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// Loss handle of every supervised leaf, keyed by dotted path.
    pub fn leaf_losses(&self) -> BTreeMap<String, Arc<dyn Loss>> {
        self.leaves
            .iter()
            .filter_map(|(path, leaf)| leaf.loss().map(|l| (path.clone(), Arc::clone(l))))
            .collect()
    }

    /// Evaluate against a reduced forward output and the flat targets of a
    /// batch (`y` of the dataset, keyed by dotted path).
    pub fn compute(&self, outputs: &ReducedOutput, targets: &Columns) -> Result<LossValue> {
        let mut means = BTreeMap::new();
        let mut samples = BTreeMap::new();

        for (path, leaf) in &self.leaves {
            let Some(loss) = leaf.loss() else {
                trace!(path = %path, "leaf has no loss; skipping");
                continue;
            };
            let logits = outputs
                .logits(path)
                .ok_or_else(|| TaskFlowError::MissingField(path.clone()))?;
            let target = targets
                .get(path)
                .ok_or_else(|| TaskFlowError::MissingField(path.clone()))?;

            let per_sample = loss.per_sample(logits, target)?;
            let mask: Mask = match outputs.precondition(path) {
                Some(mask) => mask.clone(),
                None => leaf.availability().mask(target),
            };
            if mask.len() != per_sample.len() {
                return Err(TaskFlowError::ShapeMismatch(format!(
                    "mask for '{path}' has {} samples, loss has {}",
                    mask.len(),
                    per_sample.len()
                )));
            }

            let mut masked = per_sample;
            Zip::from(&mut masked).and(&mask).for_each(|v, &keep| {
                if !keep {
                    *v = 0.0;
                }
            });
            let selected = mask.iter().filter(|b| **b).count();

            match self.reduction {
                Reduction::Mean => {
                    let mean = if selected == 0 {
                        0.0
                    } else {
                        masked.sum() / selected as f32
                    };
                    debug!(path = %path, selected, mean, "leaf loss");
                    means.insert(path.clone(), mean);
                }
                Reduction::PerSample => {
                    samples.insert(path.clone(), masked);
                }
            }
        }

        Ok(match self.reduction {
            Reduction::Mean => LossValue::Mean {
                total: means.values().sum(),
                per_leaf: means,
            },
            Reduction::PerSample => LossValue::PerSample { per_leaf: samples },
        })
    }
}
