// src/task/policy.rs

//! Pluggable per-leaf policies: predictor, activation, decoder, metrics and
//! the availability predicate.
//!
//! The graph engine never decides *which* policy a leaf uses. It only calls
//! whatever the leaf was constructed with. The built-ins below cover the
//! stock task flavors in [`crate::task::TaskKind`].

use ndarray::{Array1, Array2, Axis, Ix2};

use crate::errors::{Result, TaskFlowError};
use crate::types::{Mask, Tensor};

/// The trainable part of a leaf. Parameter updates happen elsewhere; the
/// engine only runs `forward`.
pub trait Predictor: Send + Sync {
    fn forward(&self, args: &[&Tensor]) -> Result<Tensor>;
}

impl<F> Predictor for F
where
    F: Fn(&[&Tensor]) -> Result<Tensor> + Send + Sync,
{
    fn forward(&self, args: &[&Tensor]) -> Result<Tensor> {
        self(args)
    }
}

/// Returns its first argument unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Predictor for Identity {
    fn forward(&self, args: &[&Tensor]) -> Result<Tensor> {
        args.first()
            .map(|t| (*t).clone())
            .ok_or_else(|| TaskFlowError::ShapeMismatch("identity predictor needs one input".into()))
    }
}

/// Fully connected layer with fixed weights: `y = x W^T + b`.
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Linear {
    /// `weight` has shape `(out_features, in_features)`.
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if weight.nrows() != bias.len() {
            return Err(TaskFlowError::ShapeMismatch(format!(
                "linear weight has {} rows but bias has {} entries",
                weight.nrows(),
                bias.len()
            )));
        }
        Ok(Self { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }
}

impl Predictor for Linear {
    fn forward(&self, args: &[&Tensor]) -> Result<Tensor> {
        let x = args
            .first()
            .ok_or_else(|| TaskFlowError::ShapeMismatch("linear predictor needs one input".into()))?;
        let x = x.view().into_dimensionality::<Ix2>().map_err(|_| {
            TaskFlowError::ShapeMismatch(format!(
                "linear predictor expects [batch, {}] input, got {:?}",
                self.in_features(),
                x.shape()
            ))
        })?;
        if x.ncols() != self.in_features() {
            return Err(TaskFlowError::ShapeMismatch(format!(
                "linear predictor expects {} features, got {}",
                self.in_features(),
                x.ncols()
            )));
        }
        let y = x.dot(&self.weight.t()) + &self.bias;
        Ok(y.into_dyn())
    }
}

/// Maps raw outputs to activated outputs (probabilities, bounded values...).
pub trait Activation: Send + Sync {
    fn activate(&self, logits: &Tensor) -> Tensor;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Activation for Sigmoid {
    fn activate(&self, logits: &Tensor) -> Tensor {
        logits.mapv(sigmoid)
    }
}

/// Softmax over the last axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Softmax;

impl Activation for Softmax {
    fn activate(&self, logits: &Tensor) -> Tensor {
        let mut out = logits.clone();
        if out.ndim() == 0 {
            return out.mapv(|_| 1.0);
        }
        let axis = Axis(out.ndim() - 1);
        for mut lane in out.lanes_mut(axis) {
            let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            lane.mapv_inplace(|v| (v - max).exp());
            let sum = lane.sum();
            if sum > 0.0 {
                lane.mapv_inplace(|v| v / sum);
            }
        }
        out
    }
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Maps activated outputs to hard predictions.
pub trait Decoder: Send + Sync {
    fn decode(&self, activated: &Tensor) -> Tensor;
}

/// `1.0` where the activated value exceeds the threshold, `0.0` elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct Threshold {
    pub at: f32,
}

impl Default for Threshold {
    fn default() -> Self {
        Self { at: 0.5 }
    }
}

impl Decoder for Threshold {
    fn decode(&self, activated: &Tensor) -> Tensor {
        activated.mapv(|v| if v > self.at { 1.0 } else { 0.0 })
    }
}

/// Class indices sorted by decreasing score along the last axis, so the
/// first column is the arg-max.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortDeclining;

impl Decoder for SortDeclining {
    fn decode(&self, activated: &Tensor) -> Tensor {
        let mut out = Tensor::zeros(activated.raw_dim());
        if activated.ndim() == 0 {
            return out;
        }
        let axis = Axis(activated.ndim() - 1);
        for (src, mut dst) in activated.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
            let mut order: Vec<usize> = (0..src.len()).collect();
            order.sort_by(|&a, &b| src[b].total_cmp(&src[a]));
            for (slot, idx) in dst.iter_mut().zip(order) {
                *slot = idx as f32;
            }
        }
        out
    }
}

/// Decides which samples carry a usable label for an ungated leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    /// Every sample counts.
    #[default]
    Always,
    /// A sample counts when all entries of its label row are `>= 0`;
    /// missing labels are encoded as negative values.
    PositiveValues,
}

impl Availability {
    pub fn mask(&self, targets: &Tensor) -> Mask {
        let batch = targets.shape().first().copied().unwrap_or(1);
        match self {
            Availability::Always => Mask::from_elem(batch, true),
            Availability::PositiveValues => {
                if targets.ndim() == 0 {
                    return Mask::from_elem(1, targets.iter().all(|&v| v >= 0.0));
                }
                targets
                    .axis_iter(Axis(0))
                    .map(|row| row.iter().all(|&v| v >= 0.0))
                    .collect()
            }
        }
    }
}

/// A named evaluation metric. Implementations live outside the engine; a
/// flow only collects them from its leaves.
pub trait Metric: Send + Sync {
    /// Score activated outputs against targets, restricted to `mask` when
    /// the leaf is gated.
    fn compute(&self, activated: &Tensor, targets: &Tensor, mask: Option<&Mask>) -> Result<f32>;
}
