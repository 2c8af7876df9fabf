// src/task/flavor.rs

//! Stock leaf flavors.
//!
//! A flavor is just a bundle of policies. Every leaf has the same shape;
//! "binary" vs "regression" only changes which activation, decoder, loss
//! and availability predicate the leaf starts with.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::loss::{BceWithLogits, CrossEntropy, Loss, Mse, SigmoidMse};
use crate::task::policy::{Activation, Availability, Decoder, Sigmoid, Softmax, SortDeclining, Threshold};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Sigmoid, threshold at 0.5, BCE with logits.
    Binary,
    /// A binary value that is given rather than learned: no activation,
    /// threshold at 0.5, no loss.
    BinaryHardcoded,
    /// Softmax, indices sorted by score, cross-entropy.
    Classification,
    /// Raw outputs, MSE.
    Regression,
    /// Sigmoid-bounded outputs in `[0, 1]`, sigmoid-then-MSE loss.
    BoundedRegression,
}

impl TaskKind {
    pub fn flavor(self) -> Flavor {
        match self {
            TaskKind::Binary => Flavor {
                activation: Some(Arc::new(Sigmoid)),
                decoder: Some(Arc::new(Threshold::default())),
                loss: Some(Arc::new(BceWithLogits)),
                availability: Availability::PositiveValues,
            },
            TaskKind::BinaryHardcoded => Flavor {
                activation: None,
                decoder: Some(Arc::new(Threshold::default())),
                loss: None,
                availability: Availability::PositiveValues,
            },
            TaskKind::Classification => Flavor {
                activation: Some(Arc::new(Softmax)),
                decoder: Some(Arc::new(SortDeclining)),
                loss: Some(Arc::new(CrossEntropy)),
                availability: Availability::PositiveValues,
            },
            TaskKind::Regression => Flavor {
                activation: None,
                decoder: None,
                loss: Some(Arc::new(Mse)),
                availability: Availability::Always,
            },
            TaskKind::BoundedRegression => Flavor {
                activation: Some(Arc::new(Sigmoid)),
                decoder: None,
                loss: Some(Arc::new(SigmoidMse)),
                availability: Availability::Always,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Binary => "binary",
            TaskKind::BinaryHardcoded => "binary_hardcoded",
            TaskKind::Classification => "classification",
            TaskKind::Regression => "regression",
            TaskKind::BoundedRegression => "bounded_regression",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binary" => Ok(TaskKind::Binary),
            "binary_hardcoded" => Ok(TaskKind::BinaryHardcoded),
            "classification" => Ok(TaskKind::Classification),
            "regression" => Ok(TaskKind::Regression),
            "bounded_regression" => Ok(TaskKind::BoundedRegression),
            other => Err(format!("unknown task kind: {other}")),
        }
    }
}

/// Policy bundle attached to a leaf.
#[derive(Clone)]
pub struct Flavor {
    pub activation: Option<Arc<dyn Activation>>,
    pub decoder: Option<Arc<dyn Decoder>>,
    /// `None` means the leaf is never supervised (e.g. hard-coded inputs).
    pub loss: Option<Arc<dyn Loss>>,
    pub availability: Availability,
}

impl fmt::Debug for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flavor")
            .field("activation", &self.activation.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("loss", &self.loss.is_some())
            .field("availability", &self.availability)
            .finish()
    }
}
