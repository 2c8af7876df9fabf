// src/types.rs

//! Shared tensor aliases, enums and dotted-path helpers.

use std::collections::BTreeMap;
use std::str::FromStr;

use ndarray::{Array1, ArrayD};
use serde::Deserialize;

/// Batched numeric tensor. Axis 0 is always the batch (or sample) axis.
pub type Tensor = ArrayD<f32>;

/// One boolean per sample in a batch.
pub type Mask = Array1<bool>;

/// Named columns of equal length, e.g. dataset inputs or labels.
pub type Columns = BTreeMap<String, Tensor>;

/// Key prefix used by [`crate::forward::ReducedOutput`] for mask entries.
pub const PRECONDITION_PREFIX: &str = "precondition|";

/// Fully-qualified name of a task: its parent prefix plus its own name.
pub fn join_path(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

/// Prefix handed to the children of a nested flow called `name`.
pub fn child_prefix(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}.")
}

/// Flat key under which the mask for `path` is published.
pub fn precondition_key(path: &str) -> String {
    format!("{PRECONDITION_PREFIX}{path}")
}

/// How per-sample losses are reduced.
///
/// - `Mean`: a single scalar per leaf (and a total over leaves).
/// - `PerSample`: one value per sample, masked samples report `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Mean,
    PerSample,
}

impl Default for Reduction {
    fn default() -> Self {
        Reduction::Mean
    }
}

impl FromStr for Reduction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Reduction::Mean),
            "per_sample" | "none" => Ok(Reduction::PerSample),
            other => Err(format!(
                "invalid loss_reduction: {other} (expected \"mean\" or \"per_sample\")"
            )),
        }
    }
}

/// Whether a forward pass runs for training or inference.
///
/// In `Training` mode a leaf whose ground truth is present in the inputs
/// takes its decoded output from that ground truth (teacher forcing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}
