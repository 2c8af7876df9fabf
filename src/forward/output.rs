// src/forward/output.rs

//! Forward-pass accumulators.
//!
//! A [`CompositeOutput`] is created fresh for every flow evaluation. Each
//! `merge` writes raw, activated and decoded tensors under new dotted paths
//! (a path may only be written once), and `attach` gates whatever was merged
//! last. The root accumulator is finally `reduce`d into a flat
//! [`ReducedOutput`], which is what loss, metric and interpretation code
//! consume.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::errors::{Result, TaskFlowError};
use crate::precondition::{GateTable, MaskSource, Precondition};
use crate::types::{join_path, precondition_key, Mask, Tensor};

/// Output of one leaf for one batch.
#[derive(Debug, Clone)]
pub struct LeafOutput {
    pub path: String,
    pub logits: Tensor,
    pub activated: Tensor,
    pub decoded: Tensor,
}

/// Anything that can be merged into a [`CompositeOutput`].
#[derive(Debug, Clone)]
pub enum TaskOutput {
    Leaf(LeafOutput),
    Composite(CompositeOutput),
}

impl From<LeafOutput> for TaskOutput {
    fn from(output: LeafOutput) -> Self {
        TaskOutput::Leaf(output)
    }
}

impl From<CompositeOutput> for TaskOutput {
    fn from(output: CompositeOutput) -> Self {
        TaskOutput::Composite(output)
    }
}

/// Accumulator for one flow evaluation.
#[derive(Debug, Clone, Default)]
pub struct CompositeOutput {
    prefix: String,
    logits: BTreeMap<String, Tensor>,
    activated: BTreeMap<String, Tensor>,
    decoded: BTreeMap<String, Tensor>,
    gates: GateTable,
}

impl CompositeOutput {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Copy every entry of `output` into this accumulator.
    ///
    /// Fails with [`TaskFlowError::DuplicateKey`] if any path is already
    /// present; in that case nothing is written.
    pub fn merge(&mut self, output: impl Into<TaskOutput>) -> Result<&mut Self> {
        match output.into() {
            TaskOutput::Leaf(leaf) => {
                if self.logits.contains_key(&leaf.path) {
                    return Err(TaskFlowError::DuplicateKey(leaf.path));
                }
                self.gates.register(&leaf.path, None)?;
                debug!(prefix = %self.prefix, path = %leaf.path, "merged leaf output");
                self.logits.insert(leaf.path.clone(), leaf.logits);
                self.activated.insert(leaf.path.clone(), leaf.activated);
                self.decoded.insert(leaf.path, leaf.decoded);
            }
            TaskOutput::Composite(child) => {
                if let Some(dup) = child.logits.keys().find(|p| self.gates.contains(p)) {
                    return Err(TaskFlowError::DuplicateKey(dup.clone()));
                }
                debug!(
                    prefix = %self.prefix,
                    child = %child.prefix,
                    paths = child.logits.len(),
                    "merged composite output"
                );
                self.gates.merge(child.gates)?;
                self.logits.extend(child.logits);
                self.activated.extend(child.activated);
                self.decoded.extend(child.decoded);
            }
        }
        Ok(self)
    }

    /// Gate the entries written by the most recent `merge`. An entry that is
    /// already gated keeps its precondition, ANDed with the new one.
    pub fn attach(&mut self, precondition: Precondition) -> Result<&mut Self> {
        trace!(
            prefix = %self.prefix,
            targets = ?self.gates.last_added(),
            precondition = %precondition,
            "attaching precondition"
        );
        self.gates.attach(precondition)?;
        Ok(self)
    }

    /// Precondition reading the output of `task` (relative to this flow).
    ///
    /// An ungated task yields a plain leaf precondition; a gated one is
    /// wrapped so that its own gate is inherited.
    pub fn precondition_for(&self, task: &str) -> Precondition {
        self.gates.resolve(&join_path(&self.prefix, task))
    }

    pub fn logits(&self) -> &BTreeMap<String, Tensor> {
        &self.logits
    }

    pub fn activated(&self) -> &BTreeMap<String, Tensor> {
        &self.activated
    }

    pub fn decoded(&self) -> &BTreeMap<String, Tensor> {
        &self.decoded
    }

    pub fn precondition(&self, path: &str) -> Option<&Precondition> {
        self.gates.get(path)
    }

    pub fn gates(&self) -> &GateTable {
        &self.gates
    }

    /// Flatten the root accumulator, resolving every precondition against
    /// `data` (ground truth, or decoded predictions when there is none).
    pub fn reduce(self, data: Option<&dyn MaskSource>) -> Result<ReducedOutput> {
        if !self.prefix.is_empty() {
            return Err(TaskFlowError::NotRoot(self.prefix));
        }

        let mut preconditions = BTreeMap::new();
        for (path, precondition) in self.gates.gated() {
            let mask = match data {
                Some(source) => precondition.to_mask(source)?,
                None => precondition.to_mask(&self.decoded)?,
            };
            if let Some(batch) = self.logits.get(path).and_then(|t| t.shape().first()) {
                if *batch != mask.len() {
                    return Err(TaskFlowError::ShapeMismatch(format!(
                        "precondition for '{path}' has {} samples, output has {batch}",
                        mask.len()
                    )));
                }
            }
            preconditions.insert(path.to_string(), mask);
        }

        Ok(ReducedOutput {
            logits: self.logits,
            activated: self.activated,
            decoded: self.decoded,
            preconditions,
        })
    }
}

/// One value of the flat reduced mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    Tensor(Tensor),
    Mask(Mask),
}

/// Flattened root output of a forward pass.
#[derive(Debug, Clone)]
pub struct ReducedOutput {
    logits: BTreeMap<String, Tensor>,
    activated: BTreeMap<String, Tensor>,
    decoded: BTreeMap<String, Tensor>,
    /// Resolved mask for every gated path; ungated paths are absent.
    preconditions: BTreeMap<String, Mask>,
}

impl ReducedOutput {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.logits.keys().map(|s| s.as_str())
    }

    pub fn logits(&self, path: &str) -> Option<&Tensor> {
        self.logits.get(path)
    }

    pub fn activated(&self, path: &str) -> Option<&Tensor> {
        self.activated.get(path)
    }

    pub fn decoded(&self, path: &str) -> Option<&Tensor> {
        self.decoded.get(path)
    }

    pub fn precondition(&self, path: &str) -> Option<&Mask> {
        self.preconditions.get(path)
    }

    pub fn preconditions(&self) -> &BTreeMap<String, Mask> {
        &self.preconditions
    }

    pub fn all_logits(&self) -> &BTreeMap<String, Tensor> {
        &self.logits
    }

    pub fn all_activated(&self) -> &BTreeMap<String, Tensor> {
        &self.activated
    }

    pub fn all_decoded(&self) -> &BTreeMap<String, Tensor> {
        &self.decoded
    }

    /// `{path: raw output}` plus `{"precondition|" + path: mask}` for every
    /// gated path.
    pub fn flatten(&self) -> BTreeMap<String, FlatValue> {
        let mut out: BTreeMap<String, FlatValue> = self
            .logits
            .iter()
            .map(|(k, v)| (k.clone(), FlatValue::Tensor(v.clone())))
            .collect();
        for (path, mask) in &self.preconditions {
            out.insert(precondition_key(path), FlatValue::Mask(mask.clone()));
        }
        out
    }
}
