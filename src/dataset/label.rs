// src/dataset/label.rs

//! Label-side accumulator.
//!
//! Structurally mirrors [`crate::forward::CompositeOutput`]: the same paths
//! are written in the same order and gated by the same preconditions. The
//! difference is what is stored. Instead of tensors for a batch it holds the
//! label row of one sample per path, plus the ground-truth (`gt`) flags of
//! every task that was used as a gate.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::{Result, TaskFlowError};
use crate::precondition::{GateTable, Precondition};
use crate::types::{join_path, Columns, Tensor};

/// Label row of one leaf for one sample.
#[derive(Debug, Clone)]
pub struct LeafLabel {
    pub path: String,
    pub row: Tensor,
}

#[derive(Debug, Clone)]
pub enum LabelEntry {
    Leaf(LeafLabel),
    Composite(LabelOutput),
}

impl From<LeafLabel> for LabelEntry {
    fn from(label: LeafLabel) -> Self {
        LabelEntry::Leaf(label)
    }
}

impl From<LabelOutput> for LabelEntry {
    fn from(output: LabelOutput) -> Self {
        LabelEntry::Composite(output)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabelOutput {
    prefix: String,
    targets: Columns,
    gt: BTreeMap<String, bool>,
    gates: GateTable,
}

impl LabelOutput {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Union the entry's label rows into this accumulator. The `gt` flags
    /// of a nested flow are merged key by key rather than replaced.
    pub fn merge(&mut self, entry: impl Into<LabelEntry>) -> Result<&mut Self> {
        match entry.into() {
            LabelEntry::Leaf(label) => {
                self.gates.register(&label.path, None)?;
                self.targets.insert(label.path, label.row);
            }
            LabelEntry::Composite(child) => {
                if let Some(dup) = child.targets.keys().find(|p| self.gates.contains(p)) {
                    return Err(TaskFlowError::DuplicateKey(dup.clone()));
                }
                self.gates.merge(child.gates)?;
                self.targets.extend(child.targets);
                self.gt.extend(child.gt);
            }
        }
        Ok(self)
    }

    /// Gate the entries written by the most recent `merge`, and record the
    /// ground-truth flag of every task the precondition reads.
    ///
    /// The flags are the raw label values; negation is applied when the
    /// precondition is resolved, never here.
    pub fn attach(&mut self, precondition: Precondition) -> Result<&mut Self> {
        for source in precondition.sources() {
            let row = self
                .targets
                .get(source)
                .ok_or_else(|| TaskFlowError::MissingField(source.to_string()))?;
            let flag = row_flag(source, row)?;
            debug!(prefix = %self.prefix, source, flag, "recorded ground-truth flag");
            self.gt.insert(source.to_string(), flag);
        }
        self.gates.attach(precondition)?;
        Ok(self)
    }

    pub fn precondition_for(&self, task: &str) -> Precondition {
        self.gates.resolve(&join_path(&self.prefix, task))
    }

    pub fn targets(&self) -> &Columns {
        &self.targets
    }

    pub fn gt(&self) -> &BTreeMap<String, bool> {
        &self.gt
    }

    pub fn gates(&self) -> &GateTable {
        &self.gates
    }

    /// Split the root accumulator into targets, gt flags and the resolved
    /// availability of every gated path.
    pub fn finish(self) -> Result<(Columns, BTreeMap<String, bool>, BTreeMap<String, bool>)> {
        if !self.prefix.is_empty() {
            return Err(TaskFlowError::NotRoot(self.prefix));
        }
        let mut available = BTreeMap::new();
        for (path, precondition) in self.gates.gated() {
            let mask = precondition.to_mask(&self.gt)?;
            available.insert(path.to_string(), mask.iter().all(|b| *b));
        }
        Ok((self.targets, self.gt, available))
    }
}

/// A gate label must be a single value per sample; non-zero means `true`.
fn row_flag(path: &str, row: &Tensor) -> Result<bool> {
    if row.len() != 1 {
        return Err(TaskFlowError::ShapeMismatch(format!(
            "label of gate task '{path}' has shape {:?}; expected a single value",
            row.shape()
        )));
    }
    Ok(row.iter().any(|&v| v != 0.0))
}
