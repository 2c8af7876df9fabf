// src/precondition.rs

//! Gating masks ("preconditions") and the per-accumulator table that records
//! which dotted path is gated by what.
//!
//! A [`Precondition`] is a lazy description of a boolean mask. It is only
//! turned into an actual [`Mask`] when resolved against a [`MaskSource`]:
//! ground truth during training, decoded predictions at inference time, or a
//! single dataset sample's ground truth.
//!
//! A path with no precondition is "always available". That case is
//! represented by the *absence* of a precondition, never by an all-true
//! buffer.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitAnd, Not};

use ndarray::Array1;
use tracing::trace;

use crate::errors::{Result, TaskFlowError};
use crate::types::{Mask, Tensor};

/// Ground-truth masks keyed by dotted path, one boolean per sample.
pub type GroundTruth = BTreeMap<String, Mask>;

/// Anything a precondition can read boolean fields from.
pub trait MaskSource {
    /// Boolean value of the field `path` for every sample.
    fn mask(&self, path: &str) -> Result<Mask>;
}

impl MaskSource for BTreeMap<String, Mask> {
    fn mask(&self, path: &str) -> Result<Mask> {
        self.get(path)
            .cloned()
            .ok_or_else(|| TaskFlowError::MissingField(path.to_string()))
    }
}

/// Decoded predictions: every sample must hold exactly one value, and any
/// non-zero value counts as `true`.
impl MaskSource for BTreeMap<String, Tensor> {
    fn mask(&self, path: &str) -> Result<Mask> {
        let tensor = self
            .get(path)
            .ok_or_else(|| TaskFlowError::MissingField(path.to_string()))?;
        tensor_to_mask(path, tensor)
    }
}

/// Ground truth of a single dataset sample, seen as a batch of one.
impl MaskSource for BTreeMap<String, bool> {
    fn mask(&self, path: &str) -> Result<Mask> {
        self.get(path)
            .map(|&flag| Array1::from_elem(1, flag))
            .ok_or_else(|| TaskFlowError::MissingField(path.to_string()))
    }
}

/// Convert a `[batch]` or `[batch, 1]` tensor into a mask.
pub fn tensor_to_mask(path: &str, tensor: &Tensor) -> Result<Mask> {
    let batch = tensor.shape().first().copied().unwrap_or(1);
    if tensor.len() != batch {
        return Err(TaskFlowError::ShapeMismatch(format!(
            "'{path}' has shape {:?}; a mask field needs one value per sample",
            tensor.shape()
        )));
    }
    Ok(tensor.iter().map(|&v| v != 0.0).collect())
}

/// Lazily-evaluated boolean gating mask.
#[derive(Debug, Clone, PartialEq)]
pub enum Precondition {
    /// The named field itself.
    Leaf { path: String },
    /// Logical NOT of the wrapped precondition.
    Negated(Box<Precondition>),
    /// The parent mask with every sample whose own field is false cleared.
    Nested {
        path: String,
        parent: Box<Precondition>,
    },
    /// Elementwise AND of two preconditions.
    And(Box<Precondition>, Box<Precondition>),
}

impl Precondition {
    pub fn leaf(path: impl Into<String>) -> Self {
        Precondition::Leaf { path: path.into() }
    }

    pub fn nested(path: impl Into<String>, parent: Precondition) -> Self {
        Precondition::Nested {
            path: path.into(),
            parent: Box::new(parent),
        }
    }

    pub fn negate(self) -> Self {
        Precondition::Negated(Box::new(self))
    }

    pub fn and(self, other: Precondition) -> Self {
        Precondition::And(Box::new(self), Box::new(other))
    }

    /// Resolve into a concrete mask.
    pub fn to_mask(&self, data: &dyn MaskSource) -> Result<Mask> {
        let mask = match self {
            Precondition::Leaf { path } => data.mask(path)?,
            Precondition::Negated(inner) => inner.to_mask(data)?.mapv(|b| !b),
            Precondition::Nested { path, parent } => {
                let mut mask = parent.to_mask(data)?;
                let own = data.mask(path)?;
                ensure_same_len(&mask, &own, path)?;
                mask.zip_mut_with(&own, |m, &o| {
                    if !o {
                        *m = false;
                    }
                });
                mask
            }
            Precondition::And(lhs, rhs) => {
                let mut mask = lhs.to_mask(data)?;
                let other = rhs.to_mask(data)?;
                ensure_same_len(&mask, &other, &self.to_string())?;
                mask.zip_mut_with(&other, |m, &o| *m = *m && o);
                mask
            }
        };
        trace!(precondition = %self, selected = mask.iter().filter(|b| **b).count(), "resolved mask");
        Ok(mask)
    }

    /// Every field path this precondition reads, in first-seen order.
    pub fn sources(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_sources(&mut out);
        out
    }

    fn collect_sources<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Precondition::Leaf { path } => push_unique(out, path),
            Precondition::Negated(inner) => inner.collect_sources(out),
            Precondition::Nested { path, parent } => {
                parent.collect_sources(out);
                push_unique(out, path);
            }
            Precondition::And(lhs, rhs) => {
                lhs.collect_sources(out);
                rhs.collect_sources(out);
            }
        }
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, path: &'a str) {
    if !out.contains(&path) {
        out.push(path);
    }
}

fn ensure_same_len(a: &Mask, b: &Mask, what: &str) -> Result<()> {
    if a.len() != b.len() {
        return Err(TaskFlowError::ShapeMismatch(format!(
            "masks for '{what}' have {} and {} samples",
            a.len(),
            b.len()
        )));
    }
    Ok(())
}

impl Not for Precondition {
    type Output = Precondition;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

impl BitAnd for Precondition {
    type Output = Precondition;

    fn bitand(self, rhs: Precondition) -> Self::Output {
        self.and(rhs)
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precondition::Leaf { path } => write!(f, "{path}"),
            Precondition::Negated(inner) => write!(f, "~{inner}"),
            Precondition::Nested { path, parent } => write!(f, "({parent} & {path})"),
            Precondition::And(lhs, rhs) => write!(f, "({lhs} & {rhs})"),
        }
    }
}

/// Per-accumulator record of which paths exist and how they are gated.
///
/// Both the forward-pass accumulator and the label accumulator keep one of
/// these, so a flow definition sees identical preconditions in both passes.
#[derive(Debug, Clone, Default)]
pub struct GateTable {
    entries: BTreeMap<String, Option<Precondition>>,
    /// Paths written by the most recent merge; `attach` targets these.
    last_added: Vec<String>,
}

impl GateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single new path as the latest addition.
    pub fn register(&mut self, path: &str, precondition: Option<Precondition>) -> Result<()> {
        self.last_added.clear();
        self.insert(path, precondition)
    }

    /// Absorb every entry of a child table; all of them become the latest
    /// addition.
    pub fn merge(&mut self, other: GateTable) -> Result<()> {
        self.last_added.clear();
        for (path, precondition) in other.entries {
            self.insert(&path, precondition)?;
        }
        Ok(())
    }

    fn insert(&mut self, path: &str, precondition: Option<Precondition>) -> Result<()> {
        if self.entries.contains_key(path) {
            return Err(TaskFlowError::DuplicateKey(path.to_string()));
        }
        self.entries.insert(path.to_string(), precondition);
        self.last_added.push(path.to_string());
        Ok(())
    }

    /// Gate the most recently merged paths.
    ///
    /// A path that already carries a precondition (inherited from a nested
    /// flow) keeps it, ANDed with the new one.
    pub fn attach(&mut self, precondition: Precondition) -> Result<()> {
        if self.last_added.is_empty() {
            return Err(TaskFlowError::GateWithoutTarget);
        }
        for path in &self.last_added {
            let slot = self
                .entries
                .get_mut(path)
                .ok_or_else(|| TaskFlowError::MissingField(path.clone()))?;
            *slot = Some(match slot.take() {
                None => precondition.clone(),
                Some(existing) => existing.and(precondition.clone()),
            });
        }
        Ok(())
    }

    /// Precondition that reads `path` as a gate for a later task.
    pub fn resolve(&self, path: &str) -> Precondition {
        match self.entries.get(path) {
            Some(Some(parent)) => Precondition::nested(path, parent.clone()),
            _ => Precondition::leaf(path),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Precondition> {
        self.entries.get(path).and_then(|p| p.as_ref())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn last_added(&self) -> &[String] {
        &self.last_added
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Only the paths that carry a precondition.
    pub fn gated(&self) -> impl Iterator<Item = (&str, &Precondition)> {
        self.entries
            .iter()
            .filter_map(|(path, p)| p.as_ref().map(|p| (path.as_str(), p)))
    }
}
