// src/task/composite.rs

//! Activation and decoder of a whole (sub)graph.
//!
//! Both work on flat `{dotted path: tensor}` maps, the same shape that
//! [`crate::forward::ReducedOutput`] publishes, and apply each leaf's own
//! policy to its entry. A leaf without a policy passes its tensor through.

use std::collections::BTreeMap;

use crate::errors::{Result, TaskFlowError};
use crate::task::leaf::LeafTask;
use crate::types::Tensor;

pub struct CompositeActivation<'a> {
    leaves: Vec<(String, &'a LeafTask)>,
}

impl<'a> CompositeActivation<'a> {
    pub fn new(leaves: Vec<(String, &'a LeafTask)>) -> Self {
        Self { leaves }
    }

    pub fn apply(&self, logits: &BTreeMap<String, Tensor>) -> Result<BTreeMap<String, Tensor>> {
        let mut out = BTreeMap::new();
        for (path, leaf) in &self.leaves {
            let raw = logits
                .get(path)
                .ok_or_else(|| TaskFlowError::MissingField(path.clone()))?;
            let activated = match leaf.activation() {
                Some(activation) => activation.activate(raw),
                None => raw.clone(),
            };
            out.insert(path.clone(), activated);
        }
        Ok(out)
    }
}

pub struct CompositeDecoder<'a> {
    leaves: Vec<(String, &'a LeafTask)>,
}

impl<'a> CompositeDecoder<'a> {
    pub fn new(leaves: Vec<(String, &'a LeafTask)>) -> Self {
        Self { leaves }
    }

    pub fn apply(&self, activated: &BTreeMap<String, Tensor>) -> Result<BTreeMap<String, Tensor>> {
        let mut out = BTreeMap::new();
        for (path, leaf) in &self.leaves {
            let value = activated
                .get(path)
                .ok_or_else(|| TaskFlowError::MissingField(path.clone()))?;
            let decoded = match leaf.decoder() {
                Some(decoder) => decoder.decode(value),
                None => value.clone(),
            };
            out.insert(path.clone(), decoded);
        }
        Ok(out)
    }
}
