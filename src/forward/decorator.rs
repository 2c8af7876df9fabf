// src/forward/decorator.rs

//! Execution of a single leaf inside a flow.

use tracing::trace;

use crate::errors::Result;
use crate::forward::output::LeafOutput;
use crate::precondition::GroundTruth;
use crate::task::leaf::LeafTask;
use crate::types::{join_path, Mask, Mode, Tensor};

/// Wraps one leaf's predictor and policies under its dotted path.
pub struct ModuleDecorator<'a> {
    leaf: &'a LeafTask,
    path: String,
}

impl<'a> ModuleDecorator<'a> {
    pub fn new(leaf: &'a LeafTask, prefix: &str) -> Self {
        Self {
            leaf,
            path: join_path(prefix, leaf.name()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run predictor, activation and decoder.
    ///
    /// In [`Mode::Training`], if `gt` holds a value for this leaf's path the
    /// decoded output is taken from it instead of the decoder, so tasks gated
    /// on this one train against the true gate rather than a predicted one.
    pub fn forward(
        &self,
        args: &[&Tensor],
        gt: Option<&GroundTruth>,
        mode: Mode,
    ) -> Result<LeafOutput> {
        let logits = self.leaf.predictor().forward(args)?;
        let activated = match self.leaf.activation() {
            Some(activation) => activation.activate(&logits),
            None => logits.clone(),
        };

        let forced = match (mode, gt.and_then(|gt| gt.get(&self.path))) {
            (Mode::Training, Some(mask)) => {
                trace!(path = %self.path, "decoded output taken from ground truth");
                Some(mask_as_tensor(mask, &activated))
            }
            _ => None,
        };

        let decoded = match forced {
            Some(decoded) => decoded,
            None => match self.leaf.decoder() {
                Some(decoder) => decoder.decode(&activated),
                None => activated.clone(),
            },
        };

        Ok(LeafOutput {
            path: self.path.clone(),
            logits,
            activated,
            decoded,
        })
    }
}

/// `1.0`/`0.0` tensor shaped like `like` when the element counts agree,
/// otherwise a plain `[batch]` vector.
fn mask_as_tensor(mask: &Mask, like: &Tensor) -> Tensor {
    let flat = mask.mapv(|b| if b { 1.0 } else { 0.0 });
    if like.len() == flat.len() {
        if let Ok(shaped) = flat.clone().into_shape_with_order(like.raw_dim()) {
            return shaped;
        }
    }
    flat.into_dyn()
}
