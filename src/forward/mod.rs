// src/forward/mod.rs

//! Forward pass over a task graph.
//!
//! - [`output`] holds the accumulators (`CompositeOutput`) and the flat
//!   `ReducedOutput`.
//! - [`decorator`] runs a single leaf (`ModuleDecorator`).
//! - [`scope`] is the `FlowScope` implementation that drives both.
//! - [`inputs`] is the input view (`FlowInputs`).

pub mod decorator;
pub mod inputs;
pub mod output;
pub mod scope;

pub use decorator::ModuleDecorator;
pub use inputs::FlowInputs;
pub use output::{CompositeOutput, FlatValue, LeafOutput, ReducedOutput, TaskOutput};
pub use scope::ForwardScope;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::precondition::MaskSource;
use crate::task::TaskFlow;
use crate::types::Mode;

impl TaskFlow {
    /// Evaluate this flow under `prefix` without reducing.
    pub fn evaluate(&self, inputs: &FlowInputs, mode: Mode, prefix: &str) -> Result<CompositeOutput> {
        let mut scope = ForwardScope::new(self, inputs, mode, prefix);
        self.run_flow(&mut scope)?;
        Ok(scope.into_output())
    }

    /// Full forward pass from the root.
    ///
    /// Gating masks are resolved against the ground truth carried by
    /// `inputs` when present, otherwise against the decoded predictions.
    pub fn forward(&self, inputs: &FlowInputs, mode: Mode) -> Result<ReducedOutput> {
        let output = self.evaluate(inputs, mode, "")?;

        let source: Option<&dyn MaskSource> = match inputs.ground_truth() {
            Some(gt) => Some(gt),
            None => {
                if mode == Mode::Training && output.gates().gated().next().is_some() {
                    warn!(
                        flow = %self.name(),
                        "training forward pass without ground truth; masks use decoded predictions"
                    );
                }
                None
            }
        };

        let reduced = output.reduce(source)?;
        debug!(
            flow = %self.name(),
            paths = reduced.all_logits().len(),
            gated = reduced.preconditions().len(),
            "forward pass reduced"
        );
        Ok(reduced)
    }
}
