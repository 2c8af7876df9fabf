// src/dataset/mod.rs

//! Label side of a task graph.
//!
//! The same flow definition that drives the forward pass is run by a
//! [`LabelScope`] to assemble one sample's targets and ground-truth flags.
//! Because the traversal is shared, every target lands on the same dotted
//! path as the prediction it is compared with.

pub mod flow_dataset;
pub mod label;
pub mod scope;

pub use flow_dataset::{Batch, FlowDataset, Sample};
pub use label::{LabelEntry, LabelOutput, LeafLabel};
pub use scope::LabelScope;

use crate::errors::Result;
use crate::task::TaskFlow;
use crate::types::Columns;

impl TaskFlow {
    /// Label rows of sample `index`, collected under `prefix`.
    pub fn collect_labels(&self, labels: &Columns, index: usize, prefix: &str) -> Result<LabelOutput> {
        let mut scope = LabelScope::new(self, labels, index, prefix);
        self.run_flow(&mut scope)?;
        Ok(scope.into_output())
    }
}
