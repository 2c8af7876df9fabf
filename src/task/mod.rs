// src/task/mod.rs

//! Task graph model.
//!
//! - [`leaf`] holds the atomic [`LeafTask`].
//! - [`flow`] holds the composite [`TaskFlow`] and its builder.
//! - [`flavor`] maps stock task kinds to policy bundles.
//! - [`policy`] defines the pluggable policy traits and built-ins.
//! - [`composite`] applies leaf policies across a whole (sub)graph.

pub mod composite;
pub mod flavor;
pub mod flow;
pub mod leaf;
pub mod policy;

pub use composite::{CompositeActivation, CompositeDecoder};
pub use flavor::{Flavor, TaskKind};
pub use flow::{TaskFlow, TaskFlowBuilder};
pub use leaf::{LeafTask, NamedMetric};
pub use policy::{
    Activation, Availability, Decoder, Identity, Linear, Metric, Predictor, Sigmoid, Softmax,
    SortDeclining, Threshold,
};

use std::sync::Arc;

use crate::loss::FlowLoss;
use crate::types::Reduction;

/// A node of the task graph: either a leaf predictor or a nested flow.
///
/// Both expose the same capabilities, so a flow can be nested inside another
/// flow transparently. For a flow, activation/decoder/loss are composite
/// objects that recurse into its leaves.
#[derive(Debug, Clone)]
pub enum Task {
    Leaf(LeafTask),
    Flow(TaskFlow),
}

impl Task {
    pub fn name(&self) -> &str {
        match self {
            Task::Leaf(leaf) => leaf.name(),
            Task::Flow(flow) => flow.name(),
        }
    }

    pub fn has_children(&self) -> bool {
        matches!(self, Task::Flow(_))
    }

    pub fn as_leaf(&self) -> Option<&LeafTask> {
        match self {
            Task::Leaf(leaf) => Some(leaf),
            Task::Flow(_) => None,
        }
    }

    pub fn as_flow(&self) -> Option<&TaskFlow> {
        match self {
            Task::Leaf(_) => None,
            Task::Flow(flow) => Some(flow),
        }
    }

    /// Leaves under this task keyed by dotted path relative to the task's
    /// parent. A leaf yields just itself.
    pub fn leaves(&self) -> Vec<(String, &LeafTask)> {
        match self {
            Task::Leaf(leaf) => vec![(leaf.name().to_string(), leaf)],
            Task::Flow(flow) => {
                let mut out = Vec::new();
                flow.collect_leaves(&crate::types::child_prefix("", flow.name()), &mut out);
                out
            }
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        match self {
            Task::Leaf(leaf) => leaf.inputs().to_vec(),
            Task::Flow(flow) => flow.inputs(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        match self {
            Task::Leaf(leaf) => vec![leaf.labels().to_string()],
            Task::Flow(flow) => flow.labels(),
        }
    }

    pub fn predictor(&self) -> Option<&Arc<dyn Predictor>> {
        self.as_leaf().map(LeafTask::predictor)
    }

    pub fn availability(&self) -> Option<Availability> {
        self.as_leaf().map(LeafTask::availability)
    }

    /// Metrics of every leaf, keyed like [`Task::leaves`].
    pub fn metrics(&self) -> Vec<(String, NamedMetric)> {
        self.leaves()
            .into_iter()
            .flat_map(|(path, leaf)| leaf.metrics().iter().cloned().map(move |m| (path.clone(), m)))
            .collect()
    }

    pub fn activation(&self) -> CompositeActivation<'_> {
        CompositeActivation::new(self.leaves())
    }

    pub fn decoder(&self) -> CompositeDecoder<'_> {
        CompositeDecoder::new(self.leaves())
    }

    /// Mean-reduced loss over every supervised leaf.
    pub fn loss(&self) -> FlowLoss<'_> {
        FlowLoss::new(self.leaves(), Reduction::Mean)
    }

    /// Per-sample loss over every supervised leaf.
    pub fn per_sample_loss(&self) -> FlowLoss<'_> {
        FlowLoss::new(self.leaves(), Reduction::PerSample)
    }
}

impl From<LeafTask> for Task {
    fn from(leaf: LeafTask) -> Self {
        Task::Leaf(leaf)
    }
}

impl From<TaskFlow> for Task {
    fn from(flow: TaskFlow) -> Self {
        Task::Flow(flow)
    }
}

impl TaskFlow {
    pub fn activation(&self) -> CompositeActivation<'_> {
        CompositeActivation::new(self.all_children())
    }

    pub fn decoder(&self) -> CompositeDecoder<'_> {
        CompositeDecoder::new(self.all_children())
    }

    pub fn loss(&self) -> FlowLoss<'_> {
        FlowLoss::new(self.all_children(), Reduction::Mean)
    }

    pub fn per_sample_loss(&self) -> FlowLoss<'_> {
        FlowLoss::new(self.all_children(), Reduction::PerSample)
    }

    /// Composite loss with an explicit reduction (e.g. from config).
    pub fn loss_with(&self, reduction: Reduction) -> FlowLoss<'_> {
        FlowLoss::new(self.all_children(), reduction)
    }
}
