// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::task::TaskKind;
use crate::types::Reduction;

/// Task graph as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// root = "simple_conditional_flow"
/// loss_reduction = "mean"
///
/// [task.is_positive]
/// kind = "binary"
/// inputs = ["features"]
///
/// [flow.simple_conditional_flow]
/// steps = [
///   { task = "is_positive" },
///   { task = "positive_func", gate = "is_positive" },
///   { task = "negative_func", gate = "~is_positive" },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawGraphConfig {
    #[serde(default)]
    pub config: ConfigSection,

    /// Leaf tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Composite tasks from `[flow.<name>]`.
    #[serde(default)]
    pub flow: BTreeMap<String, FlowConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Root flow. Optional when exactly one flow is not included by any
    /// other.
    #[serde(default)]
    pub root: Option<String>,

    /// Parent reduction of the composite loss.
    #[serde(default)]
    pub loss_reduction: Reduction,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub kind: TaskKind,

    /// Input columns handed to the predictor, in order.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Label column; defaults to the task name.
    #[serde(default)]
    pub labels: Option<String>,
}

/// `[flow.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// One `add` of a flow, optionally gated.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// A `[task.*]` or `[flow.*]` name.
    pub task: String,

    /// Gate expression over tasks added by earlier steps, e.g.
    /// `"has_object & ~occluded"`.
    #[serde(default)]
    pub gate: Option<String>,
}

/// A validated task graph. Only constructed through
/// `TryFrom<RawGraphConfig>`.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    config: ConfigSection,
    task: BTreeMap<String, TaskConfig>,
    flow: BTreeMap<String, FlowConfig>,
    root: String,
}

impl GraphConfig {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        task: BTreeMap<String, TaskConfig>,
        flow: BTreeMap<String, FlowConfig>,
        root: String,
    ) -> Self {
        Self {
            config,
            task,
            flow,
            root,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn loss_reduction(&self) -> Reduction {
        self.config.loss_reduction
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn flows(&self) -> &BTreeMap<String, FlowConfig> {
        &self.flow
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.get(name)
    }

    pub fn flow(&self, name: &str) -> Option<&FlowConfig> {
        self.flow.get(name)
    }
}
