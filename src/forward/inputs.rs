// src/forward/inputs.rs

use crate::errors::{Result, TaskFlowError};
use crate::precondition::GroundTruth;
use crate::types::{Columns, Tensor};

/// Input view of a forward pass: named feature columns, optionally tagged
/// with the ground-truth masks produced by the dataset.
#[derive(Debug, Clone, Default)]
pub struct FlowInputs {
    columns: Columns,
    gt: Option<GroundTruth>,
}

impl FlowInputs {
    pub fn new(columns: Columns) -> Self {
        Self { columns, gt: None }
    }

    pub fn with_ground_truth(mut self, gt: GroundTruth) -> Self {
        self.gt = Some(gt);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> &mut Self {
        self.columns.insert(name.into(), tensor);
        self
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn ground_truth(&self) -> Option<&GroundTruth> {
        self.gt.as_ref()
    }

    /// Column `name`, requested on behalf of the task at `path`.
    pub fn column(&self, path: &str, name: &str) -> Result<&Tensor> {
        self.columns
            .get(name)
            .ok_or_else(|| TaskFlowError::MissingInput {
                path: path.to_string(),
                column: name.to_string(),
            })
    }
}
