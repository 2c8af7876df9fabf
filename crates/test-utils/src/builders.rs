#![allow(dead_code)]

use ndarray::{Array1, Array2};
use taskflow::forward::FlowInputs;
use taskflow::precondition::GroundTruth;
use taskflow::types::{Columns, Mask, Tensor};

/// `[n]` column from a slice.
pub fn column(values: &[f32]) -> Tensor {
    Array1::from(values.to_vec()).into_dyn()
}

/// `[rows, cols]` column from row-major data.
pub fn matrix(rows: usize, cols: usize, values: &[f32]) -> Tensor {
    Array2::from_shape_vec((rows, cols), values.to_vec())
        .expect("matrix data does not match its shape")
        .into_dyn()
}

pub fn mask(values: &[bool]) -> Mask {
    Array1::from(values.to_vec())
}

/// Builder for a set of named columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnsBuilder {
    columns: Columns,
}

impl ColumnsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, tensor: Tensor) -> Self {
        self.columns.insert(name.to_string(), tensor);
        self
    }

    pub fn with_values(self, name: &str, values: &[f32]) -> Self {
        self.with(name, column(values))
    }

    pub fn build(self) -> Columns {
        self.columns
    }

    /// Wrap the columns as forward-pass inputs without ground truth.
    pub fn inputs(self) -> FlowInputs {
        FlowInputs::new(self.columns)
    }
}

/// Builder for ground-truth masks keyed by dotted path.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthBuilder {
    gt: GroundTruth,
}

impl GroundTruthBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, values: &[bool]) -> Self {
        self.gt.insert(path.to_string(), mask(values));
        self
    }

    pub fn build(self) -> GroundTruth {
        self.gt
    }
}
