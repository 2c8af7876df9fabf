// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Everything here is a definitional error: a flow that merges the same
//! path twice, a dataset whose columns do not match the declared tasks, a
//! mask that cannot be resolved. None of these are retried; they are
//! surfaced to the caller as soon as they are detected.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskFlowError {
    #[error("The key {0} has been added twice in the same workflow")]
    DuplicateKey(String),

    #[error("flow '{flow}' declares the child '{child}' more than once")]
    DuplicateChild { flow: String, child: String },

    #[error("flow '{0}' has no flow definition")]
    UnimplementedFlow(String),

    #[error("flow '{flow}' has no child task named '{task}'")]
    UnknownTask { flow: String, task: String },

    #[error("task '{path}' reads labels from column '{column}', which does not exist")]
    MissingLabel { path: String, column: String },

    #[error("task '{path}' reads input column '{column}', which does not exist")]
    MissingInput { path: String, column: String },

    #[error("no mask field '{0}' in precondition data")]
    MissingField(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("reduce() is only defined for the root accumulator (prefix '{0}')")]
    NotRoot(String),

    #[error("gate() called before any task was added")]
    GateWithoutTarget,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in flow graph: {0}")]
    FlowCycle(String),

    #[error("invalid gate expression: {0}")]
    GateParse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskFlowError>;
