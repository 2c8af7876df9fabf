// src/config/mod.rs

//! Declarative task graphs.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: read a config file from disk or a string.
//! - `validate.rs`: reference, cycle and gate checks (`RawGraphConfig` ->
//!   `GraphConfig`).
//! - `gate.rs`: the gate expression language used by flow steps.
//! - `build.rs`: turn a validated config into a root `TaskFlow`.

pub mod build;
pub mod gate;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::GraphBuilder;
pub use gate::GateExpr;
pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{ConfigSection, FlowConfig, GraphConfig, RawGraphConfig, StepConfig, TaskConfig};
