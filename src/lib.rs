// src/lib.rs

pub mod cli;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod forward;
pub mod logging;
pub mod loss;
pub mod precondition;
pub mod scope;
pub mod task;
pub mod trace;
pub mod types;

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::{GraphBuilder, GraphConfig};
use crate::precondition::GateTable;
use crate::task::TaskFlow;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, builds the root flow, traces it and
/// prints every leaf with its gate. Nothing is trained or evaluated.
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    info!(path = %config_path.display(), root = %cfg.root(), "loaded graph config");

    if args.dry_run {
        print!("{}", describe_config(&cfg));
        debug!("dry-run complete (graph not built)");
        return Ok(());
    }

    let flow = GraphBuilder::new(&cfg).build()?;
    print!("{}", describe_flow(&flow)?);
    Ok(())
}

/// Declared tasks and flows, as written in the config.
pub fn describe_config(cfg: &GraphConfig) -> String {
    ConfigSummary(cfg).to_string()
}

/// Every leaf path of a built flow with its kind, columns and gate.
pub fn describe_flow(flow: &TaskFlow) -> crate::errors::Result<String> {
    let gates = flow.trace()?;
    Ok(FlowSummary { flow, gates: &gates }.to_string())
}

struct ConfigSummary<'a>(&'a GraphConfig);

impl fmt::Display for ConfigSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.0;
        writeln!(f, "taskflow dry-run")?;
        writeln!(f, "  config.root = {}", cfg.root())?;
        writeln!(f, "  config.loss_reduction = {:?}", cfg.loss_reduction())?;
        writeln!(f)?;

        writeln!(f, "tasks ({}):", cfg.tasks().len())?;
        for (name, task) in cfg.tasks() {
            writeln!(f, "  - {name}")?;
            writeln!(f, "      kind: {}", task.kind)?;
            if !task.inputs.is_empty() {
                writeln!(f, "      inputs: {:?}", task.inputs)?;
            }
            if let Some(labels) = &task.labels {
                writeln!(f, "      labels: {labels}")?;
            }
        }

        writeln!(f, "flows ({}):", cfg.flows().len())?;
        for (name, flow) in cfg.flows() {
            writeln!(f, "  - {name}")?;
            for step in &flow.steps {
                match &step.gate {
                    Some(gate) => writeln!(f, "      {} if {gate}", step.task)?,
                    None => writeln!(f, "      {}", step.task)?,
                }
            }
        }
        Ok(())
    }
}

struct FlowSummary<'a> {
    flow: &'a TaskFlow,
    gates: &'a GateTable,
}

impl fmt::Display for FlowSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let leaves = self.flow.all_children();
        writeln!(f, "flow {} ({} leaves):", self.flow.name(), leaves.len())?;
        for (path, leaf) in &leaves {
            writeln!(f, "  - {path}")?;
            writeln!(f, "      kind: {}", leaf.kind())?;
            if !leaf.inputs().is_empty() {
                writeln!(f, "      inputs: {:?}", leaf.inputs())?;
            }
            writeln!(f, "      labels: {}", leaf.labels())?;
            match self.gates.get(path) {
                Some(precondition) => writeln!(f, "      gate: {precondition}")?,
                None if self.gates.contains(path) => writeln!(f, "      gate: always")?,
                None => writeln!(f, "      gate: never added")?,
            }
        }
        Ok(())
    }
}
