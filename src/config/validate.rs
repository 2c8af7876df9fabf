// src/config/validate.rs

use std::collections::{BTreeSet, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::gate::GateExpr;
use crate::config::model::{GraphConfig, RawGraphConfig};
use crate::errors::{Result, TaskFlowError};

impl TryFrom<RawGraphConfig> for GraphConfig {
    type Error = TaskFlowError;

    fn try_from(raw: RawGraphConfig) -> std::result::Result<Self, Self::Error> {
        let root = validate_raw_config(&raw)?;
        Ok(GraphConfig::new_unchecked(raw.config, raw.task, raw.flow, root))
    }
}

/// Run every check and return the root flow's name.
fn validate_raw_config(cfg: &RawGraphConfig) -> Result<String> {
    ensure_has_flows(cfg)?;
    validate_names(cfg)?;
    validate_steps(cfg)?;
    validate_flow_graph(cfg)?;
    validate_gates(cfg)?;
    resolve_root(cfg)
}

fn ensure_has_flows(cfg: &RawGraphConfig) -> Result<()> {
    if cfg.flow.is_empty() {
        return Err(TaskFlowError::ConfigError(
            "config must contain at least one [flow.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_names(cfg: &RawGraphConfig) -> Result<()> {
    for name in cfg.task.keys().chain(cfg.flow.keys()) {
        if name.is_empty() || name.contains('.') || name.contains(char::is_whitespace) {
            return Err(TaskFlowError::ConfigError(format!(
                "invalid name '{name}': names must be non-empty and contain no dots or spaces"
            )));
        }
    }
    if let Some(name) = cfg.task.keys().find(|n| cfg.flow.contains_key(*n)) {
        return Err(TaskFlowError::ConfigError(format!(
            "'{name}' is declared both as [task.{name}] and [flow.{name}]"
        )));
    }
    Ok(())
}

fn validate_steps(cfg: &RawGraphConfig) -> Result<()> {
    for (name, flow) in cfg.flow.iter() {
        if flow.steps.is_empty() {
            return Err(TaskFlowError::ConfigError(format!(
                "flow '{name}' has no steps"
            )));
        }
        let mut seen = HashSet::new();
        for step in flow.steps.iter() {
            if !cfg.task.contains_key(&step.task) && !cfg.flow.contains_key(&step.task) {
                return Err(TaskFlowError::ConfigError(format!(
                    "flow '{name}' has unknown step '{}'",
                    step.task
                )));
            }
            if !seen.insert(step.task.as_str()) {
                return Err(TaskFlowError::ConfigError(format!(
                    "flow '{name}' adds '{}' more than once",
                    step.task
                )));
            }
        }
    }
    Ok(())
}

fn validate_flow_graph(cfg: &RawGraphConfig) -> Result<()> {
    // Edge direction: child flow -> including flow.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.flow.keys() {
        graph.add_node(name.as_str());
    }

    for (name, flow) in cfg.flow.iter() {
        for step in flow.steps.iter() {
            if step.task == *name {
                return Err(TaskFlowError::FlowCycle(format!(
                    "flow '{name}' includes itself"
                )));
            }
            if cfg.flow.contains_key(&step.task) {
                graph.add_edge(step.task.as_str(), name.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskFlowError::FlowCycle(format!(
            "cycle detected in flow graph involving flow '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_gates(cfg: &RawGraphConfig) -> Result<()> {
    for (name, flow) in cfg.flow.iter() {
        let mut added: Vec<&str> = Vec::new();
        for step in flow.steps.iter() {
            if let Some(src) = &step.gate {
                let expr = GateExpr::parse(src)?;
                for reference in expr.refs() {
                    check_gate_ref(cfg, name, &added, reference)?;
                }
            }
            added.push(&step.task);
        }
    }
    Ok(())
}

/// A gate may only read a leaf that an earlier step of the same flow has
/// already added; dotted segments walk into nested flows.
fn check_gate_ref(cfg: &RawGraphConfig, flow: &str, added: &[&str], reference: &str) -> Result<()> {
    let mut segments = reference.split('.');
    let first = segments.next().unwrap_or_default();
    if !added.contains(&first) {
        return Err(TaskFlowError::ConfigError(format!(
            "gate in flow '{flow}' reads '{reference}', but '{first}' is not added by an earlier step"
        )));
    }

    let mut current = first;
    for segment in segments {
        let inner = cfg.flow.get(current).ok_or_else(|| {
            TaskFlowError::ConfigError(format!(
                "gate in flow '{flow}' reads '{reference}', but '{current}' is not a flow"
            ))
        })?;
        if !inner.steps.iter().any(|s| s.task == segment) {
            return Err(TaskFlowError::ConfigError(format!(
                "gate in flow '{flow}' reads '{reference}', but flow '{current}' has no step '{segment}'"
            )));
        }
        current = segment;
    }

    if !cfg.task.contains_key(current) {
        return Err(TaskFlowError::ConfigError(format!(
            "gate in flow '{flow}' reads '{reference}', which is a flow; gates must name a task"
        )));
    }
    Ok(())
}

fn resolve_root(cfg: &RawGraphConfig) -> Result<String> {
    if let Some(root) = &cfg.config.root {
        if !cfg.flow.contains_key(root) {
            return Err(TaskFlowError::ConfigError(format!(
                "[config].root names '{root}', which is not a declared flow"
            )));
        }
        return Ok(root.clone());
    }

    let included: BTreeSet<&str> = cfg
        .flow
        .values()
        .flat_map(|f| f.steps.iter().map(|s| s.task.as_str()))
        .collect();
    let roots: Vec<&String> = cfg
        .flow
        .keys()
        .filter(|name| !included.contains(name.as_str()))
        .collect();

    match roots.as_slice() {
        [root] => Ok((*root).clone()),
        [] => Err(TaskFlowError::ConfigError(
            "no root flow: every flow is included by another".to_string(),
        )),
        many => Err(TaskFlowError::ConfigError(format!(
            "ambiguous root flow (candidates: {many:?}); set [config].root"
        ))),
    }
}
