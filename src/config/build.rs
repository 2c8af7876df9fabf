// src/config/build.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::gate::GateExpr;
use crate::config::model::GraphConfig;
use crate::errors::{Result, TaskFlowError};
use crate::scope::FlowScope;
use crate::task::{LeafTask, Predictor, Task, TaskFlow};

/// Builds the root [`TaskFlow`] of a validated config.
///
/// Leaves use the identity predictor unless overridden by name with
/// [`GraphBuilder::with_predictor`]; an override applies wherever that task
/// is added.
pub struct GraphBuilder<'a> {
    config: &'a GraphConfig,
    predictors: HashMap<String, Arc<dyn Predictor>>,
}

/// A compiled flow step.
struct Step {
    task: String,
    gate: Option<GateExpr>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(config: &'a GraphConfig) -> Self {
        Self {
            config,
            predictors: HashMap::new(),
        }
    }

    pub fn with_predictor(mut self, task: impl Into<String>, predictor: Arc<dyn Predictor>) -> Self {
        self.predictors.insert(task.into(), predictor);
        self
    }

    pub fn build(&self) -> Result<TaskFlow> {
        for name in self.predictors.keys() {
            if self.config.task(name).is_none() {
                return Err(TaskFlowError::ConfigError(format!(
                    "predictor override for '{name}', which is not a declared task"
                )));
            }
        }

        let root = self.build_flow(self.config.root())?;
        info!(
            root = %root.name(),
            leaves = root.all_children().len(),
            "built task graph from config"
        );
        Ok(root)
    }

    fn build_flow(&self, name: &str) -> Result<TaskFlow> {
        let cfg = self
            .config
            .flow(name)
            .ok_or_else(|| TaskFlowError::ConfigError(format!("unknown flow '{name}'")))?;

        let mut builder = TaskFlow::builder(name);
        let mut steps = Vec::with_capacity(cfg.steps.len());
        for step in cfg.steps.iter() {
            let child: Task = if self.config.flow(&step.task).is_some() {
                self.build_flow(&step.task)?.into()
            } else {
                self.build_leaf(&step.task)?.into()
            };
            builder = builder.task(child);
            steps.push(Step {
                task: step.task.clone(),
                gate: step.gate.as_deref().map(GateExpr::parse).transpose()?,
            });
        }

        debug!(flow = name, steps = steps.len(), "compiled flow steps");
        builder
            .flow(move |out: &mut dyn FlowScope| {
                for step in steps.iter() {
                    let gate = step.gate.as_ref().map(|g| g.to_precondition(&*out));
                    let added = out.add(&step.task)?;
                    if let Some(precondition) = gate {
                        added.gate(precondition)?;
                    }
                }
                Ok(())
            })
            .build()
    }

    fn build_leaf(&self, name: &str) -> Result<LeafTask> {
        let cfg = self
            .config
            .task(name)
            .ok_or_else(|| TaskFlowError::ConfigError(format!("unknown task '{name}'")))?;

        let mut leaf = LeafTask::new(name, cfg.kind).with_inputs(cfg.inputs.iter().cloned());
        if let Some(labels) = &cfg.labels {
            leaf = leaf.with_labels(labels.clone());
        }
        if let Some(predictor) = self.predictors.get(name) {
            leaf = leaf.with_predictor(Arc::clone(predictor));
        }
        Ok(leaf)
    }
}
